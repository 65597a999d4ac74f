//! # Audio Processing Module
//!
//! The preprocessing pipeline between the capture source and the
//! inference backends.
//!
//! ## Key Components:
//! - **Codec Utilities**: float/int16 conversion, WAV container, resampling
//! - **Accumulation Buffer**: threshold-based batching of capture chunks
//! - **Background Worker**: off-thread execution of the heavy conversions
//! - **Async Bridge**: correlation-id keyed dispatch to the worker
//!
//! ## Audio Format:
//! - **Sample Rate**: 16kHz target (capture rates are downsampled)
//! - **Bit Depth**: 16-bit PCM in the container format
//! - **Channels**: Mono
//! - **Encoding**: Little-endian signed integers

pub mod bridge; // Async dispatch with pending-request table
pub mod buffer; // Accumulation buffer with threshold release
pub mod codec; // Pure conversion functions
pub mod worker; // Background worker thread and wire messages

pub use bridge::{downsample_async, float_to_int16_async, float_to_wav_async};
pub use buffer::SampleBuffer;
pub use codec::{concatenate_frames, downsample_audio, float_to_int16, float_to_wav};
