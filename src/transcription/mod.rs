//! # Transcription Engines
//!
//! Speech-to-text backends and the facade that selects between them.
//!
//! - [`contract`]: the `SpeechEngine` capability interface all backends implement
//! - [`model`]: the shared Candle Whisper session (download, decode, cache)
//! - [`accelerated`]: fast path on CUDA/Metal with a timeout-raced init
//! - [`cpu`]: portable fallback with 30s/5s chunked long-form input
//! - [`mock`]: deterministic double for test mode
//! - [`facade`]: `PrivateStt`, the selection and fallback entry point

pub mod accelerated;
pub mod contract;
pub mod cpu;
pub mod facade;
pub mod mock;
pub mod model;

pub use accelerated::{AcceleratedEngine, DEFAULT_INIT_TIMEOUT};
pub use contract::{EngineCallbacks, EngineType, ProgressCallback, ReadyCallback, SpeechEngine};
pub use cpu::CpuEngine;
pub use facade::{InitOptions, PrivateStt};
pub use mock::{HangGate, MockEngine, MOCK_TRANSCRIPT};
pub use model::WhisperSession;
