//! # Private Speech-to-Text
//!
//! On-device speech-to-text subsystem: audio preprocessing, a background
//! conversion worker with an async bridge, and Whisper inference backends
//! behind a selecting facade.
//!
//! ## Architecture:
//! - [`audio`]: codec utilities, accumulation buffer, worker thread, bridge
//! - [`transcription`]: the engine contract, the three backends, and the
//!   [`transcription::PrivateStt`] facade callers interact with
//! - [`config`]: layered configuration (defaults, stt.toml, environment)
//! - [`device`]: cached accelerator detection (CUDA/Metal)
//! - [`error`]: the shared [`error::EngineError`] type
//!
//! ## Quick Start:
//! ```no_run
//! use private_stt::{AppConfig, InitOptions, PrivateStt};
//!
//! # async fn run() -> private_stt::EngineResult<()> {
//! let config = AppConfig::load()?;
//! let mut stt = PrivateStt::new(config);
//! let engine = stt.init(InitOptions::default()).await?;
//! println!("transcribing with the {} engine", engine);
//!
//! let samples: Vec<f32> = vec![0.0; 16000];
//! let text = stt.transcribe(&samples).await?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod device;
pub mod error;
pub mod transcription;

pub use config::{AppConfig, AudioSettings, ModelConfig, TestFlags};
pub use device::DeviceManager;
pub use error::{EngineError, EngineResult};
pub use transcription::{
    EngineCallbacks, EngineType, InitOptions, PrivateStt, SpeechEngine,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging for the subsystem.
///
/// Honors `RUST_LOG` if set; otherwise defaults to info, or debug when the
/// diagnostics flag is on. Call once at startup.
pub fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "private_stt=debug"
    } else {
        "private_stt=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
