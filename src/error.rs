//! # Error Handling
//!
//! Defines the error type shared by every component of the transcription
//! subsystem. All backend operations return an explicit `Result`; nothing is
//! allowed to cross the facade boundary as a panic.
//!
//! ## Error Categories:
//! - **Init**: a backend failed to initialize (model download/load error,
//!   unsupported environment)
//! - **Timeout**: initialization exceeded its deadline
//! - **NotInitialized**: transcribe/destroy called without a bound backend
//! - **Transcription**: backend-internal failure during inference
//! - **Worker**: the background audio worker reported a failure for one
//!   specific request
//! - **UnsupportedRate**: a resample request asked for upsampling
//! - **InvalidContainer**: a byte buffer failed audio container validation
//! - **Config**: configuration loading or validation failed

use std::fmt;

/// Errors produced by the transcription engine and audio pipeline.
#[derive(Debug)]
pub enum EngineError {
    /// Backend initialization failed (model load error, unsupported environment)
    Init(String),

    /// Backend initialization exceeded its deadline
    Timeout { timeout_ms: u64 },

    /// Operation requires a bound backend, but none is bound
    NotInitialized,

    /// Backend-internal failure during inference
    Transcription(String),

    /// The background audio worker reported an error for a specific request
    Worker(String),

    /// Upsampling is not supported by the resampler
    UnsupportedRate { input: u32, target: u32 },

    /// A byte buffer failed audio container validation
    InvalidContainer(String),

    /// Configuration loading or validation problem
    Config(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Init(msg) => write!(f, "initialization failed: {}", msg),
            EngineError::Timeout { timeout_ms } => {
                write!(f, "initialization timed out after {}ms", timeout_ms)
            }
            EngineError::NotInitialized => {
                write!(f, "engine not initialized. Call init() first")
            }
            EngineError::Transcription(msg) => write!(f, "transcription failed: {}", msg),
            EngineError::Worker(msg) => write!(f, "audio worker error: {}", msg),
            EngineError::UnsupportedRate { input, target } => write!(
                f,
                "upsampling is not supported ({}Hz -> {}Hz)",
                input, target
            ),
            EngineError::InvalidContainer(msg) => {
                write!(f, "invalid audio container: {}", msg)
            }
            EngineError::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Model-loading internals use `anyhow` for context chaining; at the engine
/// boundary everything becomes an initialization failure.
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Init(err.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Shorthand for results using the engine error type.
pub type EngineResult<T> = Result<T, EngineError>;
