//! # Engine Contract
//!
//! The capability interface every inference backend implements. Backends
//! do not share a base implementation; each one independently satisfies
//! this narrow contract and the facade depends only on it, dispatching by
//! the `EngineType` discriminant.
//!
//! All operations return explicit success/failure values. Calling
//! `transcribe` before a successful `init`, or after `destroy`, fails with
//! `EngineError::NotInitialized` rather than hanging or panicking.

use crate::error::EngineResult;
use async_trait::async_trait;
use std::time::Duration;

/// Which backend an engine instance represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    /// Hardware-accelerated inference (CUDA or Metal)
    Accelerated,
    /// Portable CPU inference
    Cpu,
    /// Deterministic test double
    Mock,
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineType::Accelerated => "accelerated",
            EngineType::Cpu => "cpu",
            EngineType::Mock => "mock",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for EngineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accelerated" | "gpu" => Ok(EngineType::Accelerated),
            "cpu" => Ok(EngineType::Cpu),
            "mock" => Ok(EngineType::Mock),
            _ => Err(format!("Unknown engine type: {}", s)),
        }
    }
}

/// Progress notifier: percent loaded, monotonic 0 to 100.
pub type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

/// Ready notifier: fired exactly once, only on successful init.
pub type ReadyCallback = Box<dyn Fn() + Send + Sync>;

/// Optional callbacks supplied to `init`.
#[derive(Default)]
pub struct EngineCallbacks {
    pub on_model_load_progress: Option<ProgressCallback>,
    pub on_ready: Option<ReadyCallback>,
}

impl EngineCallbacks {
    pub fn report_progress(&self, percent: u8) {
        if let Some(callback) = &self.on_model_load_progress {
            callback(percent.min(100));
        }
    }

    pub fn report_ready(&self) {
        if let Some(callback) = &self.on_ready {
            callback();
        }
    }
}

impl std::fmt::Debug for EngineCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCallbacks")
            .field("on_model_load_progress", &self.on_model_load_progress.is_some())
            .field("on_ready", &self.on_ready.is_some())
            .finish()
    }
}

/// The backend capability interface: `init`, `transcribe`, `destroy`.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// The discriminant this backend answers to.
    fn engine_type(&self) -> EngineType;

    /// Load the backend's model and make it ready for transcription.
    ///
    /// `timeout` is honored by backends that race their model load
    /// against a deadline; others may ignore it.
    async fn init(
        &mut self,
        callbacks: &EngineCallbacks,
        timeout: Option<Duration>,
    ) -> EngineResult<()>;

    /// Transcribe one audio frame (float samples at the target rate).
    async fn transcribe(&mut self, audio: &[f32]) -> EngineResult<String>;

    /// Release backend resources. Idempotent.
    async fn destroy(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_engine_type_parsing() {
        assert_eq!("cpu".parse::<EngineType>().unwrap(), EngineType::Cpu);
        assert_eq!("GPU".parse::<EngineType>().unwrap(), EngineType::Accelerated);
        assert_eq!("mock".parse::<EngineType>().unwrap(), EngineType::Mock);
        assert!("webgpu".parse::<EngineType>().is_err());
    }

    #[test]
    fn test_engine_type_display_roundtrip() {
        for engine_type in [EngineType::Accelerated, EngineType::Cpu, EngineType::Mock] {
            let parsed: EngineType = engine_type.to_string().parse().unwrap();
            assert_eq!(parsed, engine_type);
        }
    }

    #[test]
    fn test_callbacks_clamp_progress() {
        let last = Arc::new(AtomicU8::new(0));
        let last_clone = last.clone();
        let callbacks = EngineCallbacks {
            on_model_load_progress: Some(Box::new(move |p| {
                last_clone.store(p, Ordering::SeqCst)
            })),
            on_ready: None,
        };

        callbacks.report_progress(250);
        assert_eq!(last.load(Ordering::SeqCst), 100);

        // Absent callbacks are a no-op, not a panic
        callbacks.report_ready();
    }
}
