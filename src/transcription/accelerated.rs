//! # Hardware-Accelerated Backend
//!
//! Fast-path engine running Whisper on a detected accelerator (CUDA or
//! Metal). Model loading races against a deadline; whichever settles first
//! wins and the losing branch is dropped, so a stalled download can never
//! leave the caller hanging.
//!
//! On init failure the backend clears the persisted model cache before
//! reporting the error, so a corrupted cache cannot permanently block
//! retries. Transcription input is re-encoded into the audio container
//! format before it reaches the session.

use crate::audio::codec;
use crate::error::{EngineError, EngineResult};
use crate::transcription::contract::{EngineCallbacks, EngineType, SpeechEngine};
use crate::transcription::model::{self, WhisperSession};
use async_trait::async_trait;
use candle_core::Device;
use std::time::Duration;
use tracing::{info, warn};

/// Default init deadline before falling back.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct AcceleratedEngine {
    repo: String,
    device: Device,
    session: Option<WhisperSession>,
}

/// Race a load against a deadline. The losing branch is dropped: a
/// timed-out load is cancelled, not left running.
async fn with_deadline<T>(
    load: impl std::future::Future<Output = EngineResult<T>>,
    timeout: Duration,
) -> EngineResult<T> {
    tokio::select! {
        result = load => result,
        _ = tokio::time::sleep(timeout) => Err(EngineError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

impl AcceleratedEngine {
    pub fn new(repo: String, device: Device) -> Self {
        Self {
            repo,
            device,
            session: None,
        }
    }
}

#[async_trait]
impl SpeechEngine for AcceleratedEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Accelerated
    }

    async fn init(
        &mut self,
        callbacks: &EngineCallbacks,
        timeout: Option<Duration>,
    ) -> EngineResult<()> {
        let timeout = timeout.unwrap_or(DEFAULT_INIT_TIMEOUT);
        info!(
            "[Accelerated] Initializing engine (timeout {}ms)...",
            timeout.as_millis()
        );
        callbacks.report_progress(0);

        let progress = |percent: u8| callbacks.report_progress(percent);

        let loaded = with_deadline(
            async {
                WhisperSession::load(&self.repo, self.device.clone(), Some(&progress))
                    .await
                    .map_err(|e| EngineError::Init(e.to_string()))
            },
            timeout,
        )
        .await;

        match loaded {
            Ok(session) => {
                self.session = Some(session);
                callbacks.report_progress(100);
                callbacks.report_ready();
                info!("[Accelerated] Engine initialized successfully");
                Ok(())
            }
            Err(e) => {
                warn!("[Accelerated] Initialization failed: {}", e);
                // Self-healing: a corrupted cache would otherwise make
                // every retry fail the same way
                model::clear_model_cache(&self.repo);
                Err(e)
            }
        }
    }

    async fn transcribe(&mut self, audio: &[f32]) -> EngineResult<String> {
        let session = self.session.as_mut().ok_or(EngineError::NotInitialized)?;

        // The session consumes the encoded audio container format
        let container = codec::float_to_wav(audio, codec::TARGET_SAMPLE_RATE);
        session
            .transcribe_container(&container)
            .await
            .map_err(|e| EngineError::Transcription(e.to_string()))
    }

    async fn destroy(&mut self) {
        info!("[Accelerated] Destroying engine");
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transcribe_before_init_fails() {
        let mut engine =
            AcceleratedEngine::new("openai/whisper-tiny".to_string(), Device::Cpu);

        match engine.transcribe(&[0.0; 1600]).await {
            Err(EngineError::NotInitialized) => {}
            other => panic!("expected NotInitialized, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_lets_fast_load_win() {
        let result = with_deadline(
            async { Ok::<_, EngineError>(7) },
            Duration::from_millis(5000),
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deadline_preempts_blocking_load_tail() {
        // A load whose tail holds a blocking-pool thread must still lose
        // the race once the deadline passes
        let slow = async {
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_millis(500)))
                .await
                .map_err(|e| EngineError::Init(e.to_string()))?;
            Ok::<_, EngineError>(())
        };

        let start = std::time::Instant::now();
        let result = with_deadline(slow, Duration::from_millis(50)).await;

        match result {
            Err(EngineError::Timeout { timeout_ms }) => assert_eq!(timeout_ms, 50),
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let mut engine =
            AcceleratedEngine::new("openai/whisper-tiny".to_string(), Device::Cpu);
        engine.destroy().await;
        engine.destroy().await;

        match engine.transcribe(&[0.0; 16]).await {
            Err(EngineError::NotInitialized) => {}
            other => panic!("expected NotInitialized, got {:?}", other),
        }
    }
}
