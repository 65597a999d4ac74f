//! # Portable CPU Backend
//!
//! Safe-path engine running Whisper on the CPU. Slower than the
//! accelerated path but works on any hardware, so it is the fallback
//! target when acceleration is missing or fails to initialize.
//!
//! Long input is processed in fixed windows: 30-second chunks advancing
//! with a 5-second stride overlap, no timestamp output.

use crate::error::{EngineError, EngineResult};
use crate::transcription::contract::{EngineCallbacks, EngineType, SpeechEngine};
use crate::transcription::model::WhisperSession;
use async_trait::async_trait;
use candle_core::Device;
use std::time::Duration;
use tracing::{debug, info};

/// Chunk length in seconds.
const CHUNK_LENGTH_S: usize = 30;
/// Stride (overlap) between consecutive chunks, in seconds.
const STRIDE_LENGTH_S: usize = 5;
/// Inference sample rate.
const SAMPLE_RATE: usize = 16000;

pub struct CpuEngine {
    repo: String,
    session: Option<WhisperSession>,
}

impl CpuEngine {
    pub fn new(repo: String) -> Self {
        Self {
            repo,
            session: None,
        }
    }

    /// Window start offsets covering `len` samples.
    fn chunk_offsets(len: usize) -> Vec<usize> {
        let chunk = CHUNK_LENGTH_S * SAMPLE_RATE;
        let step = (CHUNK_LENGTH_S - STRIDE_LENGTH_S) * SAMPLE_RATE;

        let mut offsets = vec![0];
        let mut offset = step;
        while offset + (chunk - step) < len {
            offsets.push(offset);
            offset += step;
        }
        offsets
    }
}

#[async_trait]
impl SpeechEngine for CpuEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Cpu
    }

    async fn init(
        &mut self,
        callbacks: &EngineCallbacks,
        _timeout: Option<Duration>,
    ) -> EngineResult<()> {
        info!("[CPU] Initializing engine...");
        callbacks.report_progress(0);

        let progress = |percent: u8| callbacks.report_progress(percent);
        let session = WhisperSession::load(&self.repo, Device::Cpu, Some(&progress))
            .await
            .map_err(|e| EngineError::Init(e.to_string()))?;

        self.session = Some(session);
        callbacks.report_progress(100);
        callbacks.report_ready();
        info!("[CPU] Engine initialized successfully");
        Ok(())
    }

    async fn transcribe(&mut self, audio: &[f32]) -> EngineResult<String> {
        let session = self.session.as_mut().ok_or(EngineError::NotInitialized)?;

        let chunk_len = CHUNK_LENGTH_S * SAMPLE_RATE;
        let offsets = Self::chunk_offsets(audio.len());
        debug!(
            "[CPU] Transcribing {} samples in {} chunk(s)",
            audio.len(),
            offsets.len()
        );

        let mut parts = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let end = (offset + chunk_len).min(audio.len());
            let text = session
                .transcribe(&audio[offset..end])
                .await
                .map_err(|e| EngineError::Transcription(e.to_string()))?;
            if !text.is_empty() {
                parts.push(text);
            }
        }

        Ok(parts.join(" "))
    }

    async fn destroy(&mut self) {
        info!("[CPU] Destroying engine");
        self.session = None;
    }
}
