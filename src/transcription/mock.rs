//! # Mock Backend
//!
//! Deterministic test double used when test mode is active. Real backends
//! cannot run in headless CI, so this engine simulates the full init
//! lifecycle (scripted progress, ready signal) and returns a canned
//! transcription.
//!
//! An injectable hang gate can hold initialization open mid-script and
//! release it later, to exercise persistent-loading states.

use crate::error::{EngineError, EngineResult};
use crate::transcription::contract::{EngineCallbacks, EngineType, SpeechEngine};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// The canned transcription every mock call returns.
pub const MOCK_TRANSCRIPT: &str = "This is a mock transcription for testing purposes.";

/// One-way latch that can hold the mock engine's init open until released.
#[derive(Default)]
pub struct HangGate {
    released: AtomicBool,
    notify: Notify,
}

impl HangGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let a held init proceed. Safe to call before init reaches the gate.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn wait(&self) {
        loop {
            if self.released.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after arming so a release between the check and the
            // await cannot be missed
            if self.released.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Default)]
pub struct MockEngine {
    ready: bool,
    hang_gate: Option<Arc<HangGate>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that stalls at 50% progress until the gate is released.
    pub fn with_hang_gate(gate: Arc<HangGate>) -> Self {
        Self {
            ready: false,
            hang_gate: Some(gate),
        }
    }
}

#[async_trait]
impl SpeechEngine for MockEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Mock
    }

    async fn init(
        &mut self,
        callbacks: &EngineCallbacks,
        _timeout: Option<Duration>,
    ) -> EngineResult<()> {
        info!("[Mock] Initializing mock engine...");

        // Scripted loading progress: 0 -> 50 -> 100
        callbacks.report_progress(0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        callbacks.report_progress(50);

        if let Some(gate) = &self.hang_gate {
            info!("[Mock] Holding init open at hang gate");
            gate.wait().await;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        callbacks.report_progress(100);

        self.ready = true;
        callbacks.report_ready();
        info!("[Mock] Mock engine initialized");
        Ok(())
    }

    async fn transcribe(&mut self, _audio: &[f32]) -> EngineResult<String> {
        if !self.ready {
            return Err(EngineError::NotInitialized);
        }
        Ok(MOCK_TRANSCRIPT.to_string())
    }

    async fn destroy(&mut self) {
        info!("[Mock] Mock engine destroyed");
        self.ready = false;
    }
}
