//! # Async Audio Bridge
//!
//! Dispatches codec work to the background audio worker and resolves a
//! pending-request table keyed by correlation identifier, so concurrent
//! callers can never receive each other's results.
//!
//! ## Shared-Resource Policy:
//! The worker is a process-wide singleton, lazily spawned on the first
//! dispatch and never torn down. Every dispatch:
//! 1. generates a fresh correlation identifier,
//! 2. registers a one-shot completion handle under that identifier,
//! 3. sends the request (the audio buffer moves to the worker, not copied),
//! 4. resolves only on the response carrying the same identifier.
//!
//! Responses with an unknown identifier are logged and dropped, never
//! misapplied to a different caller's request. A worker `ERROR` fails the
//! one pending call it belongs to and nothing else.

use crate::audio::worker::{self, WorkerRequest, WorkerResponse};
use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Mapping from correlation identifier to a one-shot completion handle.
///
/// Each identifier is unique per outstanding request; a response is
/// matched and removed exactly once.
#[derive(Default)]
pub struct PendingTable {
    inner: Mutex<HashMap<Uuid, oneshot::Sender<WorkerResponse>>>,
}

impl PendingTable {
    pub fn register(&self, id: Uuid, sender: oneshot::Sender<WorkerResponse>) {
        self.inner.lock().unwrap().insert(id, sender);
    }

    /// Route a response to its registered caller. Returns false if no
    /// request with this identifier is outstanding.
    pub fn complete(&self, response: WorkerResponse) -> bool {
        let id = response.correlation_id();
        let sender = self.inner.lock().unwrap().remove(&id);

        match sender {
            Some(sender) => {
                // A dropped receiver means the caller gave up; that is
                // its problem alone
                let _ = sender.send(response);
                true
            }
            None => {
                warn!("Dropping worker response with unknown correlation id {}", id);
                false
            }
        }
    }

    /// Remove an entry without completing it (dispatch failed before the
    /// worker ever saw the request).
    fn forget(&self, id: Uuid) {
        self.inner.lock().unwrap().remove(&id);
    }

    #[cfg(test)]
    fn outstanding(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

struct AudioBridge {
    requests: Mutex<mpsc::Sender<WorkerRequest>>,
    pending: std::sync::Arc<PendingTable>,
}

static BRIDGE: OnceLock<AudioBridge> = OnceLock::new();

/// Get the process-wide bridge, spawning the worker and the response
/// router on first use.
fn bridge() -> &'static AudioBridge {
    BRIDGE.get_or_init(|| {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();

        worker::spawn_worker(request_rx, response_tx);

        let pending = std::sync::Arc::new(PendingTable::default());
        let router_pending = pending.clone();
        thread::Builder::new()
            .name("audio-bridge-router".to_string())
            .spawn(move || {
                while let Ok(response) = response_rx.recv() {
                    router_pending.complete(response);
                }
            })
            .expect("failed to spawn audio bridge router thread");

        AudioBridge {
            requests: Mutex::new(request_tx),
            pending,
        }
    })
}

/// Send one request and await its matching response.
async fn dispatch(request: WorkerRequest) -> EngineResult<WorkerResponse> {
    let bridge = bridge();
    let id = request.correlation_id();

    let (tx, rx) = oneshot::channel();
    bridge.pending.register(id, tx);
    debug!("Dispatching {} to audio worker", id);

    let sent = bridge.requests.lock().unwrap().send(request);
    if sent.is_err() {
        bridge.pending.forget(id);
        return Err(EngineError::Worker(
            "audio worker is not accepting requests".to_string(),
        ));
    }

    match rx.await {
        Ok(WorkerResponse::Error { message, .. }) => Err(worker::worker_error(message)),
        Ok(response) => Ok(response),
        Err(_) => Err(EngineError::Worker(
            "audio worker dropped the request".to_string(),
        )),
    }
}

/// Downsample audio on the background worker.
pub async fn downsample_async(
    audio: Vec<f32>,
    input_rate: u32,
    target_rate: u32,
) -> EngineResult<Vec<f32>> {
    let response = dispatch(WorkerRequest::Downsample {
        correlation_id: Uuid::new_v4(),
        audio,
        input_rate,
        target_rate,
    })
    .await?;

    match response {
        WorkerResponse::DownsampleResult { result, .. } => Ok(result),
        other => Err(EngineError::Worker(format!(
            "unexpected worker response: {:?}",
            other
        ))),
    }
}

/// Build a WAV container on the background worker.
pub async fn float_to_wav_async(samples: Vec<f32>, sample_rate: u32) -> EngineResult<Vec<u8>> {
    let response = dispatch(WorkerRequest::FloatToWav {
        correlation_id: Uuid::new_v4(),
        samples,
        sample_rate,
    })
    .await?;

    match response {
        WorkerResponse::FloatToWavResult { result, .. } => Ok(result),
        other => Err(EngineError::Worker(format!(
            "unexpected worker response: {:?}",
            other
        ))),
    }
}

/// Convert float samples to int16 on the background worker. Returns the
/// samples and a base64 rendition of their little-endian bytes.
pub async fn float_to_int16_async(samples: Vec<f32>) -> EngineResult<(Vec<i16>, String)> {
    let response = dispatch(WorkerRequest::FloatToInt16 {
        correlation_id: Uuid::new_v4(),
        samples,
    })
    .await?;

    match response {
        WorkerResponse::FloatToInt16Result { result, base64, .. } => Ok((result, base64)),
        other => Err(EngineError::Worker(format!(
            "unexpected worker response: {:?}",
            other
        ))),
    }
}
