//! # Background Audio Worker
//!
//! A dedicated thread for CPU-heavy codec conversions so they never run on
//! the interactive thread. Communication is message passing only: tagged
//! request messages carrying a correlation identifier, answered by
//! matching `*_RESULT` (or `ERROR`) responses carrying the same
//! identifier. The worker processes one message at a time; responses are
//! self-describing, so no locking is needed around the shared worker.
//!
//! A failed request produces a typed `Error` response for that request
//! only; the worker itself keeps serving.

use crate::audio::codec;
use crate::error::EngineError;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use tracing::{debug, info};
use uuid::Uuid;

/// Request messages accepted by the worker, tagged by operation name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerRequest {
    #[serde(rename = "DOWNSAMPLE")]
    Downsample {
        correlation_id: Uuid,
        audio: Vec<f32>,
        input_rate: u32,
        target_rate: u32,
    },

    #[serde(rename = "FLOAT_TO_WAV")]
    FloatToWav {
        correlation_id: Uuid,
        samples: Vec<f32>,
        sample_rate: u32,
    },

    #[serde(rename = "FLOAT_TO_INT16")]
    FloatToInt16 {
        correlation_id: Uuid,
        samples: Vec<f32>,
    },
}

impl WorkerRequest {
    pub fn correlation_id(&self) -> Uuid {
        match self {
            WorkerRequest::Downsample { correlation_id, .. }
            | WorkerRequest::FloatToWav { correlation_id, .. }
            | WorkerRequest::FloatToInt16 { correlation_id, .. } => *correlation_id,
        }
    }
}

/// Response messages, tagged by a `_RESULT` suffix or `ERROR`, always
/// carrying the request's correlation identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerResponse {
    #[serde(rename = "DOWNSAMPLE_RESULT")]
    DownsampleResult {
        correlation_id: Uuid,
        result: Vec<f32>,
    },

    #[serde(rename = "FLOAT_TO_WAV_RESULT")]
    FloatToWavResult {
        correlation_id: Uuid,
        result: Vec<u8>,
    },

    #[serde(rename = "FLOAT_TO_INT16_RESULT")]
    FloatToInt16Result {
        correlation_id: Uuid,
        result: Vec<i16>,
        base64: String,
    },

    #[serde(rename = "ERROR")]
    Error {
        correlation_id: Uuid,
        message: String,
    },
}

impl WorkerResponse {
    pub fn correlation_id(&self) -> Uuid {
        match self {
            WorkerResponse::DownsampleResult { correlation_id, .. }
            | WorkerResponse::FloatToWavResult { correlation_id, .. }
            | WorkerResponse::FloatToInt16Result { correlation_id, .. }
            | WorkerResponse::Error { correlation_id, .. } => *correlation_id,
        }
    }
}

/// Process one request. Pure with respect to worker state, so the error
/// path is directly testable.
pub fn handle_request(request: WorkerRequest) -> WorkerResponse {
    match request {
        WorkerRequest::Downsample {
            correlation_id,
            audio,
            input_rate,
            target_rate,
        } => match codec::downsample_audio(audio, input_rate, target_rate) {
            Ok(result) => WorkerResponse::DownsampleResult {
                correlation_id,
                result,
            },
            Err(e) => WorkerResponse::Error {
                correlation_id,
                message: e.to_string(),
            },
        },

        WorkerRequest::FloatToWav {
            correlation_id,
            samples,
            sample_rate,
        } => WorkerResponse::FloatToWavResult {
            correlation_id,
            result: codec::float_to_wav(&samples, sample_rate),
        },

        WorkerRequest::FloatToInt16 {
            correlation_id,
            samples,
        } => {
            let result = codec::float_to_int16(&samples);

            // Base64 of the little-endian bytes, computed here so the
            // interactive thread never pays for it
            let mut bytes = Vec::with_capacity(result.len() * 2);
            for sample in &result {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
            let base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);

            WorkerResponse::FloatToInt16Result {
                correlation_id,
                result,
                base64,
            }
        }
    }
}

/// Spawn the worker thread. Runs until the request channel closes.
pub fn spawn_worker(
    requests: Receiver<WorkerRequest>,
    responses: Sender<WorkerResponse>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("audio-worker".to_string())
        .spawn(move || {
            info!("Audio worker started");
            while let Ok(request) = requests.recv() {
                let id = request.correlation_id();
                debug!("Audio worker handling request {}", id);
                if responses.send(handle_request(request)).is_err() {
                    // Response channel closed: bridge is gone
                    break;
                }
            }
            info!("Audio worker stopped");
        })
        .expect("failed to spawn audio worker thread")
}

/// Map a worker `Error` response into the engine error type.
pub fn worker_error(message: String) -> EngineError {
    EngineError::Worker(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_request() {
        let id = Uuid::new_v4();
        let response = handle_request(WorkerRequest::Downsample {
            correlation_id: id,
            audio: vec![0.0; 480],
            input_rate: 48000,
            target_rate: 16000,
        });

        match response {
            WorkerResponse::DownsampleResult {
                correlation_id,
                result,
            } => {
                assert_eq!(correlation_id, id);
                assert_eq!(result.len(), 160);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_failed_request_reports_typed_error() {
        let id = Uuid::new_v4();
        let response = handle_request(WorkerRequest::Downsample {
            correlation_id: id,
            audio: vec![0.0; 100],
            input_rate: 8000,
            target_rate: 16000,
        });

        match response {
            WorkerResponse::Error {
                correlation_id,
                message,
            } => {
                assert_eq!(correlation_id, id);
                assert!(message.contains("upsampling"));
            }
            other => panic!("expected error response, got {:?}", other),
        }
    }

    #[test]
    fn test_int16_request_includes_base64() {
        let id = Uuid::new_v4();
        let response = handle_request(WorkerRequest::FloatToInt16 {
            correlation_id: id,
            samples: vec![0.0, 1.0],
        });

        match response {
            WorkerResponse::FloatToInt16Result { result, base64, .. } => {
                assert_eq!(result, vec![0, 32767]);
                // 0x0000 then 0x7FFF little-endian
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(base64)
                    .unwrap();
                assert_eq!(decoded, vec![0x00, 0x00, 0xFF, 0x7F]);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_wire_tags() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(WorkerRequest::FloatToWav {
            correlation_id: id,
            samples: vec![],
            sample_rate: 16000,
        })
        .unwrap();
        assert_eq!(json["type"], "FLOAT_TO_WAV");

        let json = serde_json::to_value(WorkerResponse::Error {
            correlation_id: id,
            message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "ERROR");
        assert_eq!(json["correlation_id"], serde_json::json!(id));
    }

    #[test]
    fn test_worker_thread_round_trip() {
        let (req_tx, req_rx) = std::sync::mpsc::channel();
        let (resp_tx, resp_rx) = std::sync::mpsc::channel();
        let handle = spawn_worker(req_rx, resp_tx);

        let id = Uuid::new_v4();
        req_tx
            .send(WorkerRequest::FloatToWav {
                correlation_id: id,
                samples: vec![0.0; 8],
                sample_rate: 16000,
            })
            .unwrap();

        let response = resp_rx.recv().unwrap();
        assert_eq!(response.correlation_id(), id);
        match response {
            WorkerResponse::FloatToWavResult { result, .. } => {
                assert_eq!(result.len(), 44 + 16);
            }
            other => panic!("unexpected response: {:?}", other),
        }

        drop(req_tx);
        handle.join().unwrap();
    }
}
