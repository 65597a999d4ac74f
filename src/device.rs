//! # Device Detection
//!
//! Detects whether a hardware accelerator (CUDA or Metal) is available for
//! model inference and hands out the corresponding Candle device. Detection
//! is cached process-wide; the result does not change over a process
//! lifetime, so engine selection stays deterministic.

use candle_core::Device;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Cached accelerator probe result to avoid repeated detection.
static ACCELERATOR: OnceLock<Option<Device>> = OnceLock::new();

/// Device detection and selection utilities.
pub struct DeviceManager;

impl DeviceManager {
    /// Get the accelerator device, if the hardware supports one (cached).
    pub fn accelerator() -> Option<Device> {
        ACCELERATOR
            .get_or_init(Self::detect_accelerator)
            .clone()
    }

    /// Whether a hardware accelerator is available.
    pub fn accelerator_available() -> bool {
        Self::accelerator().is_some()
    }

    /// Probe for an accelerator: CUDA first (NVIDIA), then Metal (Apple Silicon).
    fn detect_accelerator() -> Option<Device> {
        info!("Detecting compute accelerator...");

        if let Some(device) = Self::get_cuda_device() {
            info!("CUDA accelerator available");
            return Some(device);
        }

        if let Some(device) = Self::get_metal_device() {
            info!("Metal accelerator available");
            return Some(device);
        }

        info!("No accelerator available, inference will run on CPU");
        None
    }

    fn get_cuda_device() -> Option<Device> {
        match Device::new_cuda(0) {
            Ok(device) => {
                debug!("CUDA device 0 available");
                Some(device)
            }
            Err(e) => {
                debug!("CUDA not available: {}", e);
                None
            }
        }
    }

    fn get_metal_device() -> Option<Device> {
        match Device::new_metal(0) {
            Ok(device) => {
                debug!("Metal device 0 available");
                Some(device)
            }
            Err(e) => {
                debug!("Metal not available: {}", e);
                None
            }
        }
    }

    /// Human-readable device label for diagnostics.
    pub fn device_label(device: &Device) -> &'static str {
        match device {
            Device::Cpu => "CPU",
            Device::Cuda(_) => "CUDA GPU",
            Device::Metal(_) => "Metal GPU",
        }
    }
}
