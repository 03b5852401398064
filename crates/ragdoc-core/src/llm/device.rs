//! Compute device selection for local models

use candle_core::{DType, Device};

/// Pick the fastest available device: CUDA, then Metal, then CPU
pub(crate) fn select_device() -> Device {
    if candle_core::utils::cuda_is_available() {
        match Device::new_cuda(0) {
            Ok(device) => return device,
            Err(e) => tracing::warn!("CUDA reported available but failed to open: {}", e),
        }
    }
    if candle_core::utils::metal_is_available() {
        match Device::new_metal(0) {
            Ok(device) => return device,
            Err(e) => tracing::warn!("Metal reported available but failed to open: {}", e),
        }
    }
    Device::Cpu
}

/// Half precision off-CPU, full precision on CPU
pub(crate) fn generation_dtype(device: &Device) -> DType {
    if device.is_cpu() {
        DType::F32
    } else {
        DType::F16
    }
}

pub(crate) fn describe(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}
