//! # Compute Device Selection
//!
//! Picks the candle device the model runs on. "auto" probes CUDA, then
//! Metal, then falls back to CPU; explicit GPU preferences also fall back
//! to CPU with a warning rather than failing startup.

use candle_core::Device;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

static DETECTED_DEVICE: OnceLock<Device> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            _ => Err(format!("unknown device preference: {}", s)),
        }
    }
}

/// Resolve a configured device string, warning and falling back to auto
/// detection when it does not parse.
pub fn device_from_config(device: &str) -> Device {
    match device.parse::<DevicePreference>() {
        Ok(preference) => select_device(preference),
        Err(_) => {
            warn!("invalid device preference '{}', using auto detection", device);
            select_device(DevicePreference::Auto)
        }
    }
}

pub fn select_device(preference: DevicePreference) -> Device {
    match preference {
        DevicePreference::Auto => DETECTED_DEVICE.get_or_init(detect_best_device).clone(),
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => try_cuda().unwrap_or_else(|| {
            warn!("CUDA requested but unavailable, falling back to CPU");
            Device::Cpu
        }),
        DevicePreference::Metal => try_metal().unwrap_or_else(|| {
            warn!("Metal requested but unavailable, falling back to CPU");
            Device::Cpu
        }),
    }
}

fn detect_best_device() -> Device {
    if let Some(device) = try_cuda() {
        info!("selected CUDA GPU for inference");
        return device;
    }
    if let Some(device) = try_metal() {
        info!("selected Metal GPU for inference");
        return device;
    }
    info!("no GPU acceleration available, using CPU for inference");
    Device::Cpu
}

fn try_cuda() -> Option<Device> {
    match Device::new_cuda(0) {
        Ok(device) => Some(device),
        Err(e) => {
            debug!("CUDA not available: {}", e);
            None
        }
    }
}

fn try_metal() -> Option<Device> {
    match Device::new_metal(0) {
        Ok(device) => Some(device),
        Err(e) => {
            debug!("Metal not available: {}", e);
            None
        }
    }
}

pub fn describe_device(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "CPU",
        Device::Cuda(_) => "CUDA GPU",
        Device::Metal(_) => "Metal GPU",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parsing() {
        assert_eq!("auto".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert_eq!("CPU".parse::<DevicePreference>().unwrap(), DevicePreference::Cpu);
        assert_eq!("gpu".parse::<DevicePreference>().unwrap(), DevicePreference::Cuda);
        assert_eq!("metal".parse::<DevicePreference>().unwrap(), DevicePreference::Metal);
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn cpu_preference_always_resolves() {
        let device = select_device(DevicePreference::Cpu);
        assert!(matches!(device, Device::Cpu));
    }

    #[test]
    fn invalid_config_string_falls_back() {
        let device = device_from_config("quantum");
        assert!(!describe_device(&device).is_empty());
    }
}
