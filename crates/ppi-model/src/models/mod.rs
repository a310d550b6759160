pub mod interaction_model;

pub use interaction_model::{InteractionModel, PairPrediction};

use anyhow::{anyhow, Result};
use candle_core::Device;

/// Converts a device string (`"cpu"`, `"cuda"`, `"cuda:N"`) to a candle
/// `Device`.
pub fn get_device(device_str: &str) -> Result<Device> {
    if device_str.starts_with("cuda") {
        let cuda_index = if device_str == "cuda" {
            0
        } else {
            device_str
                .split(':')
                .nth(1)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0)
        };
        let device = Device::cuda_if_available(cuda_index)?;
        if !device.is_cuda() {
            return Err(anyhow!("CUDA device {} is not available", cuda_index));
        }
        Ok(device)
    } else {
        match device_str {
            "cpu" => Ok(Device::Cpu),
            _ => Err(anyhow!("Unsupported device type: {}", device_str)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_device_resolves() {
        assert!(get_device("cpu").is_ok());
        assert!(get_device("tpu").is_err());
    }
}
