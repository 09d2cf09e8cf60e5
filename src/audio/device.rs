//! Input device enumeration

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::PipelineError;

/// Device id reserved for the system default input.
pub const DEFAULT_DEVICE_ID: i32 = -1;

/// An input device the user can record from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceDescriptor {
    /// Index among the host's input devices, or [`DEFAULT_DEVICE_ID`].
    pub id: i32,
    pub name: String,
}

impl AudioDeviceDescriptor {
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_DEVICE_ID
    }
}

/// List the system default input followed by every input device of the
/// default host. Index 0 is the first hardware device.
pub fn list_input_devices() -> Vec<AudioDeviceDescriptor> {
    let host = cpal::default_host();

    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .map(|name| format!("System default ({})", name))
        .unwrap_or_else(|| "System default".to_string());

    let mut devices = vec![AudioDeviceDescriptor {
        id: DEFAULT_DEVICE_ID,
        name: default_name,
    }];

    match host.input_devices() {
        Ok(inputs) => {
            devices.extend(inputs.enumerate().map(|(i, d)| AudioDeviceDescriptor {
                id: i as i32,
                name: d.name().unwrap_or_else(|_| "Unknown".to_string()),
            }));
        }
        Err(e) => log::warn!("Failed to enumerate input devices: {}", e),
    }

    log::info!("Found {} input device(s)", devices.len() - 1);
    devices
}

/// Resolve a device id to an open-able cpal device.
pub(crate) fn find_input_device(id: i32) -> Result<cpal::Device, PipelineError> {
    let host = cpal::default_host();

    if id == DEFAULT_DEVICE_ID {
        return host
            .default_input_device()
            .ok_or_else(|| PipelineError::DeviceUnavailable("no default input device".into()));
    }

    let index = usize::try_from(id)
        .map_err(|_| PipelineError::DeviceUnavailable(format!("invalid device id {}", id)))?;

    host.input_devices()
        .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?
        .nth(index)
        .ok_or_else(|| PipelineError::DeviceUnavailable(format!("device {} not found", id)))
}
