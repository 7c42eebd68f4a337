//! Audio device enumeration and lookup
//!
//! Device IDs take the form `input:<name>` or `output:<name>`; a bare name
//! is treated as an input device.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::audio::format::AudioFormat;
use crate::error::AudioError;

/// Sample rates probed when listing device capabilities
const PROBED_SAMPLE_RATES: [u32; 6] = [8000, 16000, 32000, 44100, 48000, 96000];

/// Serializable description of a device
#[derive(Debug, Clone, Serialize)]
pub struct AudioDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// Direction a device is opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Input => "input:",
            Direction::Output => "output:",
        }
    }
}

/// Wrapper around a cpal device
pub struct AudioDevice {
    inner: cpal::Device,
    pub name: String,
    pub direction: Direction,
}

impl AudioDevice {
    fn from_cpal(device: cpal::Device, direction: Direction) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Self {
            inner: device,
            name,
            direction,
        }
    }

    pub fn id(&self) -> String {
        format!("{}{}", self.direction.prefix(), self.name)
    }

    pub fn into_inner(self) -> cpal::Device {
        self.inner
    }

    /// The device's preferred stream configuration for its direction
    pub fn default_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        let config = match self.direction {
            Direction::Input => self.inner.default_input_config()?,
            Direction::Output => self.inner.default_output_config()?,
        };
        Ok(config)
    }

    /// The device's preferred format
    pub fn default_format(&self) -> Result<AudioFormat, AudioError> {
        let config = self.default_config()?;
        Ok(AudioFormat::new(config.sample_rate().0, config.channels())
            .with_sample_type(config.sample_format().into()))
    }
}

/// List all available audio devices
pub fn list_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let mut devices: Vec<AudioDeviceInfo> = Vec::new();

    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            let Ok(name) = device.name() else { continue };
            let (sample_rates, channels) = capabilities(&device, Direction::Input);
            devices.push(AudioDeviceInfo {
                id: format!("input:{name}"),
                is_default: default_input.as_deref() == Some(name.as_str()),
                name,
                is_input: true,
                is_output: false,
                sample_rates,
                channels,
            });
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            let Ok(name) = device.name() else { continue };
            let is_default = default_output.as_deref() == Some(name.as_str());

            // Duplex devices show up once
            if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                existing.is_output = true;
                existing.is_default |= is_default;
                continue;
            }

            let (sample_rates, channels) = capabilities(&device, Direction::Output);
            devices.push(AudioDeviceInfo {
                id: format!("output:{name}"),
                name,
                is_input: false,
                is_output: true,
                is_default,
                sample_rates,
                channels,
            });
        }
    }

    devices
}

fn capabilities(device: &cpal::Device, direction: Direction) -> (Vec<u32>, Vec<u16>) {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = match direction {
        Direction::Input => device
            .supported_input_configs()
            .map(|it| it.collect())
            .unwrap_or_default(),
        Direction::Output => device
            .supported_output_configs()
            .map(|it| it.collect())
            .unwrap_or_default(),
    };

    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();
    for range in &ranges {
        for rate in PROBED_SAMPLE_RATES {
            let supported = (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&rate);
            if supported && !sample_rates.contains(&rate) {
                sample_rates.push(rate);
            }
        }
        if !channels.contains(&range.channels()) {
            channels.push(range.channels());
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();
    (sample_rates, channels)
}

/// Split a device ID into its direction and name
pub fn parse_device_id(id: &str) -> (Direction, &str) {
    if let Some(name) = id.strip_prefix("output:") {
        (Direction::Output, name)
    } else if let Some(name) = id.strip_prefix("input:") {
        (Direction::Input, name)
    } else {
        (Direction::Input, id)
    }
}

/// Get a device by its ID
pub fn get_device_by_id(id: &str) -> Result<AudioDevice, AudioError> {
    let host = cpal::default_host();
    let (direction, name) = parse_device_id(id);

    let devices = match direction {
        Direction::Input => host.input_devices(),
        Direction::Output => host.output_devices(),
    }
    .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

    devices
        .filter(|d| d.name().map(|n| n == name).unwrap_or(false))
        .map(|d| AudioDevice::from_cpal(d, direction))
        .next()
        .ok_or_else(|| AudioError::DeviceNotFound(id.to_string()))
}

pub fn get_default_input_device() -> Result<AudioDevice, AudioError> {
    cpal::default_host()
        .default_input_device()
        .map(|d| AudioDevice::from_cpal(d, Direction::Input))
        .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string()))
}

pub fn get_default_output_device() -> Result<AudioDevice, AudioError> {
    cpal::default_host()
        .default_output_device()
        .map(|d| AudioDevice::from_cpal(d, Direction::Output))
        .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))
}

/// Resolve an optional configured ID, falling back to the default device
pub fn resolve_device(id: Option<&str>, direction: Direction) -> Result<AudioDevice, AudioError> {
    match (id, direction) {
        (Some(id), _) => get_device_by_id(id),
        (None, Direction::Input) => get_default_input_device(),
        (None, Direction::Output) => get_default_output_device(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_id() {
        assert_eq!(parse_device_id("output:Speakers"), (Direction::Output, "Speakers"));
        assert_eq!(parse_device_id("input:Mic"), (Direction::Input, "Mic"));
        assert_eq!(parse_device_id("Headset"), (Direction::Input, "Headset"));
    }

    #[test]
    fn test_unknown_device() {
        let result = get_device_by_id("output:__no_such_device__");
        assert!(matches!(result, Err(AudioError::DeviceNotFound(_))));
    }
}
