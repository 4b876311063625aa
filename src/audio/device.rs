//! Output device abstraction and enumeration

use serde::Serialize;

use crate::audio::buffer::SampleBuffer;
use crate::audio::format::AudioFormat;
use crate::error::DeviceError;

/// Called once a scheduled buffer has been fully rendered
pub type CompletionHandler = Box<dyn FnOnce() + Send + 'static>;

/// Audio output that accepts buffers and renders them in schedule order.
///
/// Completion handlers run off the control context, in the order their
/// buffers were scheduled. Handlers for buffers dropped by `reset` are never
/// called. A device may also lose a handler when its notification path is
/// saturated; implementations should count such losses in their stats.
pub trait OutputDevice: Send + Sync {
    /// Prepare the output path for buffers of `format`
    fn connect(&self, format: &AudioFormat) -> Result<(), DeviceError>;

    /// Queue a buffer behind everything already scheduled
    fn schedule(&self, buffer: SampleBuffer, on_complete: CompletionHandler)
        -> Result<(), DeviceError>;

    /// Start or resume rendering
    fn play(&self) -> Result<(), DeviceError>;

    /// Pause rendering, keeping the current schedule and position
    fn pause(&self);

    /// Halt rendering
    fn stop(&self);

    /// Drop every queued-but-unplayed buffer
    fn reset(&self);
}

/// Output device description for listings
#[derive(Debug, Clone, Serialize)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// Check that a format is one this crate can render
pub(crate) fn validate_format(format: &AudioFormat) -> Result<(), DeviceError> {
    if format.channels != 1 {
        return Err(DeviceError::UnsupportedFormat(format!(
            "{} channels (only mono is supported)",
            format.channels
        )));
    }
    if !(format.sample_rate.is_finite() && format.sample_rate > 0.0) {
        return Err(DeviceError::UnsupportedFormat(format!(
            "sample rate {}",
            format.sample_rate
        )));
    }
    Ok(())
}

/// List all available output devices
#[cfg(feature = "playback")]
pub fn list_output_devices() -> Vec<OutputDeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device.name() {
                let (sample_rates, channels) = get_device_capabilities(&device);
                devices.push(OutputDeviceInfo {
                    is_default: default_name.as_ref() == Some(&name),
                    name,
                    sample_rates,
                    channels,
                });
            }
        }
    }
    devices
}

#[cfg(feature = "playback")]
fn get_device_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    use cpal::traits::DeviceTrait;

    let mut rates = Vec::new();
    let mut chans = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            for rate_val in [22050u32, 44100, 48000, 88200, 96000] {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !rates.contains(&rate_val)
                {
                    rates.push(rate_val);
                }
            }
            let ch = config.channels();
            if !chans.contains(&ch) {
                chans.push(ch);
            }
        }
    }

    rates.sort();
    chans.sort();
    (rates, chans)
}

/// Find an output device by name, or the default device for `None`
#[cfg(feature = "playback")]
pub fn find_output_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let Some(name) = name else {
        return host
            .default_output_device()
            .ok_or_else(|| DeviceError::DeviceNotFound("No default output device".to_string()));
    };

    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::DeviceNotFound(e.to_string()))?;
    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }

    Err(DeviceError::DeviceNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_format() {
        assert!(validate_format(&AudioFormat::default()).is_ok());

        let stereo = AudioFormat {
            channels: 2,
            ..AudioFormat::default()
        };
        assert!(matches!(
            validate_format(&stereo),
            Err(DeviceError::UnsupportedFormat(_))
        ));
        assert!(validate_format(&AudioFormat::mono_f32(0.0)).is_err());
    }
}
