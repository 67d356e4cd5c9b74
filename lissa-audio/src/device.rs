//! Audio device selection and the cpal output backend

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::Sender;
use tracing::{debug, error};

use crate::engine::{AudioEvent, EngineError, OutputBackend, OutputFormat, OutputStream};
use crate::generator::SampleGenerator;

/// Names of the available output devices
pub fn list_output_devices() -> Result<Vec<String>, EngineError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| EngineError::Devices(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Output device by name, or the default if `name` is `None`
pub fn output_device(name: Option<&str>) -> Result<cpal::Device, EngineError> {
    let host = cpal::default_host();

    match name {
        Some(device_name) => {
            let devices = host
                .output_devices()
                .map_err(|e| EngineError::Devices(e.to_string()))?;

            for device in devices {
                if let Ok(n) = device.name() {
                    if n == device_name {
                        return Ok(device);
                    }
                }
            }
            Err(EngineError::DeviceNotFound(device_name.to_string()))
        }
        None => host.default_output_device().ok_or(EngineError::NoDevice),
    }
}

/// Pick an f32 stream config, preferring `sample_rate` and stereo
fn choose_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig, EngineError> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| EngineError::Config(e.to_string()))?;

    let mut best: Option<(u16, cpal::SupportedStreamConfigRange)> = None;
    for range in supported {
        if range.sample_format() != SampleFormat::F32 {
            continue;
        }
        if sample_rate < range.min_sample_rate().0 || sample_rate > range.max_sample_rate().0 {
            continue;
        }
        // Closest to two channels wins
        let distance = range.channels().abs_diff(2);
        if best.as_ref().map_or(true, |(d, _)| distance < *d) {
            best = Some((distance, range));
        }
    }

    if let Some((_, range)) = best {
        return Ok(range.with_sample_rate(SampleRate(sample_rate)).config());
    }

    // Fall back to whatever the device prefers
    let default_config = device
        .default_output_config()
        .map_err(|e| EngineError::Config(e.to_string()))?;
    if default_config.sample_format() != SampleFormat::F32 {
        return Err(EngineError::UnsupportedFormat(format!(
            "{:?}",
            default_config.sample_format()
        )));
    }
    Ok(default_config.config())
}

/// Output backend on the system audio host
pub struct CpalBackend {
    device_name: Option<String>,
    device: Option<cpal::Device>,
    config: Option<StreamConfig>,
}

impl CpalBackend {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            device: None,
            config: None,
        }
    }
}

impl OutputBackend for CpalBackend {
    type Stream = CpalStream;

    fn negotiate(&mut self, sample_rate: u32) -> Result<OutputFormat, EngineError> {
        let device = output_device(self.device_name.as_deref())?;
        let config = choose_config(&device, sample_rate)?;
        debug!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "Output config chosen"
        );

        let format = OutputFormat {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };
        self.device = Some(device);
        self.config = Some(config);
        Ok(format)
    }

    fn build_stream(
        &mut self,
        format: OutputFormat,
        mut generator: SampleGenerator,
        events: Sender<AudioEvent>,
    ) -> Result<CpalStream, EngineError> {
        let device = self.device.as_ref().ok_or(EngineError::NoDevice)?;
        let config = self
            .config
            .clone()
            .ok_or_else(|| EngineError::Config("format not negotiated".into()))?;
        let channels = format.channels as usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    generator.render(data, channels);
                },
                move |err| {
                    error!(error = %err, "Audio stream error");
                    let _ = events.try_send(AudioEvent::StreamError(err.to_string()));
                },
                None,
            )
            .map_err(|e| EngineError::BuildStream(e.to_string()))?;

        Ok(CpalStream { stream })
    }
}

/// A cpal output stream
pub struct CpalStream {
    stream: cpal::Stream,
}

impl OutputStream for CpalStream {
    fn play(&self) -> Result<(), EngineError> {
        self.stream
            .play()
            .map_err(|e| EngineError::Play(e.to_string()))
    }

    fn pause(&self) -> Result<(), EngineError> {
        self.stream
            .pause()
            .map_err(|e| EngineError::Pause(e.to_string()))
    }
}
