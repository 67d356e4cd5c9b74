//! Simple configuration persistence for Lissa
//!
//! Stores the starting oscillator parameters, ramp times and host settings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lissa_audio::{EngineConfig, OscillatorParams, ParamSnapshot, RampTimes, DEFAULT_POINT_CAPACITY};

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Starting oscillator parameters (frequencies in Hz)
    pub params: OscillatorParams,
    /// Starting audio gain
    pub mute: f32,
    pub ramp_times: RampTimes,
    /// Preferred output sample rate
    pub sample_rate: u32,
    /// Points kept for display
    pub point_capacity: usize,
    /// Display poll rate
    pub fps: u32,
    /// Output device name
    pub device: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            params: OscillatorParams::default(),
            mute: 1.0,
            ramp_times: RampTimes::default(),
            sample_rate: 44100,
            point_capacity: DEFAULT_POINT_CAPACITY,
            fps: 30,
            device: None,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.serialize();
        fs::write(path, content)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lissa")
            .join("config.txt")
    }

    /// Engine settings derived from this config
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sample_rate: self.sample_rate,
            point_capacity: self.point_capacity,
            initial: ParamSnapshot {
                params: self.params,
                mute: self.mute,
                ramp_times: self.ramp_times,
            },
            device: self.device.clone(),
            ..EngineConfig::default()
        }
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            // Unparsable values leave the default in place
            let float = || value.parse::<f32>().ok().filter(|v| v.is_finite());
            match key {
                "amplitude_left" => set(&mut config.params.amplitude_left, float()),
                "amplitude_right" => set(&mut config.params.amplitude_right, float()),
                "frequency_left" => set(&mut config.params.frequency_left, float()),
                "frequency_right" => set(&mut config.params.frequency_right, float()),
                "phase" => set(&mut config.params.phase, float()),
                "mute" => set(&mut config.mute, float()),
                "ramp_amplitude" => set(&mut config.ramp_times.amplitude, float()),
                "ramp_frequency" => set(&mut config.ramp_times.frequency, float()),
                "ramp_phase" => set(&mut config.ramp_times.phase, float()),
                "sample_rate" => set(&mut config.sample_rate, value.parse().ok().filter(|&v| v > 0)),
                "point_capacity" => set(&mut config.point_capacity, value.parse().ok().filter(|&v| v > 0)),
                "fps" => set(&mut config.fps, value.parse().ok().filter(|&v| v > 0)),
                "device" => {
                    if !value.is_empty() {
                        config.device = Some(value.to_string());
                    }
                }
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec![
            "# Lissa Configuration".to_string(),
            format!("amplitude_left={}", self.params.amplitude_left),
            format!("amplitude_right={}", self.params.amplitude_right),
            format!("frequency_left={}", self.params.frequency_left),
            format!("frequency_right={}", self.params.frequency_right),
            format!("phase={}", self.params.phase),
            format!("mute={}", self.mute),
            format!("ramp_amplitude={}", self.ramp_times.amplitude),
            format!("ramp_frequency={}", self.ramp_times.frequency),
            format!("ramp_phase={}", self.ramp_times.phase),
            format!("sample_rate={}", self.sample_rate),
            format!("point_capacity={}", self.point_capacity),
            format!("fps={}", self.fps),
        ];

        if let Some(ref device) = self.device {
            lines.push(format!("device={}", device));
        }

        lines.join("\n")
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
