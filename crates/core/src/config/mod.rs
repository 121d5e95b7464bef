use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{Result, RowOverflow, WaveGridError, WaveShape};

/// Shortest tone the envelope can describe: 20 ms attack plus 50 ms decay.
pub const MIN_TONE_SECONDS: f64 = 0.07;

/// Top-level configuration structure for the application. Fixed at startup and
/// handed to constructors by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub wave: WaveConfig,
    pub tone: ToneConfig,
    pub animation: AnimationConfig,
    pub serialosc: SerialOscConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every section, returning the first violation found.
    pub fn validate(&self) -> Result<()> {
        self.wave.validate()?;
        self.tone.validate()?;
        self.animation.validate()
    }
}

/// Geometry of the grid and the wave drawn onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub grid_size: usize,
    pub internal_resolution: usize,
    pub amplitude: f64,
    pub brightness_max: u8,
    pub shape: WaveShape,
    pub row_overflow: RowOverflow,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            grid_size: 8,
            internal_resolution: 32,
            amplitude: 1.0,
            brightness_max: 15,
            shape: WaveShape::Sine,
            row_overflow: RowOverflow::Saturate,
        }
    }
}

impl WaveConfig {
    fn validate(&self) -> Result<()> {
        if self.grid_size < 2 {
            return Err(WaveGridError::config("wave.grid_size must be at least 2"));
        }
        if self.internal_resolution < 2 {
            return Err(WaveGridError::config(
                "wave.internal_resolution must be at least 2",
            ));
        }
        if !self.amplitude.is_finite() {
            return Err(WaveGridError::config("wave.amplitude must be finite"));
        }
        if !(1..=15).contains(&self.brightness_max) {
            return Err(WaveGridError::config(
                "wave.brightness_max must be within 1..=15",
            ));
        }
        Ok(())
    }
}

/// Parameters of the synthesized tone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub enabled: bool,
    pub base_frequency: f64,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub pitch_variation: f64,
    /// Tones waiting for playback beyond this are dropped.
    pub queue_capacity: usize,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_frequency: 440.0,
            sample_rate: 44_100,
            duration_seconds: 0.1,
            pitch_variation: 0.02,
            queue_capacity: 1,
        }
    }
}

impl ToneConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(WaveGridError::config("tone.sample_rate must be positive"));
        }
        if !(self.base_frequency.is_finite() && self.base_frequency > 0.0) {
            return Err(WaveGridError::config(
                "tone.base_frequency must be a positive number",
            ));
        }
        if !(self.duration_seconds.is_finite() && self.duration_seconds >= MIN_TONE_SECONDS) {
            return Err(WaveGridError::config(format!(
                "tone.duration_seconds must be at least {MIN_TONE_SECONDS}"
            )));
        }
        if !self.pitch_variation.is_finite() {
            return Err(WaveGridError::config("tone.pitch_variation must be finite"));
        }
        if self.queue_capacity == 0 {
            return Err(WaveGridError::config("tone.queue_capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Frame cadence and phase drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub frame_interval_ms: u64,
    pub phase_increment: f64,
    pub indicator_threshold: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 20,
            phase_increment: 0.1,
            indicator_threshold: 0.1,
        }
    }
}

impl AnimationConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.frame_interval_ms == 0 {
            return Err(WaveGridError::config(
                "animation.frame_interval_ms must be positive",
            ));
        }
        if !self.phase_increment.is_finite() {
            return Err(WaveGridError::config(
                "animation.phase_increment must be finite",
            ));
        }
        if !(self.indicator_threshold.is_finite() && self.indicator_threshold >= 0.0) {
            return Err(WaveGridError::config(
                "animation.indicator_threshold must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// Where serialosc lives and how grids are addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialOscConfig {
    /// Address of the host running both serialosc and the grids.
    pub host: IpAddr,
    pub daemon_port: u16,
    pub prefix: String,
}

impl Default for SerialOscConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            daemon_port: 12_002,
            prefix: "/wave".to_string(),
        }
    }
}

impl SerialOscConfig {
    pub fn daemon_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.daemon_port)
    }
}
