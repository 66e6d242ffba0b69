//! Configuration management for CrabCast
//!
//! Loads, saves and validates the stream settings: transport packet size,
//! video format, encoder pacing and the reassembly window.

use crate::errors::StreamError;
use crate::reassembly::{DEFAULT_WINDOW, MAX_WINDOW};
use crate::stream::backpressure::{DEFAULT_KEYFRAME_INTERVAL, DEFAULT_MAX_ENCODE_QUEUE};
use crate::wire::HEADER_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrabCastConfig {
    pub transport: TransportConfig,
    pub video: VideoConfig,
    pub encoder: EncoderConfig,
    pub reassembly: ReassemblyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Largest datagram the transport accepts, header included
    pub max_packet_size: usize,
}

/// Supported video codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    Vp9,
    H264,
    Av1,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    pub framerate: u32,
    pub codec: VideoCodec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Force a key frame every N admitted frames (0 = first frame only)
    pub keyframe_interval: u32,
    /// Captured frames are dropped while more than this many are in flight
    pub max_encode_queue: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// Frames tracked ahead of the delivery cursor
    pub window: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_packet_size: 1200,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            bitrate: 2_000_000,
            framerate: 30,
            codec: VideoCodec::Vp8,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            max_encode_queue: DEFAULT_MAX_ENCODE_QUEUE,
        }
    }
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl CrabCastConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StreamError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: CrabCastConfig = toml::from_str(&contents)
            .map_err(|e| StreamError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StreamError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| StreamError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabcast.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values. Any failure is fatal at startup.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.transport.max_packet_size <= HEADER_SIZE {
            return Err(StreamError::Config(format!(
                "max_packet_size must exceed the {}-byte header (got {})",
                HEADER_SIZE, self.transport.max_packet_size
            )));
        }
        if self.transport.max_packet_size > u16::MAX as usize {
            return Err(StreamError::Config(
                "max_packet_size must fit in a UDP datagram".to_string(),
            ));
        }

        if self.video.width == 0 || self.video.height == 0 {
            return Err(StreamError::Config("Invalid video resolution".to_string()));
        }
        if self.video.framerate == 0 || self.video.framerate > 240 {
            return Err(StreamError::Config(
                "Invalid framerate (must be 1-240)".to_string(),
            ));
        }
        if self.video.bitrate == 0 {
            return Err(StreamError::Config("Bitrate must be positive".to_string()));
        }

        if self.reassembly.window == 0 || self.reassembly.window > MAX_WINDOW {
            return Err(StreamError::Config(format!(
                "Reassembly window must be between 1 and {}",
                MAX_WINDOW
            )));
        }

        Ok(())
    }
}
