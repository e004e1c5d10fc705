//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`FIXMUX_*`)
//! - CLI arguments (applied on top by the binary)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Default control-channel port.
pub const DEFAULT_CONTROL_PORT: u16 = 11011;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Control channel configuration
    #[serde(default)]
    pub control: ControlConfig,

    /// Resource limits
    #[serde(default)]
    pub limits: LimitConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| AgentError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("FIXMUX_CONTROL_HOST") {
            config.control.host = host;
        }
        if let Ok(port) = std::env::var("FIXMUX_CONTROL_PORT") {
            if let Ok(port) = port.parse() {
                config.control.port = port;
            }
        }
        if let Ok(val) = std::env::var("FIXMUX_MAX_FRAME_BYTES") {
            if let Ok(val) = val.parse() {
                config.limits.max_frame_bytes = val;
            }
        }

        config
    }

    /// Merge with another config (other takes precedence where it differs
    /// from the defaults)
    pub fn merge(self, other: Self) -> Self {
        let control_defaults = ControlConfig::default();
        let limit_defaults = LimitConfig::default();

        Self {
            control: ControlConfig {
                host: if other.control.host != control_defaults.host {
                    other.control.host
                } else {
                    self.control.host
                },
                port: if other.control.port != control_defaults.port {
                    other.control.port
                } else {
                    self.control.port
                },
            },
            limits: LimitConfig {
                max_frame_bytes: if other.limits.max_frame_bytes != limit_defaults.max_frame_bytes
                {
                    other.limits.max_frame_bytes
                } else {
                    self.limits.max_frame_bytes
                },
                read_buffer_bytes: if other.limits.read_buffer_bytes
                    != limit_defaults.read_buffer_bytes
                {
                    other.limits.read_buffer_bytes
                } else {
                    self.limits.read_buffer_bytes
                },
            },
        }
    }

    /// Address the control listener binds to.
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.control.host, self.control.port)
    }
}

/// Control channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Host to bind the control listener to. Loopback by design: the
    /// channel carries no authentication.
    pub host: String,

    /// Port for the control listener
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_CONTROL_PORT,
        }
    }
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum accepted control frame payload size in bytes. A length
    /// prefix above this fails the control connection.
    pub max_frame_bytes: usize,

    /// Per-read buffer size for FIX-bearing sockets
    pub read_buffer_bytes: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 1024 * 1024,
            read_buffer_bytes: 65536,
        }
    }
}
