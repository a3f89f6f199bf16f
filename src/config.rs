//! Configuration file of the roof driver.
//!
//! The file is TOML; every field has a default so a partial file (or no
//! file at all) is valid. The channel selections are written back by
//! [`Settings::save`] when the user changes the mapping at runtime.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::{
    error::{RoofError, RoofResult},
    function_map::ChannelSelections,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Env {
    pub log_level: String,
}

impl Default for Env {
    fn default() -> Self {
        Env {
            log_level: "info".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Link {
    pub host: String,
    pub port: u16,
    /// Upper bound for a single connect, write or read on the socket.
    pub io_timeout_ms: u64,
    pub read_retry_delay_ms: u64,
    /// Silence that ends an answer once the channel states arrived.
    pub quiet_timeout_ms: u64,
    /// Total number of read attempts before a refresh is given up.
    pub read_attempts: usize,
    /// Number of bytes read for one answer.
    pub response_size: usize,
}

impl Default for Link {
    fn default() -> Self {
        Link {
            host: "192.168.1.100".to_owned(),
            port: 666,
            io_timeout_ms: 2000,
            read_retry_delay_ms: 500,
            quiet_timeout_ms: 100,
            read_attempts: 3,
            response_size: 58,
        }
    }
}

impl Link {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn read_retry_delay(&self) -> Duration {
        Duration::from_millis(self.read_retry_delay_ms)
    }

    pub fn quiet_timeout(&self) -> Duration {
        Duration::from_millis(self.quiet_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Roof {
    /// Time allowed for a full opening or closing.
    pub motion_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for Roof {
    fn default() -> Self {
        Roof {
            motion_timeout_secs: 20,
            poll_interval_ms: 2000,
        }
    }
}

impl Roof {
    pub fn motion_timeout(&self) -> Duration {
        Duration::from_secs(self.motion_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub env: Env,
    pub link: Link,
    pub roof: Roof,
    pub channels: ChannelSelections,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> RoofResult<Settings> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> RoofResult<Settings> {
        let text = fs::read_to_string(path).map_err(|error| {
            RoofError::configuration(&format!(
                "Cannot read config file {}: {error}",
                path.display()
            ))
        })?;
        Settings::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> RoofResult<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn save(&self, path: &Path) -> RoofResult<()> {
        let text = self.to_toml_string()?;
        fs::write(path, text).map_err(|error| {
            RoofError::configuration(&format!(
                "Cannot write config file {}: {error}",
                path.display()
            ))
        })
    }

    fn validate(&self) -> RoofResult<()> {
        if self.link.read_attempts == 0 {
            return Err(RoofError::configuration(
                "link.read_attempts must be at least 1.",
            ));
        }
        if self.link.response_size < 8 {
            return Err(RoofError::configuration(
                "link.response_size must be at least 8 bytes.",
            ));
        }
        if self.roof.poll_interval_ms == 0 {
            return Err(RoofError::configuration(
                "roof.poll_interval_ms must not be 0.",
            ));
        }
        Ok(())
    }
}
