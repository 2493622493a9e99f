use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Server configuration, loaded from an optional TOML file.
///
/// Every field has a default, a missing file means defaults, and CLI flags
/// override whatever the file provided.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Bind address for the UDP socket.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// UDP port for receiving syslog/raw messages (514 needs root).
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    /// SQLite database file path.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_udp_port() -> u16 {
    5514
}

fn default_db_path() -> PathBuf {
    PathBuf::from("omnilog.db")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            udp_port: default_udp_port(),
            db_path: default_db_path(),
        }
    }
}

#[derive(Default, Deserialize)]
struct ConfigFile {
    server: Option<ServerConfig>,
}

impl ServerConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&raw)?;
        Ok(file.server.unwrap_or_default())
    }

    /// The socket address string for the UDP receiver.
    pub fn udp_addr(&self) -> String {
        format!("{}:{}", self.bind, self.udp_port)
    }
}
