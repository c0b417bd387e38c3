//! Application settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use traffic_buffer::{BufferConfig, LocalPort};
use traffic_sim::TrafficProfile;

/// A local port to watch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortSettings {
    /// Local port of the mapping
    pub local_port: u16,
    /// Label used in log output
    #[serde(default)]
    pub label: String,
    /// Simulated traffic for this port
    #[serde(default)]
    pub profile: TrafficProfile,
}

impl PortSettings {
    /// Create settings for a port with the default profile
    pub fn new(local_port: u16) -> Self {
        Self {
            local_port,
            label: String::new(),
            profile: TrafficProfile::default(),
        }
    }

    /// The port as a buffer key
    pub fn key(&self) -> LocalPort {
        LocalPort(self.local_port)
    }

    /// Label for display, falling back to the port
    pub fn display_name(&self) -> String {
        if self.label.is_empty() {
            self.key().to_string()
        } else {
            format!("{} ({})", self.label, self.key())
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Traffic buffer configuration
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Ports to watch on startup
    #[serde(default = "default_ports")]
    pub ports: Vec<PortSettings>,
    /// Seconds between summary log lines
    #[serde(default = "default_summary_interval")]
    pub summary_interval_secs: u64,
}

fn default_ports() -> Vec<PortSettings> {
    vec![PortSettings::new(8080)]
}

fn default_summary_interval() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            ports: default_ports(),
            summary_interval_secs: default_summary_interval(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for trafficwatch
    /// Uses $XDG_CONFIG_HOME/trafficwatch on Linux/macOS, falls back to ~/.config/trafficwatch
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("trafficwatch"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("trafficwatch"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific file
    ///
    /// Returns `None` if the file is missing or not valid settings JSON.
    pub fn load_from(path: &Path) -> Option<Self> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path =
            Self::settings_path().ok_or_else(|| "Could not determine settings path".to_string())?;
        self.save_to(&path)
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }

    /// Replace the watched ports with the ones given on the command line
    ///
    /// Arguments that are not port numbers are returned unchanged so the
    /// caller can report them.
    pub fn apply_port_args<I, A>(&mut self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let mut ports = Vec::new();
        let mut rejected = Vec::new();

        for arg in args {
            let arg = arg.into();
            match arg.parse::<u16>() {
                Ok(port) if port != 0 => {
                    if !ports.iter().any(|p: &PortSettings| p.local_port == port) {
                        ports.push(
                            self.ports
                                .iter()
                                .find(|p| p.local_port == port)
                                .cloned()
                                .unwrap_or_else(|| PortSettings::new(port)),
                        );
                    }
                }
                _ => rejected.push(arg),
            }
        }

        if !ports.is_empty() {
            self.ports = ports;
        }
        rejected
    }
}
