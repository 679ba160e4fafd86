//! Configuration handling for the management driver service.
//!
//! Values come from the `services.mgmt` section of the shared config file,
//! then from environment variables, then from the command line.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Management driver service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MgmtConfig {
    /// Datagram socket relaying the kernel control channel
    pub socket_path: String,
    /// Name given to every controller; the hardware name is kept when unset
    pub local_name: Option<String>,
    /// Major device class
    pub class_major: u8,
    /// Minor device class
    pub class_minor: u8,
    /// IO capability set on every registered controller
    pub io_capability: u8,
    /// PIN answered to legacy pairing requests
    pub default_pin: Option<String>,
    /// Oldest management protocol version accepted
    pub min_version: u8,
}

impl Default for MgmtConfig {
    fn default() -> Self {
        Self {
            socket_path: "/run/btmgmt/control.sock".to_string(),
            local_name: None,
            class_major: 0x01,
            class_minor: 0x04,
            io_capability: 0x01,
            default_pin: None,
            min_version: 1,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    services: Option<ServicesConfig>,
}

#[derive(Debug, Deserialize)]
struct ServicesConfig {
    mgmt: Option<ServiceConfig>,
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    args: Option<Vec<String>>,
    config: Option<HashMap<String, String>>,
}

impl MgmtConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_yaml(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?} ({}), using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());

        info!(
            "Final mgmt configuration: socket={}, class={:#04x}/{:#04x}, io_capability={:#04x}",
            config.socket_path, config.class_major, config.class_minor, config.io_capability
        );

        Ok(config)
    }

    /// Parse the shared YAML file, keeping defaults for everything unset
    pub fn from_yaml(content: &str) -> Result<Self> {
        let root: RootConfig = serde_yaml::from_str(content)?;
        let mut config = Self::default();

        if let Some(service) = root.services.and_then(|services| services.mgmt) {
            config.apply_service_config(service);
        }
        Ok(config)
    }

    fn apply_service_config(&mut self, service_config: ServiceConfig) {
        for arg in service_config.args.unwrap_or_default() {
            if let Some(path) = arg.strip_prefix("--socket=") {
                self.socket_path = path.to_string();
            } else if let Some(name) = arg.strip_prefix("--name=") {
                self.local_name = Some(name.to_string());
            }
        }

        for (key, value) in service_config.config.unwrap_or_default() {
            match key.as_str() {
                "services.mgmt.socket_path" => self.socket_path = value,
                "services.mgmt.local_name" => self.local_name = Some(value),
                "services.mgmt.class_major" => set_parsed(&mut self.class_major, &key, &value),
                "services.mgmt.class_minor" => set_parsed(&mut self.class_minor, &key, &value),
                "services.mgmt.io_capability" => {
                    set_parsed(&mut self.io_capability, &key, &value)
                }
                "services.mgmt.pin" => self.default_pin = Some(value),
                "services.mgmt.min_version" => set_parsed(&mut self.min_version, &key, &value),
                _ => {
                    // Ignore unknown configuration keys
                }
            }
        }
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MGMT_SOCKET_PATH") {
            info!("Socket path overridden by environment: {}", path);
            self.socket_path = path;
        }

        if let Some(name) = lookup("MGMT_LOCAL_NAME") {
            info!("Local name overridden by environment: {}", name);
            self.local_name = Some(name);
        }
    }
}

fn set_parsed(field: &mut u8, key: &str, value: &str) {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };

    match parsed {
        Ok(v) => *field = v,
        Err(e) => warn!("Ignoring {}={}: {}", key, value, e),
    }
}
