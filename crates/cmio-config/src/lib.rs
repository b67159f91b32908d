// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cmio-config
//!
//! Persisted device-identity configuration for the CMIO gateway.
//!
//! The config is a small YAML file holding the device's stable UUID and a
//! couple of deployment switches. Lookup order for its location:
//!
//! 1. `$CM_UTILS_CONFIG_DIR/config.yaml` when the variable is set
//! 2. `/var/lib/cm-utils/config.yaml` when that directory exists and is
//!    writable (probed with a throwaway file)
//! 3. `tmp/config.yaml` relative to the working directory
//!
//! A missing file, or a file without a `device_id`, gets a freshly
//! generated v4 UUID persisted back atomically (write to a `.tmp` sibling,
//! then rename). A read-only location is logged and tolerated; the process
//! keeps running with the generated identity.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the config directory.
pub const ENV_CONFIG_DIR: &str = "CM_UTILS_CONFIG_DIR";

/// Production config directory on the gateway image.
const PROD_CONFIG_DIR: &str = "/var/lib/cm-utils";

/// Config file name inside the chosen directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Result type alias for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from loading or persisting the device config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem error.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but is not valid YAML for the schema.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

// =============================================================================
// DeviceConfig
// =============================================================================

/// The persisted device identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Stable device UUID (v4), generated on first start.
    #[serde(default)]
    pub device_id: String,

    /// Optional deployment type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Bind the TCP push server on all interfaces instead of loopback.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub serve_externally: bool,
}

impl DeviceConfig {
    /// Returns a config with a freshly generated device id.
    fn generated() -> Self {
        Self {
            device_id: uuid::Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Location
// =============================================================================

/// Returns the config file path inside an explicit directory.
pub fn config_path_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Resolves the config file path per the lookup order above.
pub fn config_path() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        if !dir.is_empty() {
            return Path::new(&dir).join(CONFIG_FILE_NAME);
        }
    }

    let prod = Path::new(PROD_CONFIG_DIR);
    if prod.is_dir() && dir_is_writable(prod) {
        return prod.join(CONFIG_FILE_NAME);
    }

    Path::new("tmp").join(CONFIG_FILE_NAME)
}

/// Probes a directory for writability with a throwaway file.
fn dir_is_writable(dir: &Path) -> bool {
    let probe = dir.join(".write_test");
    match fs::File::create(&probe) {
        Ok(file) => {
            drop(file);
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

// =============================================================================
// Load / save
// =============================================================================

/// Loads the config from the resolved path, creating it when missing.
pub fn load_or_init() -> ConfigResult<DeviceConfig> {
    let path = config_path();
    tracing::info!(path = %path.display(), "loading device config");
    load_or_init_at(&path)
}

/// Loads the config from an explicit path, creating it when missing.
///
/// Persisting failures are logged and tolerated; the returned config is
/// valid either way.
pub fn load_or_init_at(path: &Path) -> ConfigResult<DeviceConfig> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = DeviceConfig::generated();
            persist_tolerantly(&config, path);
            return Ok(config);
        }
        Err(e) => return Err(e.into()),
    };

    let mut config: DeviceConfig = serde_yaml::from_str(&data)?;
    if config.device_id.is_empty() {
        config.device_id = uuid::Uuid::new_v4().to_string();
        persist_tolerantly(&config, path);
    }

    Ok(config)
}

/// Saves the config atomically: write a `.tmp` sibling, then rename over.
pub fn save(config: &DeviceConfig, path: &Path) -> ConfigResult<()> {
    let data = serde_yaml::to_string(config)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn persist_tolerantly(config: &DeviceConfig, path: &Path) {
    if let Err(e) = save(config, path) {
        tracing::warn!(path = %path.display(), error = %e, "could not persist device config");
    }
}

// =============================================================================
// Tests
// =============================================================================
