// Application settings
//
// Loaded from <config_dir>/claimdock/config.toml. The file is optional and
// every key has a default, so a missing or malformed file never aborts a
// load run.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the claims database. Overridden by `--db` / `CLAIMDOCK_DB`.
    pub db_path: Option<String>,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("claimdock")
            .join("config.toml")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("warning: malformed {}: {e}", path.display());
                    eprintln!("warning: using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("warning: cannot read {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

/// Where the claims database lives when neither the flag nor the settings
/// file names one.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("claimdock")
        .join("claims.db")
}

/// Database path precedence: `--db` flag (clap also feeds `CLAIMDOCK_DB`
/// through it), then `db_path` from the settings file, then the platform
/// default.
pub fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Some(path) = Settings::load().db_path {
        return PathBuf::from(path);
    }
    default_db_path()
}
