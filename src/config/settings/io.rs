// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::{Result, RoundtableError};

use super::Settings;

/// Environment override for the home directory
pub const HOME_ENV: &str = "ROUNDTABLE_HOME";

impl Settings {
    /// `settings.json` inside the home directory
    pub fn default_path() -> PathBuf {
        Self::roundtable_home().join("settings.json")
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Read settings from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "roundtable.config", path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let settings = serde_json::from_str(&raw).map_err(|e| {
            RoundtableError::Config(format!("{}: {}", path.display(), e))
        })?;
        tracing::debug!(target: "roundtable.config", path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Write settings as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json)?;
        tracing::debug!(target: "roundtable.config", path = %path.display(), "saved settings");
        Ok(())
    }

    /// `$ROUNDTABLE_HOME`, else `~/.roundtable`
    pub fn roundtable_home() -> PathBuf {
        match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => dirs::home_dir()
                .map(|home| home.join(".roundtable"))
                .unwrap_or_else(|| PathBuf::from(".roundtable")),
        }
    }

    /// Create the home directory and the database's parent directory
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(Self::roundtable_home())?;
        if let Some(dir) = self.database_path().parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
