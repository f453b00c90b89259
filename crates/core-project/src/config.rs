//! Optional host configuration (`ochre.toml` at the project root).
//!
//! Everything has a default; unknown fields are ignored so the file can
//! grow without breaking older hosts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "ochre.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub screen: ScreenSection,
    #[serde(default)]
    pub signals: SignalsSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HostSection {
    /// The fixed user identity reported in key signals.
    #[serde(default = "HostSection::default_user")]
    pub user: String,
}

impl HostSection {
    fn default_user() -> String {
        "user".to_string()
    }
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            user: Self::default_user(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ScreenSection {
    #[serde(default = "ScreenSection::default_font_width")]
    pub font_width: u32,
    #[serde(default = "ScreenSection::default_font_height")]
    pub font_height: u32,
}

impl ScreenSection {
    const fn default_font_width() -> u32 {
        8
    }
    const fn default_font_height() -> u32 {
        16
    }

    pub fn font_cell(&self) -> (u32, u32) {
        (self.font_width, self.font_height)
    }
}

impl Default for ScreenSection {
    fn default() -> Self {
        Self {
            font_width: Self::default_font_width(),
            font_height: Self::default_font_height(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct SignalsSection {
    /// Bound on the signal queue; overflowing records are dropped.
    #[serde(default = "SignalsSection::default_capacity")]
    pub capacity: usize,
}

impl SignalsSection {
    const fn default_capacity() -> usize {
        256
    }
}

impl Default for SignalsSection {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

/// Load `ochre.toml` from the project root; an absent file is the default
/// configuration, a malformed one is a hard error.
pub fn load_host_config(project_dir: &Path) -> Result<HostConfig> {
    let path = project_dir.join(CONFIG_FILE);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Ok(HostConfig::default());
    };
    let config: HostConfig = toml::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    tracing::info!(
        target: "runtime.config",
        user = config.host.user.as_str(),
        font_width = config.screen.font_width,
        font_height = config.screen.font_height,
        queue_capacity = config.signals.capacity,
        "host config loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_host_config(dir.path()).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.host.user, "user");
        assert_eq!(config.screen.font_cell(), (8, 16));
        assert_eq!(config.signals.capacity, 256);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ochre.toml"),
            "[host]\nuser = \"operator\"\n\n[signals]\ncapacity = 16\n",
        )
        .unwrap();
        let config = load_host_config(dir.path()).unwrap();
        assert_eq!(config.host.user, "operator");
        assert_eq!(config.signals.capacity, 16);
        assert_eq!(config.screen.font_cell(), (8, 16));
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ochre.toml"),
            "[host]\nuser = \"u\"\nfuture_knob = true\n[brand_new_section]\nx = 1\n",
        )
        .unwrap();
        assert!(load_host_config(dir.path()).is_ok());
    }

    #[test]
    fn malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ochre.toml"), "not toml [").unwrap();
        assert!(load_host_config(dir.path()).is_err());
    }
}
