//! XDG path resolution for tether configuration and data directories.

use anyhow::Result;
use std::path::PathBuf;

use super::types::Config;

impl Config {
    /// Returns the platform-specific configuration directory for tether.
    ///
    /// Returns `~/.config/tether/` on Linux (`XDG_CONFIG_HOME/tether`).
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join(crate::constants::APP_NAME);
        Ok(dir)
    }

    /// Returns the platform-specific cache directory for tether.
    ///
    /// Returns `~/.cache/tether/` on Linux. Used for readline history.
    pub fn cache_dir() -> Result<PathBuf> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join(crate::constants::APP_NAME);
        Ok(dir)
    }

    /// Returns the full path to the tether configuration file.
    ///
    /// Returns `~/.config/tether/config.toml` on Linux.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(crate::constants::CONFIG_FILENAME))
    }

    /// Returns the directory scanned for external agent definitions.
    ///
    /// Returns `~/.config/tether/agents/` on Linux.
    pub fn agents_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(crate::constants::AGENTS_DIRNAME))
    }
}
