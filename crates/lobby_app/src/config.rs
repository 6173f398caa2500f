//! Launcher configuration.
//!
//! Policy: an explicitly named file that cannot be read is a startup error;
//! the default path being absent is tolerated (defaults apply). A file that
//! is present but malformed is always a startup error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use lobby_launcher::LaunchPlan;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/doomlobby/config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LauncherConfig {
    pub game: GameSection,
    pub multiplayer: MultiplayerSection,
    pub singleplayer: SinglePlayerSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameSection {
    pub binary: String,
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            binary: "zdoom".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MultiplayerSection {
    pub wad: String,
    pub map: String,
    pub config: Option<String>,
    pub port: u16,
    #[serde(rename = "can-host")]
    pub can_host: bool,
    /// Election quiet period, in seconds.
    pub wait: u64,
}

impl Default for MultiplayerSection {
    fn default() -> Self {
        Self {
            wad: "freedm.wad".into(),
            map: "MAP01".into(),
            config: None,
            port: 5029,
            can_host: true,
            wait: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinglePlayerSection {
    pub wad: String,
    pub config: Option<String>,
}

impl Default for SinglePlayerSection {
    fn default() -> Self {
        Self {
            wad: "freedoom1.wad".into(),
            config: None,
        }
    }
}

impl LauncherConfig {
    /// Load from the CLI-provided path, or the default path when none was
    /// given.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match cli_path {
            Some(path) => Self::load_from(path, true),
            None => Self::load_from(&PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }

    fn load_from(path: &Path, explicit: bool) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if !explicit => {
                warn!("cannot read {}: {e}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read config file {}", path.display()))
            }
        };

        toml::from_str(&text).with_context(|| format!("parse config file {}", path.display()))
    }

    pub fn launch_plan(&self) -> LaunchPlan {
        LaunchPlan {
            binary: self.game.binary.clone(),
            sp_wad: self.singleplayer.wad.clone(),
            sp_config: self.singleplayer.config.clone(),
            mp_wad: self.multiplayer.wad.clone(),
            mp_map: self.multiplayer.map.clone(),
            mp_config: self.multiplayer.config.clone(),
            port: self.multiplayer.port,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_secs(self.multiplayer.wait)
    }
}
