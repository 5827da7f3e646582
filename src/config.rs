//! Configuration for the strata window manager
//!
//! Loads configuration from TOML file at `~/.config/strata/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::wm::keyboard::{Binding, default_bindings};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub style: StyleConfig,
    pub desktops: DesktopConfig,
    pub behavior: BehaviorConfig,
    pub bindings: BindingsConfig,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config = Self::from_toml_str(&content)?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.sanitize();
        Ok(config)
    }

    /// Clamp values the core relies on being in range.
    fn sanitize(&mut self) {
        self.style.buttons = self.style.buttons.min(3);
        self.desktops.count = self.desktops.count.max(1);
        self.desktops.masters = self.desktops.masters.max(1);
        self.desktops.split = self.desktops.split.clamp(0.05, 0.95);
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("strata");

        Ok(config_dir.join("config.toml"))
    }

    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string =
            toml::to_string_pretty(&Self::default()).context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Decoration geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Border width in pixels
    pub border_width: u32,
    /// Topbar height in pixels
    pub topbar_height: u32,
    /// Topbar buttons (close, maximize, minimize), at most 3
    pub buttons: usize,
    /// Length of the corner resize regions along each frame edge. Handles
    /// are as thick as the border and never reach into the content.
    pub corner_size: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            border_width: 2,
            topbar_height: 24,
            buttons: 3,
            corner_size: 12,
        }
    }
}

/// Per-desktop defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Desktops per monitor
    pub count: usize,
    pub dynamic: bool,
    pub masters: usize,
    /// Master column share of the workarea width
    pub split: f32,
    /// Topbar visibility for new clients
    pub topbar: bool,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            count: 10,
            dynamic: false,
            masters: 1,
            split: 0.5,
            topbar: true,
        }
    }
}

/// Window behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub focus_follows_mouse: bool,
    pub raise_on_focus: bool,
    /// Modifier held for pointer move/resize on the client body
    pub drag_modifier: crate::wm::keyboard::Modifier,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            focus_follows_mouse: false,
            raise_on_focus: true,
            drag_modifier: crate::wm::keyboard::Modifier::Super,
        }
    }
}

/// Trigger/action table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingsConfig {
    pub binding: Vec<Binding>,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            binding: default_bindings(),
        }
    }
}
