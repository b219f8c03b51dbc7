//! Engine configuration.
//!
//! Settings are read from a TOML file. The default location is the
//! platform configuration directory:
//!
//! - **Linux**: `~/.config/chromagraph/engine.toml`
//! - **macOS**: `~/Library/Application Support/chromagraph/engine.toml`
//! - **Windows**: `%APPDATA%\chromagraph\engine.toml`
//!
//! # Example
//!
//! ```ignore
//! use chromagraph::config::EngineConfig;
//! use chromagraph::pipeline::Session;
//!
//! let config = EngineConfig::load_or_default();
//! let session = Session::with_config(config)?;
//! ```

use crate::error::{ChromaError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name below the platform config directory
pub const APP_ID: &str = "chromagraph";

/// Engine config filename
pub const ENGINE_CONFIG_FILE: &str = "engine.toml";

/// Allowed start offset from a whole pixel, in samples
pub const DEFAULT_SUBPIXEL_TOLERANCE: f64 = 0.5;

/// Nested pulls allowed before a run gives up
pub const DEFAULT_MAX_RESOLVE_DEPTH: usize = 64;

/// Get the engine configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default engine config file
pub fn engine_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(ENGINE_CONFIG_FILE))
}

/// Tunables for graph construction and pixel pulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tolerance for start positions that miss a pixel boundary.
    pub subpixel_tolerance: f64,

    /// Maximum nesting of node runs within one ticket.
    pub max_resolve_depth: usize,

    /// Refuse links that would close a loop.
    pub reject_cycles_on_connect: bool,

    /// Log every emitted node event at debug level.
    pub debug_signals: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            subpixel_tolerance: DEFAULT_SUBPIXEL_TOLERANCE,
            max_resolve_depth: DEFAULT_MAX_RESOLVE_DEPTH,
            reject_cycles_on_connect: true,
            debug_signals: false,
        }
    }
}

impl EngineConfig {
    /// Load the config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine config {:?}", path))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing engine config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = engine_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("creating config directory")?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing engine config {:?}", path))
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.subpixel_tolerance.is_finite() && self.subpixel_tolerance >= 0.0) {
            return Err(ChromaError::Config(format!(
                "subpixel_tolerance must be a non-negative number, got {}",
                self.subpixel_tolerance
            )));
        }
        if self.max_resolve_depth == 0 {
            return Err(ChromaError::Config(
                "max_resolve_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
