//! Shared configuration for voidfill
//!
//! This crate is the single source of truth for where a canvas session keeps
//! its tiles and how strokes are drawn. Hosts build a [`CanvasConfig`] from
//! defaults, the environment, or a JSON file and hand it to the canvas crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default directory for tile blobs, relative to the host's data directory
pub const DEFAULT_TILES_DIR: &str = "tiles";

/// Default brush edge length in pixels (square stamp)
pub const DEFAULT_BRUSH_SIZE: u32 = 2;

/// Environment variable overriding [`CanvasConfig::tiles_dir`]
pub const ENV_TILES_DIR: &str = "VOIDFILL_TILES_DIR";

/// Environment variable overriding [`CanvasConfig::brush_size`]
pub const ENV_BRUSH_SIZE: &str = "VOIDFILL_BRUSH_SIZE";

/// Environment variable overriding [`CanvasConfig::flush_on_stroke_end`]
pub const ENV_FLUSH_ON_STROKE_END: &str = "VOIDFILL_FLUSH_ON_STROKE_END";

/// Errors from loading or saving a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration for one canvas session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Directory holding one blob per tile
    pub tiles_dir: PathBuf,
    /// Brush edge length in canvas pixels
    pub brush_size: u32,
    /// Persist modified tiles as soon as a stroke ends
    pub flush_on_stroke_end: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            tiles_dir: PathBuf::from(DEFAULT_TILES_DIR),
            brush_size: DEFAULT_BRUSH_SIZE,
            flush_on_stroke_end: true,
        }
    }
}

impl CanvasConfig {
    /// Create a config rooted at the given tiles directory
    pub fn new(tiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            tiles_dir: tiles_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `VOIDFILL_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup (the environment, in practice)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_TILES_DIR).filter(|d| !d.is_empty()) {
            self.tiles_dir = PathBuf::from(dir);
        }
        if let Some(size) = lookup(ENV_BRUSH_SIZE).and_then(|s| s.trim().parse().ok()) {
            self.brush_size = size;
        }
        match lookup(ENV_FLUSH_ON_STROKE_END).as_deref().map(str::trim) {
            Some("1") | Some("true") | Some("yes") => self.flush_on_stroke_end = true,
            Some("0") | Some("false") | Some("no") => self.flush_on_stroke_end = false,
            _ => {}
        }
        self.validated()
    }

    /// Clamp values into their usable range
    pub fn validated(mut self) -> Self {
        self.brush_size = self.brush_size.max(1);
        self
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.validated())
    }

    /// Write this config as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
