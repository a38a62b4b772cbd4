//! Configuration Vault – reads/writes `~/.wallgrid/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use wallgrid_hal::ActuatorScale;
use wallgrid_perception::FrameGeometry;
use wallgrid_runtime::{FeatureFlags, SessionConfig};
use wallgrid_types::{GridSize, LimbSet, WallGridError};

/// Persisted user configuration stored in `~/.wallgrid/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cells per grid side, `1..=255`.
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// `hands` or `hands_and_feet`.
    #[serde(default)]
    pub limb_set: LimbSet,

    #[serde(default = "default_hold_duration_ms")]
    pub hold_duration_ms: u64,

    /// Minimum landmark visibility, `0.0..=1.0`.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default = "default_frame_width")]
    pub frame_width: f64,

    #[serde(default = "default_frame_height")]
    pub frame_height: f64,

    /// The camera feed is shown selfie-mirrored.
    #[serde(default = "default_true")]
    pub mirrored: bool,

    #[serde(default = "default_true")]
    pub analytics: bool,

    #[serde(default = "default_true")]
    pub replay: bool,

    /// Side length of the LED board snapshots are scaled onto.  Unset means
    /// raw grid cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actuator_resolution: Option<u32>,

    /// SQLite session database.  Defaults to `~/.wallgrid/sessions.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

fn default_grid_size() -> u32 {
    12
}
fn default_hold_duration_ms() -> u64 {
    wallgrid_runtime::DEFAULT_HOLD_DURATION_MS
}
fn default_confidence_threshold() -> f64 {
    wallgrid_runtime::DEFAULT_CONFIDENCE_THRESHOLD
}
fn default_frame_width() -> f64 {
    FrameGeometry::default().width
}
fn default_frame_height() -> f64 {
    FrameGeometry::default().height
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            limb_set: LimbSet::default(),
            hold_duration_ms: default_hold_duration_ms(),
            confidence_threshold: default_confidence_threshold(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            mirrored: true,
            analytics: true,
            replay: true,
            actuator_resolution: None,
            database_path: None,
        }
    }
}

impl Config {
    /// Validate and convert into a runtime session configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidGridSize`] for a grid size or actuator
    /// resolution outside `1..=255`.
    pub fn session_config(&self) -> Result<SessionConfig, WallGridError> {
        let actuator_scale = self
            .actuator_resolution
            .map(ActuatorScale::new)
            .transpose()?;
        Ok(SessionConfig {
            grid_size: GridSize::new(self.grid_size)?,
            limb_set: self.limb_set,
            hold_duration_ms: self.hold_duration_ms,
            confidence_threshold: self.confidence_threshold,
            geometry: FrameGeometry {
                width: self.frame_width,
                height: self.frame_height,
                mirrored: self.mirrored,
            },
            features: FeatureFlags {
                analytics: self.analytics,
                replay: self.replay,
            },
            actuator_scale,
        })
    }

    /// Resolved session database path.
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(p) => PathBuf::from(p),
            None => wallgrid_dir_for_home(&home_dir()).join("sessions.db"),
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn wallgrid_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".wallgrid")
}

/// Return the path to `~/.wallgrid/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    wallgrid_dir_for_home(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `WALLGRID_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `WALLGRID_GRID_SIZE` | `grid_size` |
/// | `WALLGRID_CONFIDENCE` | `confidence_threshold` |
/// | `WALLGRID_HOLD_MS` | `hold_duration_ms` |
/// | `WALLGRID_DB` | `database_path` |
///
/// Values that do not parse, or fall outside their valid range, are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("WALLGRID_GRID_SIZE")
        && let Ok(n) = v.trim().parse::<u32>()
        && GridSize::new(n).is_ok()
    {
        cfg.grid_size = n;
    }
    if let Ok(v) = std::env::var("WALLGRID_CONFIDENCE")
        && let Ok(t) = v.trim().parse::<f64>()
        && (0.0..=1.0).contains(&t)
    {
        cfg.confidence_threshold = t;
    }
    if let Ok(v) = std::env::var("WALLGRID_HOLD_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
    {
        cfg.hold_duration_ms = ms;
    }
    if let Ok(v) = std::env::var("WALLGRID_DB")
        && !v.trim().is_empty()
    {
        cfg.database_path = Some(v);
    }
}

/// Save the config to disk, creating `~/.wallgrid/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Create `dir` (and parents) restricted to the owner on Unix.
pub(crate) fn ensure_private_dir(dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|e| format!("Failed to set permissions on {}: {}", dir.display(), e))?;
    }
    Ok(())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
