use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_DECAY_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_MAX_NAME_LEN: usize = 20;

/// Average-stat bands for the mood face; `worried` doubles as the critical
/// notification threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodThresholds {
    pub happy: f64,
    pub neutral: f64,
    pub worried: f64,
}

impl Default for MoodThresholds {
    fn default() -> Self {
        Self {
            happy: 70.0,
            neutral: 40.0,
            worried: 20.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fps_cap: u32,
    pub enable_color: bool,
    pub decay_interval_ms: u64,
    pub mood_thresholds: MoodThresholds,
    pub max_name_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 30,
            enable_color: true,
            decay_interval_ms: DEFAULT_DECAY_INTERVAL_MS,
            mood_thresholds: MoodThresholds::default(),
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Paths {
    pub save_path: PathBuf,
    pub settings_path: PathBuf,
    pub log_path: PathBuf,
}

impl Paths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            save_path: dir.join("save.json"),
            settings_path: dir.join("settings.json"),
            log_path: dir.join("pocket-critters.log"),
        }
    }
}

/// Resolves the data directory (or uses `override_dir`) and makes sure it exists.
pub fn project_paths(override_dir: Option<&Path>) -> Result<Paths> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => ProjectDirs::from("com", "pocketcritters", "PocketCritters")
            .context("could not resolve project directories")?
            .data_local_dir()
            .to_path_buf(),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("could not create data directory {}", dir.display()))?;
    Ok(Paths::in_dir(&dir))
}

pub fn load_settings(path: &Path) -> Settings {
    let Ok(s) = fs::read_to_string(path) else {
        return Settings::default();
    };
    match serde_json::from_str::<Settings>(&s) {
        Ok(v) => v,
        Err(err) => {
            log::warn!("ignoring unreadable settings {}: {err}", path.display());
            Settings::default()
        }
    }
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let data = serde_json::to_vec_pretty(s)?;
    write_atomic(path, &data)?;
    Ok(())
}

/// Writes next to `path` first, then renames over it.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)
}

pub fn atomic_rename(from: &Path, to: &Path) -> std::io::Result<()> {
    // rename-over-existing is not atomic on Windows
    if cfg!(windows) && to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
}
