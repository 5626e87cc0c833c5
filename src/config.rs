use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "spotipai";
const SONGS_FILE: &str = "songs.json";
const USERS_FILE: &str = "users.json";

pub const DATA_DIR_ENV: &str = "SPOTIPAI_DATA_DIR";

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

pub const MIN_PASSWORD_LEN: usize = 6;

/// Seed entry written when the catalog starts out empty: title, artist, genre.
pub const SAMPLE_SONG: (&str, &str, &str) = ("Mr. Loverman", "Ricky Montgomery", "Fave");

pub fn data_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }

    let home = if cfg!(windows) {
        env::var("USERPROFILE").context("USERPROFILE is not set")?
    } else {
        env::var("HOME").context("HOME is not set")?
    };
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn songs_path(root: &Path) -> PathBuf {
    root.join(SONGS_FILE)
}

pub fn users_path(root: &Path) -> PathBuf {
    root.join(USERS_FILE)
}

pub fn ensure_data_dir(root: &Path) -> Result<()> {
    fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}
