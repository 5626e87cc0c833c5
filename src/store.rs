//! Durable storage for the catalog and the user directory.
//!
//! Reads are permissive: a missing file, a file that is not a JSON array, or an
//! individual record that does not decode all degrade to "nothing stored" for
//! that piece instead of failing startup. Writes replace the whole file.

use crate::config;
use crate::model::{Song, User};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub trait Storage {
    fn load_songs(&self) -> Vec<Song>;
    fn load_users(&self) -> Vec<User>;
    fn save_songs(&mut self, songs: &[Song]) -> Result<()>;
    fn save_users(&mut self, users: &[User]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonStorage {
    songs_path: PathBuf,
    users_path: PathBuf,
}

impl JsonStorage {
    pub fn new(root: &Path) -> Self {
        Self {
            songs_path: config::songs_path(root),
            users_path: config::users_path(root),
        }
    }

    /// Creates the data directory and empty store files when they are absent.
    pub fn open(root: &Path) -> Result<Self> {
        config::ensure_data_dir(root)?;
        let storage = Self::new(root);
        for path in [&storage.songs_path, &storage.users_path] {
            if !path.exists() {
                write_records::<Song>(path, &[])?;
            }
        }
        Ok(storage)
    }

    pub fn songs_path(&self) -> &Path {
        &self.songs_path
    }

    pub fn users_path(&self) -> &Path {
        &self.users_path
    }
}

impl Storage for JsonStorage {
    fn load_songs(&self) -> Vec<Song> {
        read_records(&self.songs_path)
    }

    fn load_users(&self) -> Vec<User> {
        read_records(&self.users_path)
    }

    fn save_songs(&mut self, songs: &[Song]) -> Result<()> {
        write_records(&self.songs_path, songs)
    }

    fn save_users(&mut self, users: &[User]) -> Result<()> {
        write_records(&self.users_path, users)
    }
}

/// In-process storage for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    pub songs: Vec<Song>,
    pub users: Vec<User>,
}

impl Storage for MemoryStorage {
    fn load_songs(&self) -> Vec<Song> {
        self.songs.clone()
    }

    fn load_users(&self) -> Vec<User> {
        self.users.clone()
    }

    fn save_songs(&mut self, songs: &[Song]) -> Result<()> {
        self.songs = songs.to_vec();
        Ok(())
    }

    fn save_users(&mut self, users: &[User]) -> Result<()> {
        self.users = users.to_vec();
        Ok(())
    }
}

pub fn read_records<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::debug!("{} does not exist yet", path.display());
            return Vec::new();
        }
        Err(err) => {
            log::warn!("failed to read {}: {err}; starting empty", path.display());
            return Vec::new();
        }
    };

    let body = raw.strip_prefix(UTF8_BOM).unwrap_or(raw.as_slice());
    let values: Vec<serde_json::Value> = match serde_json::from_slice(body) {
        Ok(values) => values,
        Err(err) => {
            log::warn!("{} is not a valid record list ({err}); starting empty", path.display());
            return Vec::new();
        }
    };

    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("skipping record {index} in {}: {err}", path.display());
                None
            }
        })
        .collect()
}

pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        config::ensure_data_dir(parent)?;
    }
    if path.exists() {
        let backup = path.with_extension("json.bak");
        if let Err(err) = fs::copy(path, &backup) {
            log::warn!("failed to back up {} to {}: {err}", path.display(), backup.display());
        }
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    log::debug!("wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}
