use crate::catalog::Catalog;
use crate::config;
use crate::model::{Song, SongUpdate, User};
use crate::playlist::Playlist;
use crate::store::{JsonStorage, MemoryStorage, Storage};
use crate::users::UserDirectory;
use anyhow::Result;
use std::path::Path;
use thiserror::Error;

/// Why an account request coming from the front door was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("all fields are required")]
    MissingField,
    #[error("password must be at least {min} characters", min = config::MIN_PASSWORD_LEN)]
    PasswordTooShort,
    #[error("new passwords don't match")]
    PasswordMismatch,
    #[error("wrong password")]
    WrongPassword,
    #[error("username already exists")]
    UsernameTaken,
    #[error("unknown user")]
    UnknownUser,
}

/// The loaded catalog and user directory plus the storage they are written to.
///
/// Constructed once per process and handed to whoever needs it. Every
/// successful mutation rewrites the owning collection in full.
pub struct Library {
    catalog: Catalog,
    users: UserDirectory,
    storage: Box<dyn Storage>,
}

impl Library {
    pub fn load(storage: Box<dyn Storage>) -> Self {
        let catalog = Catalog::from_songs(storage.load_songs());
        let users = UserDirectory::from_users(storage.load_users());
        log::info!(
            "library loaded: {} song(s), {} account(s)",
            catalog.len(),
            users.len()
        );
        Self {
            catalog,
            users,
            storage,
        }
    }

    pub fn open(root: &Path) -> Result<Self> {
        Ok(Self::load(Box::new(JsonStorage::open(root)?)))
    }

    pub fn in_memory() -> Self {
        Self::load(Box::new(MemoryStorage::default()))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    /// Seeds a sample song and the default admin account on a fresh store.
    pub fn init_default_data(&mut self) {
        if !self.catalog.is_empty() {
            return;
        }

        let (title, artist, genre) = config::SAMPLE_SONG;
        self.add_song(title, artist, genre, "");
        if self.users.find(config::DEFAULT_ADMIN_USERNAME).is_none() {
            self.register(
                config::DEFAULT_ADMIN_USERNAME,
                config::DEFAULT_ADMIN_PASSWORD,
                true,
            );
        }
    }

    pub fn add_song(&mut self, title: &str, artist: &str, genre: &str, media_path: &str) -> String {
        let id = self.catalog.add(title, artist, genre, media_path);
        log::info!("added song {id} ({title})");
        self.persist_songs();
        id
    }

    pub fn delete_song(&mut self, id: &str) -> bool {
        if !self.catalog.delete(id) {
            return false;
        }
        log::info!("deleted song {id}");
        self.persist_songs();
        true
    }

    pub fn update_song(&mut self, id: &str, update: &SongUpdate) -> bool {
        if !self.catalog.update(id, update) {
            return false;
        }
        self.persist_songs();
        true
    }

    pub fn song(&self, id: &str) -> Option<&Song> {
        self.catalog.get(id)
    }

    pub fn song_at(&self, index: usize) -> Option<&Song> {
        self.catalog.get_by_index(index)
    }

    pub fn songs(&self) -> Vec<Song> {
        self.catalog.list_all()
    }

    pub fn register(&mut self, username: &str, password: &str, is_admin: bool) -> bool {
        if !self.users.register(username, password, is_admin) {
            return false;
        }
        log::info!("registered account {username}");
        self.persist_users();
        true
    }

    /// Self-service signup with the same field rules the login screen applies.
    pub fn sign_up(&mut self, username: &str, password: &str) -> Result<(), AccountError> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AccountError::MissingField);
        }
        if password.chars().count() < config::MIN_PASSWORD_LEN {
            return Err(AccountError::PasswordTooShort);
        }
        if !self.register(username, password, false) {
            return Err(AccountError::UsernameTaken);
        }
        Ok(())
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<&User> {
        self.users.authenticate(username, password)
    }

    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.find(username)
    }

    pub fn verify_password(&self, username: &str, password: &str) -> bool {
        self.users.verify_password(username, password)
    }

    pub fn update_username(&mut self, old: &str, new: &str) -> bool {
        if !self.users.update_username(old, new) {
            return false;
        }
        log::info!("renamed account {old} to {new}");
        self.persist_users();
        true
    }

    pub fn change_username(
        &mut self,
        username: &str,
        new_username: &str,
        password: &str,
    ) -> Result<(), AccountError> {
        if new_username.is_empty() || password.is_empty() {
            return Err(AccountError::MissingField);
        }
        if self.users.find(username).is_none() {
            return Err(AccountError::UnknownUser);
        }
        if !self.verify_password(username, password) {
            return Err(AccountError::WrongPassword);
        }
        if !self.update_username(username, new_username) {
            return Err(AccountError::UsernameTaken);
        }
        Ok(())
    }

    pub fn update_password(&mut self, username: &str, password: &str) -> bool {
        if !self.users.update_password(username, password) {
            return false;
        }
        self.persist_users();
        true
    }

    pub fn change_password(
        &mut self,
        username: &str,
        current: &str,
        new_password: &str,
        confirm: &str,
    ) -> Result<(), AccountError> {
        if current.is_empty() || new_password.is_empty() || confirm.is_empty() {
            return Err(AccountError::MissingField);
        }
        if new_password != confirm {
            return Err(AccountError::PasswordMismatch);
        }
        if new_password.chars().count() < config::MIN_PASSWORD_LEN {
            return Err(AccountError::PasswordTooShort);
        }
        if self.users.find(username).is_none() {
            return Err(AccountError::UnknownUser);
        }
        if !self.verify_password(username, current) {
            return Err(AccountError::WrongPassword);
        }
        self.update_password(username, new_password);
        Ok(())
    }

    pub fn set_profile_image(&mut self, username: &str, image_path: &str) -> bool {
        if !self.users.set_profile_image(username, image_path) {
            return false;
        }
        self.persist_users();
        true
    }

    pub fn profile_image(&self, username: &str) -> Option<&str> {
        self.users.find(username).and_then(User::profile_image)
    }

    /// Appends a catalog song to the user's playlist. Fails for unknown users,
    /// unknown songs and songs already in the playlist.
    pub fn add_to_playlist(&mut self, username: &str, song_id: &str) -> bool {
        if !self.catalog.contains(song_id) {
            return false;
        }
        let Some(user) = self.users.find_mut(username) else {
            return false;
        };
        if !user.playlist.append(song_id) {
            return false;
        }
        self.persist_users();
        true
    }

    pub fn remove_from_playlist(&mut self, username: &str, song_id: &str) -> bool {
        let Some(user) = self.users.find_mut(username) else {
            return false;
        };
        if !user.playlist.remove(song_id) {
            return false;
        }
        self.persist_users();
        true
    }

    pub fn clear_playlist(&mut self, username: &str) -> bool {
        let Some(user) = self.users.find_mut(username) else {
            return false;
        };
        user.playlist.clear();
        self.persist_users();
        true
    }

    pub fn playlist(&self, username: &str) -> Option<&Playlist> {
        self.users.find(username).map(|user| &user.playlist)
    }

    /// The user's playlist resolved against the catalog. Entries whose song
    /// has since been deleted are skipped.
    pub fn playlist_songs(&self, username: &str) -> Vec<Song> {
        self.playlist(username)
            .map(|playlist| {
                playlist
                    .ids()
                    .filter_map(|id| self.catalog.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `song_id` is a live (resolvable) entry of the user's playlist.
    pub fn in_playlist(&self, username: &str, song_id: &str) -> bool {
        self.catalog.contains(song_id)
            && self
                .playlist(username)
                .is_some_and(|playlist| playlist.contains(song_id))
    }

    pub fn first_in_playlist(&self, username: &str) -> Option<&Song> {
        let playlist = self.playlist(username)?;
        self.resolve_forward(playlist, playlist.first())
    }

    pub fn last_in_playlist(&self, username: &str) -> Option<&Song> {
        let playlist = self.playlist(username)?;
        self.resolve_backward(playlist, playlist.last())
    }

    pub fn next_in_playlist(&self, username: &str, song_id: &str) -> Option<&Song> {
        let playlist = self.playlist(username)?;
        self.resolve_forward(playlist, playlist.next_of(song_id))
    }

    pub fn prev_in_playlist(&self, username: &str, song_id: &str) -> Option<&Song> {
        let playlist = self.playlist(username)?;
        self.resolve_backward(playlist, playlist.prev_of(song_id))
    }

    /// Writes both collections to storage.
    pub fn flush(&mut self) -> Result<()> {
        self.storage.save_songs(&self.catalog.list_all())?;
        self.storage
            .save_users(&self.users.iter().cloned().collect::<Vec<_>>())?;
        Ok(())
    }

    fn resolve_forward<'a>(&'a self, playlist: &'a Playlist, start: Option<&'a str>) -> Option<&'a Song> {
        let mut cursor = start;
        while let Some(id) = cursor {
            if let Some(song) = self.catalog.get(id) {
                return Some(song);
            }
            cursor = playlist.next_of(id);
        }
        None
    }

    fn resolve_backward<'a>(&'a self, playlist: &'a Playlist, start: Option<&'a str>) -> Option<&'a Song> {
        let mut cursor = start;
        while let Some(id) = cursor {
            if let Some(song) = self.catalog.get(id) {
                return Some(song);
            }
            cursor = playlist.prev_of(id);
        }
        None
    }

    fn persist_songs(&mut self) {
        if let Err(err) = self.storage.save_songs(&self.catalog.list_all()) {
            log::error!("failed to save catalog: {err:#}");
        }
    }

    fn persist_users(&mut self) {
        let users: Vec<User> = self.users.iter().cloned().collect();
        if let Err(err) = self.storage.save_users(&users) {
            log::error!("failed to save accounts: {err:#}");
        }
    }
}
