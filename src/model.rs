use crate::playlist::Playlist;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    #[serde(rename = "song_id")]
    pub id: String,
    pub title: String,
    pub artist: String,
    pub genre: String,
    #[serde(rename = "file_path", default)]
    pub media_path: String,
}

impl Song {
    pub fn label(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }

    pub fn has_media(&self) -> bool {
        !self.media_path.trim().is_empty()
    }
}

/// Partial edit of a catalog entry. Only fields that are present and non-empty
/// overwrite the stored value; everything else is left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub media_path: Option<String>,
}

impl SongUpdate {
    pub fn title(mut self, value: impl Into<String>) -> Self {
        self.title = Some(value.into());
        self
    }

    pub fn artist(mut self, value: impl Into<String>) -> Self {
        self.artist = Some(value.into());
        self
    }

    pub fn genre(mut self, value: impl Into<String>) -> Self {
        self.genre = Some(value.into());
        self
    }

    pub fn media_path(mut self, value: impl Into<String>) -> Self {
        self.media_path = Some(value.into());
        self
    }

    pub fn apply(&self, song: &mut Song) {
        overwrite(&mut song.title, self.title.as_deref());
        overwrite(&mut song.artist, self.artist.as_deref());
        overwrite(&mut song.genre, self.genre.as_deref());
        overwrite(&mut song.media_path, self.media_path.as_deref());
    }
}

fn overwrite(slot: &mut String, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        *slot = value.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Stored and compared verbatim. Credentials are not hashed.
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub playlist: Playlist,
    #[serde(default)]
    pub profile_image: String,
}

impl User {
    pub fn new(username: &str, password: &str, is_admin: bool) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            is_admin,
            playlist: Playlist::default(),
            profile_image: String::new(),
        }
    }

    pub fn profile_image(&self) -> Option<&str> {
        Some(self.profile_image.as_str()).filter(|path| !path.is_empty())
    }
}
