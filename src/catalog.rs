use crate::ids::IdAllocator;
use crate::linked::LinkedIndex;
use crate::model::{Song, SongUpdate};

/// Every song known to the player, newest first.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    songs: LinkedIndex<Song>,
    ids: IdAllocator,
}

impl Catalog {
    /// Builds a catalog from songs in stored traversal order. Later duplicates
    /// of an id are dropped.
    pub fn from_songs(songs: impl IntoIterator<Item = Song>) -> Self {
        let mut catalog = Self::default();
        for song in songs {
            let id = song.id.clone();
            if catalog.songs.push_back(id.clone(), song) {
                catalog.ids.observe(&id);
            } else {
                log::warn!("dropping duplicate song id {id} from catalog");
            }
        }
        catalog
    }

    pub fn add(&mut self, title: &str, artist: &str, genre: &str, media_path: &str) -> String {
        let songs = &self.songs;
        let id = self.ids.allocate(genre, |candidate| songs.contains_key(candidate));
        self.songs.push_front(
            id.clone(),
            Song {
                id: id.clone(),
                title: title.to_string(),
                artist: artist.to_string(),
                genre: genre.to_string(),
                media_path: media_path.to_string(),
            },
        );
        id
    }

    pub fn delete(&mut self, id: &str) -> bool {
        self.songs.remove(id).is_some()
    }

    pub fn update(&mut self, id: &str, update: &SongUpdate) -> bool {
        let Some(song) = self.songs.get_mut(id) else {
            return false;
        };
        update.apply(song);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Song> {
        self.songs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.songs.contains_key(id)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Song> {
        self.songs.nth(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.songs.values()
    }

    pub fn list_all(&self) -> Vec<Song> {
        self.iter().cloned().collect()
    }

    pub fn songs_by_artist<'a>(&'a self, artist: &'a str) -> impl Iterator<Item = &'a Song> {
        self.iter().filter(move |song| song.artist == artist)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str, artist: &str) -> Song {
        Song {
            id: id.to_string(),
            title: format!("title {id}"),
            artist: artist.to_string(),
            genre: String::from("Rock"),
            media_path: String::new(),
        }
    }

    #[test]
    fn add_prepends_and_allocates_by_genre() {
        let mut catalog = Catalog::default();
        let first = catalog.add("a", "x", "Fave", "");
        let second = catalog.add("b", "y", "", "");

        assert_eq!(first, "F1");
        assert_eq!(second, "S1");
        assert_eq!(catalog.get_by_index(0).map(|s| s.id.as_str()), Some("S1"));
        assert_eq!(catalog.get_by_index(1).map(|s| s.id.as_str()), Some("F1"));
        assert_eq!(catalog.get_by_index(2), None);
    }

    #[test]
    fn deleted_ids_are_not_reissued() {
        let mut catalog = Catalog::default();
        let first = catalog.add("a", "x", "Rock", "");
        assert!(catalog.delete(&first));
        let second = catalog.add("b", "x", "Rock", "");

        assert_eq!(first, "R1");
        assert_eq!(second, "R2");
        assert!(!catalog.delete(&first));
    }

    #[test]
    fn loaded_catalog_resumes_counters() {
        let mut catalog = Catalog::from_songs(vec![song("R4", "x"), song("R2", "y")]);
        assert_eq!(catalog.add("c", "z", "rap", ""), "R5");
        assert_eq!(catalog.get_by_index(1).map(|s| s.id.as_str()), Some("R4"));
    }

    #[test]
    fn loading_drops_duplicate_ids() {
        let catalog = Catalog::from_songs(vec![song("R1", "first"), song("R1", "second")]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("R1").map(|s| s.artist.as_str()), Some("first"));
    }

    #[test]
    fn update_is_partial_and_keeps_id() {
        let mut catalog = Catalog::default();
        let id = catalog.add("a", "x", "Rock", "a.mp3");
        assert!(catalog.update(&id, &SongUpdate::default().genre("Jazz").title("")));

        let song = catalog.get(&id).expect("song");
        assert_eq!(song.id, "R1");
        assert_eq!(song.genre, "Jazz");
        assert_eq!(song.title, "a");
        assert_eq!(song.media_path, "a.mp3");
        assert!(!catalog.update("nope", &SongUpdate::default().title("t")));
    }

    #[test]
    fn filters_by_artist() {
        let catalog = Catalog::from_songs(vec![song("A1", "x"), song("A2", "y"), song("A3", "x")]);
        let ids: Vec<&str> = catalog.songs_by_artist("x").map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A3"]);
    }
}
