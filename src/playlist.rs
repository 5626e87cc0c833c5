use crate::linked::LinkedIndex;
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A user's ordered, duplicate-free list of song ids.
///
/// Doubly linked so the player can step forward or backward from any entry
/// without rescanning from the head. Neighbour lookups stop at the ends; any
/// wraparound is the sequencer's business.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    entries: LinkedIndex<()>,
}

impl Playlist {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut playlist = Self::default();
        for id in ids {
            playlist.append(id);
        }
        playlist
    }

    /// Returns `false` when the id is already in the playlist.
    pub fn append(&mut self, song_id: impl Into<String>) -> bool {
        self.entries.push_back(song_id.into(), ())
    }

    pub fn remove(&mut self, song_id: &str) -> bool {
        self.entries.remove(song_id).is_some()
    }

    pub fn contains(&self, song_id: &str) -> bool {
        self.entries.contains_key(song_id)
    }

    pub fn to_ordered_ids(&self) -> Vec<String> {
        self.ids().map(str::to_string).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys()
    }

    pub fn next_of(&self, song_id: &str) -> Option<&str> {
        self.entries.next_key(song_id)
    }

    pub fn prev_of(&self, song_id: &str) -> Option<&str> {
        self.entries.prev_key(song_id)
    }

    pub fn first(&self) -> Option<&str> {
        self.entries.first_key()
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last_key()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Playlist {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.ids().eq(other.ids())
    }
}

#[derive(Serialize)]
struct EntryRef<'a> {
    song_id: &'a str,
}

impl Serialize for Playlist {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for song_id in self.ids() {
            seq.serialize_element(&EntryRef { song_id })?;
        }
        seq.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Bare(String),
    Entry {
        #[serde(default)]
        song_id: Option<String>,
    },
    Other(serde::de::IgnoredAny),
}

impl<'de> Deserialize<'de> for Playlist {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = Vec::<StoredEntry>::deserialize(deserializer)?;
        let ids = stored.into_iter().filter_map(|entry| match entry {
            StoredEntry::Bare(id) => Some(id),
            StoredEntry::Entry { song_id } => song_id,
            StoredEntry::Other(_) => None,
        });
        Ok(Self::from_ids(ids.filter(|id| !id.is_empty())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert_eq;

    #[test]
    fn append_rejects_duplicates() {
        let mut playlist = Playlist::default();
        assert!(playlist.append("F1"));
        assert!(!playlist.append("F1"));
        assert_eq!(playlist.len(), 1);
    }

    #[test]
    fn boundaries_do_not_wrap() {
        let playlist = Playlist::from_ids(["A", "B", "C"]);
        assert_eq!(playlist.first(), Some("A"));
        assert_eq!(playlist.last(), Some("C"));
        assert_eq!(playlist.next_of("C"), None);
        assert_eq!(playlist.prev_of("A"), None);
        assert_eq!(playlist.next_of("A"), Some("B"));
        assert_eq!(playlist.prev_of("C"), Some("B"));
        assert_eq!(playlist.next_of("missing"), None);
    }

    #[test]
    fn append_then_remove_restores_membership_and_length() {
        let mut playlist = Playlist::from_ids(["A", "B"]);
        let before = playlist.len();
        assert!(playlist.append("C"));
        assert!(playlist.remove("C"));
        assert!(!playlist.contains("C"));
        assert_eq!(playlist.len(), before);
        assert_eq!(playlist.to_ordered_ids(), vec!["A", "B"]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut playlist = Playlist::from_ids(["A", "B"]);
        playlist.clear();
        assert!(playlist.is_empty());
        assert_eq!(playlist.first(), None);
        assert_eq!(playlist.last(), None);
    }

    #[test]
    fn serializes_as_song_id_objects() {
        let playlist = Playlist::from_ids(["R2", "F1"]);
        let json = serde_json::to_string(&playlist).expect("serialize");
        assert_eq!(json, r#"[{"song_id":"R2"},{"song_id":"F1"}]"#);
    }

    #[test]
    fn deserializes_mixed_and_messy_entries() {
        let playlist: Playlist = serde_json::from_str(
            r#"["F1", {"song_id": "R1"}, {"title": "no id"}, 7, {"song_id": "F1"}, ""]"#,
        )
        .expect("deserialize");
        assert_eq!(playlist.to_ordered_ids(), vec!["F1", "R1"]);
    }

    proptest::proptest! {
        #[test]
        fn neighbours_match_ordered_ids(ids in proptest::collection::vec(0u8..20, 0..30)) {
            let playlist = Playlist::from_ids(ids.iter().map(|id| format!("S{id}")));
            let ordered = playlist.to_ordered_ids();
            for (index, id) in ordered.iter().enumerate() {
                prop_assert_eq!(playlist.next_of(id), ordered.get(index + 1).map(String::as_str));
                let prev = index.checked_sub(1).map(|prev| ordered[prev].as_str());
                prop_assert_eq!(playlist.prev_of(id), prev);
            }
        }
    }
}
