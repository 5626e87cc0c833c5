//! Decides what plays next for one listening session.
//!
//! A session starts in [`Mode::Playlist`], walking the user's playlist in
//! order. Running off the end of the playlist, or finding it empty, moves the
//! session to [`Mode::Discovery`] for good: from then on tracks are drawn at
//! random from the catalog, preferring the current artist, never repeating a
//! song the session has already surfaced. Only [`Sequencer::start_playlist`]
//! brings the session back to playlist order.

use crate::library::Library;
use crate::model::Song;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Playlist,
    Discovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickSource {
    Playlist,
    SameArtist,
    Random,
    Direct,
}

impl PickSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Playlist => "Playlist",
            Self::SameArtist => "Same Artist",
            Self::Random => "Random",
            Self::Direct => "Library",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    Play { song: Song, source: PickSource },
    /// Every catalog song has been surfaced this session. Playback stops.
    LibraryExhausted,
    /// `start_playlist` was asked for but the playlist resolves to nothing.
    EmptyPlaylist,
    /// The catalog has no songs at all.
    NothingToPlay,
}

impl Pick {
    pub fn song(&self) -> Option<&Song> {
        match self {
            Self::Play { song, .. } => Some(song),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Sequencer {
    username: String,
    mode: Mode,
    current: Option<Song>,
    looping: bool,
    played: HashSet<String>,
    rng: SmallRng,
}

impl Sequencer {
    pub fn new(username: &str) -> Self {
        Self::with_rng(username, rand::make_rng::<SmallRng>())
    }

    pub fn with_seed(username: &str, seed: u64) -> Self {
        Self::with_rng(username, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(username: &str, rng: SmallRng) -> Self {
        Self {
            username: username.to_string(),
            mode: Mode::Playlist,
            current: None,
            looping: false,
            played: HashSet::new(),
            rng,
        }
    }

    /// Follows an account rename so playlist lookups keep working.
    pub fn rename(&mut self, username: &str) {
        self.username = username.to_string();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current(&self) -> Option<&Song> {
        self.current.as_ref()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn has_played(&self, song_id: &str) -> bool {
        self.played.contains(song_id)
    }

    pub fn played_count(&self) -> usize {
        self.played.len()
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    /// Forgets the current song. Mode and play history are kept.
    pub fn stop(&mut self) {
        self.current = None;
    }

    pub fn next(&mut self, library: &Library) -> Pick {
        if self.mode == Mode::Discovery {
            return self.discover(library);
        }

        let Some(first) = library.first_in_playlist(&self.username) else {
            self.enter_discovery("playlist is empty");
            return self.discover(library);
        };

        let current = self.current.clone();
        let song = match current {
            None => first,
            Some(current) if library.in_playlist(&self.username, &current.id) => {
                match library.next_in_playlist(&self.username, &current.id) {
                    Some(next) => next,
                    None => {
                        self.enter_discovery("reached the end of the playlist");
                        return self.discover(library);
                    }
                }
            }
            Some(_) => first,
        };
        self.choose(song.clone(), PickSource::Playlist)
    }

    /// Steps backward through the playlist, wrapping from the first entry to
    /// the last. Never changes the mode.
    pub fn prev(&mut self, library: &Library) -> Pick {
        let Some(last) = library.last_in_playlist(&self.username) else {
            return self.discover(library);
        };

        let current = self.current.clone();
        let song = match current {
            None => last,
            Some(current) if library.in_playlist(&self.username, &current.id) => library
                .prev_in_playlist(&self.username, &current.id)
                .unwrap_or(last),
            Some(_) => library.first_in_playlist(&self.username).unwrap_or(last),
        };
        self.choose(song.clone(), PickSource::Playlist)
    }

    /// Re-enters playlist mode with a clean history and picks the first entry.
    pub fn start_playlist(&mut self, library: &Library) -> Pick {
        let Some(first) = library.first_in_playlist(&self.username) else {
            return Pick::EmptyPlaylist;
        };
        self.mode = Mode::Playlist;
        self.played.clear();
        self.choose(first.clone(), PickSource::Playlist)
    }

    /// Direct selection of a catalog song, e.g. a row picked in the library.
    pub fn select(&mut self, library: &Library, song_id: &str) -> Option<Song> {
        let song = library.song(song_id)?.clone();
        self.choose(song, PickSource::Direct).song().cloned()
    }

    fn discover(&mut self, library: &Library) -> Pick {
        let catalog = library.catalog();
        if catalog.is_empty() {
            return Pick::NothingToPlay;
        }

        if let Some(current) = &self.current {
            // An edit made while the song plays must steer the artist match.
            let artist = library
                .song(&current.id)
                .map_or(current.artist.as_str(), |live| live.artist.as_str());
            let same_artist: Vec<&Song> = catalog
                .songs_by_artist(artist)
                .filter(|song| song.id != current.id && !self.played.contains(&song.id))
                .collect();
            if let Some(song) = pick_random(&mut self.rng, same_artist) {
                return self.choose(song, PickSource::SameArtist);
            }
        }

        let unplayed: Vec<&Song> = catalog
            .iter()
            .filter(|song| !self.played.contains(&song.id))
            .collect();
        match pick_random(&mut self.rng, unplayed) {
            Some(song) => self.choose(song, PickSource::Random),
            None => {
                log::info!("every song has been played this session");
                self.current = None;
                Pick::LibraryExhausted
            }
        }
    }

    fn enter_discovery(&mut self, reason: &str) {
        log::debug!("{}: {reason}, switching to discovery", self.username);
        self.mode = Mode::Discovery;
    }

    fn choose(&mut self, song: Song, source: PickSource) -> Pick {
        log::debug!("{}: picked {} ({})", self.username, song.id, source.label());
        self.played.insert(song.id.clone());
        self.current = Some(song.clone());
        Pick::Play { song, source }
    }
}

fn pick_random(rng: &mut SmallRng, candidates: Vec<&Song>) -> Option<Song> {
    candidates.choose(rng).map(|song| (*song).clone())
}
