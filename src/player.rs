//! One logged-in listening session: the sequencer's choices pushed through a
//! playback device, with a computed clock and the two recurring polls that
//! notice when a track has ended.

use crate::audio::PlaybackDevice;
use crate::clock::TrackClock;
use crate::library::Library;
use crate::media;
use crate::model::Song;
use crate::sequencer::{Pick, PickSource, Sequencer};
use anyhow::Result;
use std::path::Path;
use std::time::{Duration, Instant};

pub const PROGRESS_POLL: Duration = Duration::from_millis(100);
pub const END_CHECK_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    song: Song,
    source: PickSource,
    clock: TrackClock,
    loaded: bool,
}

impl Track {
    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn source(&self) -> PickSource {
        self.source
    }

    pub fn duration(&self) -> Duration {
        self.clock.duration()
    }

    /// The device accepted the file. Unloaded tracks are current but silent.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Stopped,
    Playing(Track),
    Paused(Track),
}

impl Transport {
    pub fn track(&self) -> Option<&Track> {
        match self {
            Self::Stopped => None,
            Self::Playing(track) | Self::Paused(track) => Some(track),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Started {
        song: Song,
        source: PickSource,
        duration: Duration,
    },
    /// The song became current but cannot be heard.
    Unplayable { song: Song, reason: String },
    LibraryExhausted,
    EmptyPlaylist,
    NothingToPlay,
}

#[derive(Debug, Clone, Copy, Default)]
struct PollSchedule {
    progress_due: Option<Instant>,
    end_check_due: Option<Instant>,
}

impl PollSchedule {
    fn arm(&mut self, now: Instant) {
        self.progress_due = Some(now + PROGRESS_POLL);
        self.end_check_due = Some(now + END_CHECK_POLL);
    }

    fn disarm(&mut self) {
        *self = Self::default();
    }

    fn is_armed(&self) -> bool {
        self.progress_due.is_some() || self.end_check_due.is_some()
    }

    fn progress_fired(&mut self, now: Instant) -> bool {
        fire(&mut self.progress_due, PROGRESS_POLL, now)
    }

    fn end_check_fired(&mut self, now: Instant) -> bool {
        fire(&mut self.end_check_due, END_CHECK_POLL, now)
    }
}

fn fire(due: &mut Option<Instant>, period: Duration, now: Instant) -> bool {
    match *due {
        Some(at) if at <= now => {
            *due = Some(now + period);
            true
        }
        _ => false,
    }
}

pub struct Player {
    sequencer: Sequencer,
    device: Box<dyn PlaybackDevice>,
    transport: Transport,
    polls: PollSchedule,
}

impl Player {
    pub fn new(sequencer: Sequencer, device: Box<dyn PlaybackDevice>) -> Self {
        Self {
            sequencer,
            device,
            transport: Transport::Stopped,
            polls: PollSchedule::default(),
        }
    }

    /// Ends the session and hands the device back for the next one.
    pub fn into_device(mut self) -> Box<dyn PlaybackDevice> {
        self.halt();
        self.device
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut Sequencer {
        &mut self.sequencer
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn current(&self) -> Option<&Track> {
        self.transport.track()
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.transport, Transport::Paused(_))
    }

    pub fn is_looping(&self) -> bool {
        self.sequencer.is_looping()
    }

    pub fn polls_armed(&self) -> bool {
        self.polls.is_armed()
    }

    pub fn next(&mut self, library: &Library) -> PlayerEvent {
        self.next_at(library, Instant::now())
    }

    pub fn next_at(&mut self, library: &Library, now: Instant) -> PlayerEvent {
        let pick = self.sequencer.next(library);
        self.apply(pick, now)
    }

    pub fn prev(&mut self, library: &Library) -> PlayerEvent {
        self.prev_at(library, Instant::now())
    }

    pub fn prev_at(&mut self, library: &Library, now: Instant) -> PlayerEvent {
        let pick = self.sequencer.prev(library);
        self.apply(pick, now)
    }

    pub fn start_playlist(&mut self, library: &Library) -> PlayerEvent {
        self.start_playlist_at(library, Instant::now())
    }

    pub fn start_playlist_at(&mut self, library: &Library, now: Instant) -> PlayerEvent {
        let pick = self.sequencer.start_playlist(library);
        self.apply(pick, now)
    }

    /// Plays a catalog song picked directly. `None` when the id is unknown.
    pub fn play_song(&mut self, library: &Library, song_id: &str) -> Option<PlayerEvent> {
        self.play_song_at(library, song_id, Instant::now())
    }

    pub fn play_song_at(
        &mut self,
        library: &Library,
        song_id: &str,
        now: Instant,
    ) -> Option<PlayerEvent> {
        let song = self.sequencer.select(library, song_id)?;
        Some(self.start_track(song, PickSource::Direct, now))
    }

    pub fn stop(&mut self) {
        self.halt();
        self.sequencer.stop();
    }

    pub fn pause(&mut self) -> bool {
        self.pause_at(Instant::now())
    }

    pub fn pause_at(&mut self, now: Instant) -> bool {
        let Transport::Playing(mut track) = std::mem::take(&mut self.transport) else {
            return false;
        };
        self.polls.disarm();
        if track.loaded {
            self.device.pause();
        }
        track.clock.pause(now);
        self.transport = Transport::Paused(track);
        true
    }

    pub fn resume(&mut self) -> bool {
        self.resume_at(Instant::now())
    }

    pub fn resume_at(&mut self, now: Instant) -> bool {
        let Transport::Paused(mut track) = std::mem::take(&mut self.transport) else {
            return false;
        };
        track.clock.resume(now);
        if track.loaded {
            self.device.unpause();
            self.polls.arm(now);
        }
        self.transport = Transport::Playing(track);
        true
    }

    pub fn seek(&mut self, target: Duration) -> bool {
        self.seek_at(target, Instant::now())
    }

    /// Restarts the device at `target`. Devices that cannot seek keep
    /// playing from the top while the clock still jumps, so the position
    /// shown follows the request.
    pub fn seek_at(&mut self, target: Duration, now: Instant) -> bool {
        let looping = self.sequencer.is_looping();
        let (mut track, paused) = match std::mem::take(&mut self.transport) {
            Transport::Playing(track) => (track, false),
            Transport::Paused(track) => (track, true),
            Transport::Stopped => return false,
        };
        if !track.loaded || !track.clock.is_playable() {
            self.transport = rebuild(track, paused);
            return false;
        }

        self.polls.disarm();
        let target = target.min(track.clock.duration());
        if let Err(err) = self.restart_device_at(target, looping) {
            log::error!("seek on {} failed: {err:#}", track.song.id);
        }
        track.clock.seek(target, now);
        if paused {
            self.device.pause();
        } else {
            self.polls.arm(now);
        }
        self.transport = rebuild(track, paused);
        true
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.toggle_loop_at(Instant::now())
    }

    /// Flips looping and restarts the loaded track where it currently is.
    pub fn toggle_loop_at(&mut self, now: Instant) -> bool {
        let was_looping = self.sequencer.is_looping();
        let looping = self.sequencer.toggle_loop();

        let (mut track, paused) = match std::mem::take(&mut self.transport) {
            Transport::Playing(track) => (track, false),
            Transport::Paused(track) => (track, true),
            Transport::Stopped => return looping,
        };
        if track.loaded {
            let position = track.clock.position(now, was_looping);
            if let Err(err) = self.restart_device_at(position, looping) {
                log::error!("could not restart {}: {err:#}", track.song.id);
            }
            track.clock.seek(position, now);
            if paused {
                self.device.pause();
            }
        }
        self.transport = rebuild(track, paused);
        looping
    }

    /// Position and duration of the current track.
    pub fn position(&self) -> Option<(Duration, Duration)> {
        self.position_at(Instant::now())
    }

    pub fn position_at(&self, now: Instant) -> Option<(Duration, Duration)> {
        let track = self.current()?;
        Some((
            track.clock.position(now, self.sequencer.is_looping()),
            track.clock.duration(),
        ))
    }

    pub fn tick(&mut self, library: &Library) -> Option<PlayerEvent> {
        self.tick_at(library, Instant::now())
    }

    /// Runs whichever polls are due. Returns the event of an automatic
    /// advance when the current track has ended.
    pub fn tick_at(&mut self, library: &Library, now: Instant) -> Option<PlayerEvent> {
        self.device.tick();
        let Transport::Playing(track) = &self.transport else {
            return None;
        };
        let looping = self.sequencer.is_looping();

        if self.polls.progress_fired(now) && track.clock.is_finished(now, looping) {
            log::debug!("{} reached its end", track.song.id);
            return Some(self.next_at(library, now));
        }
        if self.polls.end_check_fired(now) && !looping && !self.device.is_busy() {
            log::debug!("device went idle on {}", track.song.id);
            return Some(self.next_at(library, now));
        }
        None
    }

    fn apply(&mut self, pick: Pick, now: Instant) -> PlayerEvent {
        match pick {
            Pick::Play { song, source } => self.start_track(song, source, now),
            Pick::LibraryExhausted => {
                self.halt();
                PlayerEvent::LibraryExhausted
            }
            Pick::EmptyPlaylist => PlayerEvent::EmptyPlaylist,
            Pick::NothingToPlay => PlayerEvent::NothingToPlay,
        }
    }

    fn start_track(&mut self, song: Song, source: PickSource, now: Instant) -> PlayerEvent {
        self.halt();

        let Some(path) = media::playable_path(&song.media_path) else {
            let reason = if song.has_media() {
                "media file not found"
            } else {
                "no media file"
            };
            log::info!("{} is not playable: {reason}", song.id);
            self.transport = Transport::Playing(Track {
                song: song.clone(),
                source,
                clock: TrackClock::unplayable(now),
                loaded: false,
            });
            return PlayerEvent::Unplayable {
                song,
                reason: reason.to_string(),
            };
        };

        match self.load_and_play(&path) {
            Ok(duration) => {
                self.polls.arm(now);
                self.transport = Transport::Playing(Track {
                    song: song.clone(),
                    source,
                    clock: TrackClock::start(now, duration),
                    loaded: true,
                });
                PlayerEvent::Started {
                    song,
                    source,
                    duration,
                }
            }
            Err(err) => {
                log::error!("could not play {}: {err:#}", song.id);
                self.device.stop();
                self.transport = Transport::Playing(Track {
                    song: song.clone(),
                    source,
                    clock: TrackClock::unplayable(now),
                    loaded: false,
                });
                PlayerEvent::Unplayable {
                    song,
                    reason: format!("{err:#}"),
                }
            }
        }
    }

    fn load_and_play(&mut self, path: &Path) -> Result<Duration> {
        self.device.load(path)?;
        self.device.play(self.sequencer.is_looping())?;
        Ok(self.device.duration().unwrap_or_default())
    }

    fn restart_device_at(&mut self, position: Duration, looping: bool) -> Result<()> {
        self.device.stop();
        self.device.play(looping)?;
        if let Err(err) = self.device.set_position(position) {
            log::debug!("device cannot seek: {err:#}");
        }
        Ok(())
    }

    fn halt(&mut self) {
        self.polls.disarm();
        self.device.stop();
        self.transport = Transport::Stopped;
    }
}

fn rebuild(track: Track, paused: bool) -> Transport {
    if paused {
        Transport::Paused(track)
    } else {
        Transport::Playing(track)
    }
}
