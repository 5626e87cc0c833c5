//! Line-oriented front end. Every command is a word followed by arguments;
//! song fields are separated by `|` so titles may contain spaces.

use crate::audio::{NullDevice, PlaybackDevice};
use crate::clock::format_time;
use crate::library::Library;
use crate::media;
use crate::model::SongUpdate;
use crate::player::{PROGRESS_POLL, Player, PlayerEvent, Transport};
use crate::sequencer::{Mode, Sequencer};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const GUEST_HELP: &str = "Commands: login <user> <password> | signup <user> <password> | quit";
const USER_HELP: &str = "Commands: songs | play <id> | next | prev | start | pause | resume | stop | loop | seek <m:ss> | status | playlist [add|remove <id> | clear] | passwd <current> <new> <confirm> | rename <new> <password> | avatar [path] | logout | quit";
const ADMIN_HELP: &str = "Admin: add <title>|<artist>|<genre>|<file> | edit <id> <title>|<artist>|<genre>|<file> | delete <id>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    Quit,
}

struct Session {
    username: String,
    is_admin: bool,
    player: Player,
}

pub struct Console {
    library: Library,
    session: Option<Session>,
    idle_device: Option<Box<dyn PlaybackDevice>>,
    seed: Option<u64>,
}

impl Console {
    pub fn new(library: Library, device: Box<dyn PlaybackDevice>) -> Self {
        Self {
            library,
            session: None,
            idle_device: Some(device),
            seed: None,
        }
    }

    /// Makes every session's random picks reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn logged_in_as(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.username.as_str())
    }

    pub fn player(&self) -> Option<&Player> {
        self.session.as_ref().map(|session| &session.player)
    }

    pub fn execute(&mut self, raw: &str) -> Outcome {
        let input = raw.trim();
        if input.is_empty() {
            return Outcome::Reply(String::new());
        }

        let mut split = input.splitn(2, char::is_whitespace);
        let command = split.next().unwrap_or_default();
        let rest = split.next().unwrap_or("").trim();

        if command == "quit" || command == "exit" {
            self.logout();
            return Outcome::Quit;
        }

        let reply = if self.session.is_none() {
            self.guest_command(command, rest)
        } else {
            self.session_command(command, rest)
        };
        Outcome::Reply(reply)
    }

    /// Runs the player's polls. Returns a line to show when playback moved on
    /// by itself.
    pub fn tick(&mut self) -> Option<String> {
        let session = self.session.as_mut()?;
        session
            .player
            .tick(&self.library)
            .map(|event| describe(&event))
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.logout();
        self.library.flush()
    }

    fn guest_command(&mut self, command: &str, rest: &str) -> String {
        match command {
            "help" => GUEST_HELP.to_string(),
            "login" => {
                let (username, password) = two_words(rest);
                match self.library.authenticate(username, password) {
                    Some(user) => {
                        let is_admin = user.is_admin;
                        let username = user.username.clone();
                        self.login(&username, is_admin);
                        if is_admin {
                            format!("Welcome, {username} (admin)")
                        } else {
                            format!("Welcome, {username}")
                        }
                    }
                    None => String::from("Invalid username or password"),
                }
            }
            "signup" => {
                let (username, password) = two_words(rest);
                match self.library.sign_up(username, password) {
                    Ok(()) => String::from("Account created. You can log in now."),
                    Err(err) => format!("Sign up failed: {err}"),
                }
            }
            _ => String::from("Log in first. Type help for commands."),
        }
    }

    fn session_command(&mut self, command: &str, rest: &str) -> String {
        let Some(session) = self.session.as_mut() else {
            return String::from("Log in first.");
        };
        let library = &mut self.library;
        let player = &mut session.player;

        match command {
            "help" if session.is_admin => format!("{USER_HELP}\n{ADMIN_HELP}"),
            "help" => USER_HELP.to_string(),
            "songs" => list_songs(library),
            "play" => match player.play_song(library, rest) {
                Some(event) => describe(&event),
                None => format!("No song with id {rest}"),
            },
            "next" => describe(&player.next(library)),
            "prev" => describe(&player.prev(library)),
            "start" => describe(&player.start_playlist(library)),
            "pause" => {
                if player.pause() {
                    String::from("Paused")
                } else {
                    String::from("Nothing is playing")
                }
            }
            "resume" => {
                if player.resume() {
                    String::from("Resumed")
                } else {
                    String::from("Nothing is paused")
                }
            }
            "stop" => {
                player.stop();
                String::from("Stopped")
            }
            "loop" => {
                if player.toggle_loop() {
                    String::from("Loop on")
                } else {
                    String::from("Loop off")
                }
            }
            "seek" => match parse_position(rest) {
                Some(target) if player.seek(target) => format!("Seeked to {}", format_time(target)),
                Some(_) => String::from("Nothing seekable is playing"),
                None => String::from("Usage: seek <m:ss|seconds>"),
            },
            "status" => status_line(player),
            "playlist" => playlist_command(library, &session.username, rest),
            "passwd" => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                let [current, new, confirm] = args.as_slice() else {
                    return String::from("Usage: passwd <current> <new> <confirm>");
                };
                match library.change_password(&session.username, current, new, confirm) {
                    Ok(()) => String::from("Password changed"),
                    Err(err) => format!("Password not changed: {err}"),
                }
            }
            "rename" => {
                let (new_username, password) = two_words(rest);
                match library.change_username(&session.username, new_username, password) {
                    Ok(()) => {
                        session.username = new_username.to_string();
                        player.sequencer_mut().rename(new_username);
                        format!("Username changed to {new_username}")
                    }
                    Err(err) => format!("Username not changed: {err}"),
                }
            }
            "avatar" if rest.is_empty() => match library.profile_image(&session.username) {
                Some(path) => format!("Profile image: {path}"),
                None => String::from("No profile image"),
            },
            "avatar" => {
                library.set_profile_image(&session.username, rest);
                String::from("Profile image updated")
            }
            "add" | "edit" | "delete" if !session.is_admin => {
                String::from("Only admins can change the catalog")
            }
            "add" => {
                let fields = song_fields(rest);
                let [title, artist, genre, file] = fields;
                if title.is_empty() || artist.is_empty() || genre.is_empty() {
                    return String::from("Usage: add <title>|<artist>|<genre>|<file>");
                }
                let id = library.add_song(title, artist, genre, file);
                if !file.is_empty() && !media::is_audio_file(Path::new(file)) {
                    return format!("Added {id} (warning: {file} does not look like audio)");
                }
                format!("Added {id}")
            }
            "edit" => {
                let (id, fields) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let [title, artist, genre, file] = song_fields(fields);
                let update = SongUpdate::default()
                    .title(title)
                    .artist(artist)
                    .genre(genre)
                    .media_path(file);
                if library.update_song(id, &update) {
                    format!("Updated {id}")
                } else {
                    format!("No song with id {id}")
                }
            }
            "delete" => {
                if library.delete_song(rest) {
                    format!("Deleted {rest}")
                } else {
                    format!("No song with id {rest}")
                }
            }
            "logout" => {
                self.logout();
                String::from("Logged out")
            }
            _ => String::from("Unknown command. Type help for commands."),
        }
    }

    fn login(&mut self, username: &str, is_admin: bool) {
        self.logout();
        let sequencer = match self.seed {
            Some(seed) => Sequencer::with_seed(username, seed),
            None => Sequencer::new(username),
        };
        let device = self
            .idle_device
            .take()
            .unwrap_or_else(|| Box::new(NullDevice::new()));
        log::info!("{username} logged in");
        self.session = Some(Session {
            username: username.to_string(),
            is_admin,
            player: Player::new(sequencer, device),
        });
    }

    fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("{} logged out", session.username);
            self.idle_device = Some(session.player.into_device());
        }
    }
}

fn two_words(rest: &str) -> (&str, &str) {
    let mut words = rest.split_whitespace();
    (
        words.next().unwrap_or_default(),
        words.next().unwrap_or_default(),
    )
}

fn song_fields(raw: &str) -> [&str; 4] {
    let mut fields = raw.split('|').map(str::trim);
    std::array::from_fn(|_| fields.next().unwrap_or_default())
}

fn parse_position(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    match raw.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.parse().ok()?;
            let seconds: u64 = seconds.parse().ok()?;
            if seconds >= 60 {
                return None;
            }
            minutes
                .checked_mul(60)
                .and_then(|secs| secs.checked_add(seconds))
                .map(Duration::from_secs)
        }
        None => raw.parse().ok().map(Duration::from_secs),
    }
}

fn list_songs(library: &Library) -> String {
    if library.catalog().is_empty() {
        return String::from("The library is empty");
    }
    library
        .catalog()
        .iter()
        .enumerate()
        .map(|(index, song)| {
            format!(
                "{:>3}. [{}] {} ({})",
                index + 1,
                song.id,
                song.label(),
                song.genre
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn playlist_command(library: &mut Library, username: &str, rest: &str) -> String {
    let (action, id) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let id = id.trim();
    match action {
        "" => {
            let songs = library.playlist_songs(username);
            if songs.is_empty() {
                return String::from("Your playlist is empty");
            }
            songs
                .iter()
                .enumerate()
                .map(|(index, song)| format!("{:>3}. [{}] {}", index + 1, song.id, song.label()))
                .collect::<Vec<_>>()
                .join("\n")
        }
        "add" if library.in_playlist(username, id) => format!("{id} is already in your playlist"),
        "add" => {
            if library.add_to_playlist(username, id) {
                format!("Added {id} to your playlist")
            } else {
                format!("No song with id {id}")
            }
        }
        "remove" => {
            if library.remove_from_playlist(username, id) {
                format!("Removed {id} from your playlist")
            } else {
                format!("{id} is not in your playlist")
            }
        }
        "clear" => {
            library.clear_playlist(username);
            String::from("Playlist cleared")
        }
        _ => String::from("Usage: playlist [add <id> | remove <id> | clear]"),
    }
}

fn status_line(player: &Player) -> String {
    let mode = match player.sequencer().mode() {
        Mode::Playlist => "playlist",
        Mode::Discovery => "discovery",
    };
    let looping = if player.is_looping() { ", loop" } else { "" };
    let (state, track) = match player.transport() {
        Transport::Stopped => return format!("Stopped ({mode}{looping})"),
        Transport::Playing(track) => ("Playing", track),
        Transport::Paused(track) => ("Paused", track),
    };
    let (position, duration) = player.position().unwrap_or_default();
    format!(
        "{state}: {} [{}] {} / {} ({mode}{looping})",
        track.song().label(),
        track.source().label(),
        format_time(position),
        format_time(duration)
    )
}

fn describe(event: &PlayerEvent) -> String {
    match event {
        PlayerEvent::Started {
            song,
            source,
            duration,
        } => format!(
            "Now playing: {} [{}] {}",
            song.label(),
            source.label(),
            format_time(*duration)
        ),
        PlayerEvent::Unplayable { song, reason } => {
            format!("Now playing: {} (silent: {reason})", song.label())
        }
        PlayerEvent::LibraryExhausted => {
            String::from("You've listened to every song in the library")
        }
        PlayerEvent::EmptyPlaylist => String::from("Your playlist is empty"),
        PlayerEvent::NothingToPlay => String::from("There are no songs to play"),
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Reads commands from stdin until `quit` or end of input, running the
/// player's polls whenever no command is waiting.
pub fn run(mut console: Console) -> Result<()> {
    let lines = spawn_stdin_reader();
    let mut out = io::stdout();
    writeln!(out, "spotipai. {GUEST_HELP}")?;
    prompt(&mut out)?;

    loop {
        match lines.recv_timeout(PROGRESS_POLL) {
            Ok(line) => match console.execute(&line) {
                Outcome::Quit => break,
                Outcome::Reply(reply) => {
                    if !reply.is_empty() {
                        writeln!(out, "{reply}")?;
                    }
                    prompt(&mut out)?;
                }
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if let Some(line) = console.tick() {
            writeln!(out, "\n{line}")?;
            prompt(&mut out)?;
        }
    }

    console.shutdown()
}

fn prompt(out: &mut impl Write) -> Result<()> {
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console() -> Console {
        let mut library = Library::in_memory();
        library.init_default_data();
        Console::new(library, Box::new(NullDevice::new())).with_seed(3)
    }

    fn reply(console: &mut Console, line: &str) -> String {
        match console.execute(line) {
            Outcome::Reply(reply) => reply,
            Outcome::Quit => panic!("{line} should not quit"),
        }
    }

    #[test]
    fn guests_must_log_in() {
        let mut console = console();
        assert_eq!(reply(&mut console, "songs"), "Log in first. Type help for commands.");
        assert_eq!(reply(&mut console, "login admin nope"), "Invalid username or password");
        assert_eq!(reply(&mut console, "login admin admin123"), "Welcome, admin (admin)");
        assert_eq!(console.logged_in_as(), Some("admin"));
    }

    #[test]
    fn signup_applies_account_rules() {
        let mut console = console();
        assert_eq!(
            reply(&mut console, "signup ana 123"),
            "Sign up failed: password must be at least 6 characters"
        );
        assert_eq!(reply(&mut console, "signup admin secret1"), "Sign up failed: username already exists");
        assert_eq!(reply(&mut console, "signup ana secret1"), "Account created. You can log in now.");
        assert_eq!(reply(&mut console, "login ana secret1"), "Welcome, ana");
    }

    #[test]
    fn admin_manages_the_catalog_and_users_cannot() {
        let mut console = console();
        reply(&mut console, "login admin admin123");
        assert_eq!(reply(&mut console, "add Rain | Someone | Jazz |"), "Added J1");
        assert_eq!(reply(&mut console, "edit J1 Storm | | |"), "Updated J1");
        assert_eq!(console.library().song("J1").map(|song| song.title.as_str()), Some("Storm"));
        assert_eq!(console.library().song("J1").map(|song| song.artist.as_str()), Some("Someone"));
        assert_eq!(reply(&mut console, "delete J1"), "Deleted J1");
        assert_eq!(reply(&mut console, "delete J1"), "No song with id J1");
        assert_eq!(
            reply(&mut console, "add Cover|Someone|Jazz|art.png"),
            "Added J2 (warning: art.png does not look like audio)"
        );

        reply(&mut console, "logout");
        reply(&mut console, "signup bob secret1");
        reply(&mut console, "login bob secret1");
        assert_eq!(reply(&mut console, "add a|b|c|"), "Only admins can change the catalog");
    }

    #[test]
    fn playlist_and_playback_commands() {
        let mut console = console();
        reply(&mut console, "signup ana secret1");
        reply(&mut console, "login ana secret1");

        assert_eq!(reply(&mut console, "playlist"), "Your playlist is empty");
        assert_eq!(reply(&mut console, "playlist add F1"), "Added F1 to your playlist");
        assert_eq!(reply(&mut console, "playlist add F1"), "F1 is already in your playlist");
        assert_eq!(reply(&mut console, "playlist add Q9"), "No song with id Q9");
        assert!(reply(&mut console, "playlist").contains("[F1] Mr. Loverman - Ricky Montgomery"));

        assert_eq!(
            reply(&mut console, "start"),
            "Now playing: Mr. Loverman - Ricky Montgomery (silent: no media file)"
        );
        assert!(reply(&mut console, "status").starts_with("Playing: Mr. Loverman"));
        assert_eq!(reply(&mut console, "pause"), "Paused");
        assert_eq!(reply(&mut console, "resume"), "Resumed");
        assert_eq!(reply(&mut console, "loop"), "Loop on");
        assert_eq!(reply(&mut console, "seek 1:00"), "Nothing seekable is playing");
        assert_eq!(reply(&mut console, "next"), "You've listened to every song in the library");
        assert_eq!(reply(&mut console, "status"), "Stopped (discovery, loop)");
        assert_eq!(reply(&mut console, "stop"), "Stopped");
    }

    #[test]
    fn rename_follows_through_to_the_session() {
        let mut console = console();
        reply(&mut console, "signup ana secret1");
        reply(&mut console, "login ana secret1");
        reply(&mut console, "playlist add F1");

        assert_eq!(reply(&mut console, "rename anna wrong"), "Username not changed: wrong password");
        assert_eq!(reply(&mut console, "rename anna secret1"), "Username changed to anna");
        assert_eq!(console.logged_in_as(), Some("anna"));
        assert!(reply(&mut console, "start").starts_with("Now playing: Mr. Loverman"));

        assert_eq!(
            reply(&mut console, "passwd secret1 longer1 longer2"),
            "Password not changed: new passwords don't match"
        );
        assert_eq!(reply(&mut console, "passwd secret1 longer1 longer1"), "Password changed");
        assert_eq!(reply(&mut console, "avatar"), "No profile image");
        reply(&mut console, "avatar /tmp/me.png");
        assert_eq!(reply(&mut console, "avatar"), "Profile image: /tmp/me.png");
    }

    #[test]
    fn logout_returns_the_device_and_quit_ends() {
        let mut console = console();
        reply(&mut console, "login admin admin123");
        assert_eq!(reply(&mut console, "logout"), "Logged out");
        assert!(console.player().is_none());
        assert_eq!(reply(&mut console, "login admin admin123"), "Welcome, admin (admin)");
        assert_eq!(console.execute("quit"), Outcome::Quit);
    }

    #[test]
    fn positions_parse_as_minutes_or_seconds() {
        assert_eq!(parse_position("1:05"), Some(Duration::from_secs(65)));
        assert_eq!(parse_position("42"), Some(Duration::from_secs(42)));
        assert_eq!(parse_position("1:75"), None);
        assert_eq!(parse_position("soon"), None);
    }

    #[test]
    fn oversized_minutes_are_rejected_instead_of_overflowing() {
        assert_eq!(parse_position("307445734561825861:00"), None);
        assert_eq!(
            parse_position("307445734561825860:15"),
            Some(Duration::from_secs(307_445_734_561_825_860 * 60 + 15))
        );
    }
}
