#![no_main]

use libfuzzer_sys::fuzz_target;
use spotipai::audio::NullDevice;
use spotipai::library::Library;
use spotipai::player::Player;
use spotipai::sequencer::Sequencer;
use std::time::{Duration, Instant};

const GENRES: [&str; 4] = ["Rock", "Pop", "Jazz", "Folk"];

fuzz_target!(|data: &[u8]| {
    let mut library = Library::in_memory();
    library.register("fuzz", "secret1", false);
    let mut player = Player::new(
        Sequencer::with_seed("fuzz", data.len() as u64),
        Box::new(NullDevice::new()),
    );
    let mut now = Instant::now();

    for pair in data.chunks(2) {
        let op = pair[0];
        let arg = pair.get(1).copied().unwrap_or_default();
        let genre = GENRES[usize::from(arg) % GENRES.len()];
        let pick_id = |library: &Library| {
            let count = library.catalog().len().max(1);
            library
                .song_at(usize::from(arg) % count)
                .map(|song| song.id.clone())
        };

        match op % 12 {
            0 => {
                library.add_song("t", &format!("artist{}", arg % 3), genre, "");
            }
            1 => {
                if let Some(id) = pick_id(&library) {
                    library.delete_song(&id);
                }
            }
            2 => {
                if let Some(id) = pick_id(&library) {
                    library.add_to_playlist("fuzz", &id);
                }
            }
            3 => {
                if let Some(id) = pick_id(&library) {
                    library.remove_from_playlist("fuzz", &id);
                }
            }
            4 => {
                player.next_at(&library, now);
            }
            5 => {
                player.prev_at(&library, now);
            }
            6 => {
                player.start_playlist_at(&library, now);
            }
            7 => {
                player.toggle_loop_at(now);
            }
            8 => {
                if player.is_paused() {
                    player.resume_at(now);
                } else {
                    player.pause_at(now);
                }
            }
            9 => {
                player.seek_at(Duration::from_secs(u64::from(arg)), now);
            }
            10 => player.stop(),
            _ => {
                now += Duration::from_millis(u64::from(arg) * 10);
                player.tick_at(&library, now);
            }
        }

        let sequencer = player.sequencer();
        if let Some(current) = sequencer.current() {
            assert!(sequencer.has_played(&current.id));
        }
        if let Some((position, duration)) = player.position_at(now) {
            assert!(position <= duration);
        }
    }
});
