use std::collections::HashMap;

const DEFAULT_PREFIX: char = 'S';

/// Issues `<Letter><Counter>` song ids, one monotonic counter per letter.
///
/// Counters only move forward. Deleting a song never hands its number back,
/// and rebuilding from a loaded catalog resumes at the highest suffix seen.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: HashMap<char, u64>,
}

impl IdAllocator {
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut allocator = Self::default();
        for id in ids {
            allocator.observe(id);
        }
        allocator
    }

    /// Raises the counter for the id's letter to at least its suffix. Ids that
    /// are not `<Letter><digits>` are ignored.
    pub fn observe(&mut self, id: &str) {
        let Some((letter, count)) = parse_id(id) else {
            return;
        };
        let counter = self.counters.entry(letter).or_insert(0);
        *counter = (*counter).max(count);
    }

    /// Returns a fresh id for `genre`. `taken` reports ids already in use so a
    /// hand-edited store can never cause a collision.
    ///
    /// Once a letter's counter reaches `u64::MAX` the lowest free suffix is
    /// handed out instead.
    pub fn allocate(&mut self, genre: &str, taken: impl Fn(&str) -> bool) -> String {
        let letter = prefix_for_genre(genre);
        let counter = self.counters.entry(letter).or_insert(0);
        while let Some(next) = counter.checked_add(1) {
            *counter = next;
            let id = format!("{letter}{next}");
            if !taken(&id) {
                return id;
            }
        }

        log::warn!("id counter for '{letter}' is exhausted, reusing the lowest free suffix");
        let mut suffix: u64 = 1;
        loop {
            let id = format!("{letter}{suffix}");
            if !taken(&id) {
                return id;
            }
            suffix = suffix.wrapping_add(1);
        }
    }

    pub fn counter(&self, letter: char) -> u64 {
        self.counters.get(&letter).copied().unwrap_or(0)
    }
}

pub fn prefix_for_genre(genre: &str) -> char {
    genre
        .trim()
        .chars()
        .next()
        .map(uppercase)
        .unwrap_or(DEFAULT_PREFIX)
}

fn uppercase(ch: char) -> char {
    ch.to_uppercase().next().unwrap_or(ch)
}

fn parse_id(id: &str) -> Option<(char, u64)> {
    let mut chars = id.chars();
    let letter = chars.next()?;
    if uppercase(letter) != letter {
        return None;
    }
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|count| (letter, count))
}
