use std::time::{Duration, Instant};

/// Computed playback position for the loaded track.
///
/// The device is never asked where it is. Position is derived from an anchor
/// instant plus the offset the anchor corresponds to, so seeking is just
/// re-anchoring: `offset = target, anchor = now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackClock {
    anchor: Instant,
    offset: Duration,
    duration: Duration,
    paused_at: Option<Duration>,
}

impl TrackClock {
    pub fn start(now: Instant, duration: Duration) -> Self {
        Self {
            anchor: now,
            offset: Duration::ZERO,
            duration,
            paused_at: None,
        }
    }

    /// Clock for a track the device could not load. It never advances past
    /// zero and never reports completion.
    pub fn unplayable(now: Instant) -> Self {
        Self::start(now, Duration::ZERO)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_playable(&self) -> bool {
        !self.duration.is_zero()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.paused_at
            .unwrap_or_else(|| self.offset + now.saturating_duration_since(self.anchor))
    }

    /// Wrapped around the duration while looping, clamped to it otherwise.
    pub fn position(&self, now: Instant, looping: bool) -> Duration {
        if !self.is_playable() {
            return Duration::ZERO;
        }
        let elapsed = self.elapsed(now);
        if looping {
            wrap(elapsed, self.duration)
        } else {
            elapsed.min(self.duration)
        }
    }

    pub fn is_finished(&self, now: Instant, looping: bool) -> bool {
        !looping && self.is_playable() && !self.is_paused() && self.elapsed(now) >= self.duration
    }

    pub fn seek(&mut self, target: Duration, now: Instant) {
        let target = target.min(self.duration);
        self.anchor = now;
        self.offset = target;
        if self.paused_at.is_some() {
            self.paused_at = Some(target);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(self.elapsed(now));
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let Some(position) = self.paused_at.take() {
            self.anchor = now;
            self.offset = position;
        }
    }
}

fn wrap(elapsed: Duration, duration: Duration) -> Duration {
    let nanos = elapsed.as_nanos() % duration.as_nanos();
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

pub fn format_time(position: Duration) -> String {
    let total = position.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG: Duration = Duration::from_secs(180);

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn position_clamps_without_loop_and_wraps_with_it() {
        let t0 = Instant::now();
        let clock = TrackClock::start(t0, SONG);

        assert_eq!(clock.position(t0 + secs(30), false), secs(30));
        assert_eq!(clock.position(t0 + secs(200), false), SONG);
        assert_eq!(clock.position(t0 + secs(200), true), secs(20));
        assert!(clock.is_finished(t0 + secs(180), false));
        assert!(!clock.is_finished(t0 + secs(200), true));
        assert!(!clock.is_finished(t0 + secs(179), false));
    }

    #[test]
    fn seek_reanchors_the_start() {
        let t0 = Instant::now();
        let mut clock = TrackClock::start(t0, SONG);
        clock.seek(secs(90), t0 + secs(10));

        assert_eq!(clock.position(t0 + secs(10), false), secs(90));
        assert_eq!(clock.position(t0 + secs(15), false), secs(95));

        clock.seek(secs(999), t0 + secs(20));
        assert_eq!(clock.position(t0 + secs(20), false), SONG);
    }

    #[test]
    fn paused_clock_is_frozen() {
        let t0 = Instant::now();
        let mut clock = TrackClock::start(t0, SONG);
        clock.pause(t0 + secs(40));

        assert_eq!(clock.position(t0 + secs(100), false), secs(40));
        assert!(!clock.is_finished(t0 + secs(500), false));

        clock.seek(secs(60), t0 + secs(110));
        assert_eq!(clock.position(t0 + secs(120), false), secs(60));

        clock.resume(t0 + secs(130));
        assert_eq!(clock.position(t0 + secs(135), false), secs(65));
    }

    #[test]
    fn unplayable_clock_stays_at_zero() {
        let t0 = Instant::now();
        let clock = TrackClock::unplayable(t0);
        assert_eq!(clock.position(t0 + secs(50), false), Duration::ZERO);
        assert_eq!(clock.position(t0 + secs(50), true), Duration::ZERO);
        assert!(!clock.is_finished(t0 + secs(50), false));
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(Duration::from_secs(0)), "0:00");
        assert_eq!(format_time(Duration::from_millis(65_900)), "1:05");
        assert_eq!(format_time(Duration::from_secs(3_725)), "62:05");
    }
}
