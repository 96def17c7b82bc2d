// ==========================================
// PLAYBACK CLOCK
// ==========================================
// Tracks how far into a stream playback has progressed.
//
// Nothing decodes frames in the terminal, so the position is wall-clock time
// spent playing:
//   1. Store the start instant when playback first begins
//   2. Position = now - start
//   3. Subtract every paused interval
//   4. Wrap at the stream duration (feed videos loop)
//
// All methods take `now` so tests can move time by hand.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    start_time: Option<Instant>,
    pause_time: Option<Instant>,
    total_paused_duration: Duration,
}

impl PlaybackClock {
    pub fn new() -> Self {
        PlaybackClock::default()
    }

    // ==========================================
    // resume()
    // ==========================================
    // Starts the clock on first use, otherwise adds the interval since the
    // last pause to the paused total. Resuming a running clock does nothing.
    pub fn resume(&mut self, now: Instant) {
        match (self.start_time, self.pause_time) {
            (None, _) => {
                self.start_time = Some(now);
                self.pause_time = None;
            }
            (Some(_), Some(paused_at)) => {
                self.total_paused_duration += now.saturating_duration_since(paused_at);
                self.pause_time = None;
            }
            (Some(_), None) => {}
        }
    }

    // Pausing twice keeps the first pause instant.
    pub fn pause(&mut self, now: Instant) {
        if self.start_time.is_some() && self.pause_time.is_none() {
            self.pause_time = Some(now);
        }
    }

    pub fn reset(&mut self) {
        *self = PlaybackClock::default();
    }

    pub fn is_running(&self) -> bool {
        self.start_time.is_some() && self.pause_time.is_none()
    }

    // ==========================================
    // position()
    // ==========================================
    // Seconds of actual playback. While paused the clock is frozen at the
    // pause instant. `duration` <= 0 means unknown: no wrapping.
    pub fn position(&self, now: Instant, duration: f64) -> f64 {
        let Some(start) = self.start_time else {
            return 0.0;
        };

        let until = self.pause_time.unwrap_or(now);
        let elapsed = until.saturating_duration_since(start);
        let played = elapsed.saturating_sub(self.total_paused_duration).as_secs_f64();

        if duration > 0.0 {
            played % duration
        } else {
            played
        }
    }
}
