// ==========================================
// SCROLL NAVIGATOR
// ==========================================
// Turns wheel, key and swipe gestures into exactly one step of the feed.
//
// State machine:
//   Idle --(trigger accepted)--> Navigating --(cooldown elapsed)--> Idle
//
// While Navigating, or within the cooldown of the last accepted step, every
// trigger is swallowed. Nothing is queued: a fast wheel spin that produces
// thirty events moves the feed by one item.
//
// The viewport reporting that its smooth scroll settled is only noted. The
// cooldown timer is what returns the navigator to Idle.

use std::time::{Duration, Instant};

use super::viewport::{index_for_offset, ScrollViewport};
use crate::config::FeedConfig;

/// Output channel for the short pulse that accompanies each step.
pub trait Haptics {
    fn pulse(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Navigating { since: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// A smooth scroll from `from` to `to` was started.
    Navigated { from: usize, to: usize },
    /// A trigger arrived while navigating or inside the cooldown.
    Swallowed,
    /// The step would leave the feed; nothing happened.
    OutOfBounds,
    /// The input was not a trigger at all.
    Ignored,
}

impl NavigationOutcome {
    /// Whether the shell should consume the raw event instead of letting it
    /// scroll natively.
    pub fn consumes_event(&self) -> bool {
        !matches!(self, NavigationOutcome::Ignored)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorTiming {
    pub cooldown: Duration,
    pub touch_threshold_px: f64,
    pub touch_window: Duration,
    pub haptic_pulse: Duration,
}

impl Default for NavigatorTiming {
    fn default() -> Self {
        NavigatorTiming::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for NavigatorTiming {
    fn from(config: &FeedConfig) -> Self {
        NavigatorTiming {
            cooldown: config.cooldown(),
            touch_threshold_px: config.touch_threshold_px,
            touch_window: config.touch_window(),
            haptic_pulse: config.haptic_pulse(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TouchStart {
    y: f64,
    at: Instant,
}

pub struct ScrollNavigator {
    timing: NavigatorTiming,
    state: NavState,
    last_navigation: Option<Instant>,
    touch: Option<TouchStart>,
    last_settle: Option<Instant>,
    haptics: Option<Box<dyn Haptics>>,
}

impl ScrollNavigator {
    pub fn new(timing: NavigatorTiming) -> Self {
        ScrollNavigator {
            timing,
            state: NavState::Idle,
            last_navigation: None,
            touch: None,
            last_settle: None,
            haptics: None,
        }
    }

    pub fn with_haptics(mut self, haptics: Box<dyn Haptics>) -> Self {
        self.haptics = Some(haptics);
        self
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn is_navigating(&self) -> bool {
        matches!(self.state, NavState::Navigating { .. })
    }

    /// When the viewport last reported a settled scroll.
    pub fn last_settle(&self) -> Option<Instant> {
        self.last_settle
    }

    /// Return to Idle once the cooldown since the navigation started has passed.
    pub fn tick(&mut self, now: Instant) {
        if let NavState::Navigating { since } = self.state {
            if now.saturating_duration_since(since) >= self.timing.cooldown {
                tracing::trace!("navigation cooldown elapsed");
                self.state = NavState::Idle;
            }
        }
    }

    pub fn on_scroll_settled(&mut self, now: Instant) {
        tracing::trace!(navigating = self.is_navigating(), "scroll settled");
        self.last_settle = Some(now);
    }

    pub fn wheel<V: ScrollViewport>(
        &mut self,
        delta_y: f64,
        now: Instant,
        viewport: &mut V,
        item_count: usize,
    ) -> NavigationOutcome {
        if delta_y == 0.0 || delta_y.is_nan() {
            return NavigationOutcome::Ignored;
        }
        let direction = if delta_y > 0.0 { 1 } else { -1 };
        self.navigate(direction, now, viewport, item_count)
    }

    /// `key` is a DOM-style key name; only "ArrowUp" and "ArrowDown" navigate.
    pub fn key<V: ScrollViewport>(
        &mut self,
        key: &str,
        now: Instant,
        viewport: &mut V,
        item_count: usize,
    ) -> NavigationOutcome {
        let direction = match key {
            "ArrowUp" => -1,
            "ArrowDown" => 1,
            _ => return NavigationOutcome::Ignored,
        };
        self.navigate(direction, now, viewport, item_count)
    }

    pub fn touch_start(&mut self, y: f64, now: Instant) {
        self.tick(now);
        if self.is_navigating() {
            return;
        }
        self.touch = Some(TouchStart { y, at: now });
    }

    pub fn touch_move<V: ScrollViewport>(
        &mut self,
        y: f64,
        now: Instant,
        viewport: &mut V,
        item_count: usize,
    ) -> NavigationOutcome {
        self.tick(now);
        if self.is_navigating() {
            return NavigationOutcome::Swallowed;
        }
        let Some(start) = self.touch else {
            return NavigationOutcome::Ignored;
        };

        let delta = start.y - y;
        let elapsed = now.saturating_duration_since(start.at);
        if delta.abs() > self.timing.touch_threshold_px && elapsed < self.timing.touch_window {
            let direction = if delta > 0.0 { 1 } else { -1 };
            return self.navigate(direction, now, viewport, item_count);
        }
        NavigationOutcome::Ignored
    }

    pub fn touch_end(&mut self) {
        self.touch = None;
    }

    fn in_cooldown(&self, now: Instant) -> bool {
        self.last_navigation
            .map(|at| now.saturating_duration_since(at) < self.timing.cooldown)
            .unwrap_or(false)
    }

    fn navigate<V: ScrollViewport>(
        &mut self,
        direction: i64,
        now: Instant,
        viewport: &mut V,
        item_count: usize,
    ) -> NavigationOutcome {
        self.tick(now);
        if self.is_navigating() || self.in_cooldown(now) {
            return NavigationOutcome::Swallowed;
        }
        // Any trigger past the guard opens a new window, even a rejected one.
        self.last_navigation = Some(now);

        let height = viewport.viewport_height();
        if height <= 0.0 {
            return NavigationOutcome::Ignored;
        }

        let current = index_for_offset(viewport.scroll_top(), height);
        let target = current + direction;
        if target < 0 || target >= item_count as i64 {
            tracing::debug!(current, target, item_count, "navigation target out of bounds");
            self.state = NavState::Idle;
            return NavigationOutcome::OutOfBounds;
        }

        self.state = NavState::Navigating { since: now };
        viewport.smooth_scroll_to(target as f64 * height, now);

        if let Some(haptics) = self.haptics.as_mut() {
            haptics.pulse(self.timing.haptic_pulse);
        }

        tracing::debug!(from = current, to = target, "navigating");
        NavigationOutcome::Navigated {
            from: current.max(0) as usize,
            to: target as usize,
        }
    }
}
