// The scroll container of the feed.
//
// Keeps the scroll offset in pixels and animates smooth scrolls frame by
// frame. The navigator only ever asks it to go somewhere; the app advances
// the animation from its frame loop and hears back once it has settled.

use std::time::{Duration, Instant};

/// What the navigator needs from a scroll container.
pub trait ScrollViewport {
    fn scroll_top(&self) -> f64;

    fn viewport_height(&self) -> f64;

    fn smooth_scroll_to(&mut self, offset: f64, now: Instant);
}

/// Index of the item whose top edge is nearest to `scroll_top`.
pub fn index_for_offset(scroll_top: f64, viewport_height: f64) -> i64 {
    if viewport_height <= 0.0 {
        return 0;
    }
    (scroll_top / viewport_height).round() as i64
}

#[derive(Debug, Clone, Copy)]
struct ScrollAnimation {
    from: f64,
    to: f64,
    started: Instant,
}

pub struct FeedViewport {
    scroll_top: f64,
    height: f64,
    duration: Duration,
    animation: Option<ScrollAnimation>,
}

// Cubic ease-in-out over t in [0, 1].
fn ease(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

impl FeedViewport {
    pub fn new(height: f64, duration: Duration) -> Self {
        FeedViewport {
            scroll_top: 0.0,
            height,
            duration,
            animation: None,
        }
    }

    pub fn is_scrolling(&self) -> bool {
        self.animation.is_some()
    }

    /// Move the animation forward. Returns true on the frame it settles.
    pub fn advance(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };

        let elapsed = now.saturating_duration_since(animation.started);
        if self.duration.is_zero() || elapsed >= self.duration {
            self.scroll_top = animation.to;
            self.animation = None;
            return true;
        }

        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.scroll_top = animation.from + (animation.to - animation.from) * ease(t);
        false
    }

    /// Resize the viewport and stay snapped to the item that was current.
    pub fn resize(&mut self, height: f64) {
        if height <= 0.0 || (height - self.height).abs() < f64::EPSILON {
            return;
        }
        let target = self
            .animation
            .map(|a| a.to)
            .unwrap_or(self.scroll_top);
        let index = index_for_offset(target, self.height).max(0);

        self.height = height;
        self.animation = None;
        self.scroll_top = index as f64 * height;
    }

    /// Jump without animating, clamped to the content.
    pub fn jump_to_index(&mut self, index: usize, item_count: usize) {
        let last = item_count.saturating_sub(1);
        self.animation = None;
        self.scroll_top = index.min(last) as f64 * self.height;
    }

    pub fn current_index(&self) -> i64 {
        index_for_offset(self.scroll_top, self.height)
    }
}

impl ScrollViewport for FeedViewport {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn viewport_height(&self) -> f64 {
        self.height
    }

    fn smooth_scroll_to(&mut self, offset: f64, now: Instant) {
        self.animation = Some(ScrollAnimation {
            from: self.scroll_top,
            to: offset,
            started: now,
        });
    }
}
