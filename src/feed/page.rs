// The feed screen without the terminal.
//
// Owns the scroll viewport, the navigator, the visibility tracker and one
// playback controller per mounted item (the current item and its two
// neighbours). The app calls `sync` once per frame and forwards gestures and
// taps; rendering reads the state back through the accessors.

use std::collections::HashMap;
use std::time::Instant;

use super::navigator::{Haptics, NavigationOutcome, NavigatorTiming, ScrollNavigator};
use super::registry::VideoRecord;
use super::viewport::{FeedViewport, ScrollViewport};
use super::visibility::{VisibilityRules, VisibilityTracker};
use crate::config::FeedConfig;
use crate::player::playback::{MediaSurface, PlaybackController};

/// Items mounted on each side of the current one.
const MOUNT_RADIUS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapTarget {
    /// The video itself: toggles play/pause.
    Surface,
    /// The mute button: toggles mute and nothing else.
    MuteButton,
}

pub type SurfaceFactory<M> = Box<dyn FnMut(&VideoRecord) -> M>;

pub struct FeedPage<M: MediaSurface> {
    viewport: FeedViewport,
    navigator: ScrollNavigator,
    tracker: VisibilityTracker,
    controllers: HashMap<String, PlaybackController<M>>,
    make_surface: SurfaceFactory<M>,
    mute_by_default: bool,
    item_count: usize,
}

impl<M: MediaSurface> FeedPage<M> {
    pub fn new(config: &FeedConfig, viewport_height: f64, make_surface: SurfaceFactory<M>) -> Self {
        FeedPage {
            viewport: FeedViewport::new(viewport_height, config.smooth_scroll()),
            navigator: ScrollNavigator::new(NavigatorTiming::from(config)),
            tracker: VisibilityTracker::new(VisibilityRules {
                threshold: config.visibility_threshold,
                root_margin: config.root_margin,
            }),
            controllers: HashMap::new(),
            make_surface,
            mute_by_default: config.mute_by_default,
            item_count: 0,
        }
    }

    pub fn with_haptics(mut self, haptics: Box<dyn Haptics>) -> Self {
        self.navigator = self.navigator.with_haptics(haptics);
        self
    }

    pub fn viewport(&self) -> &FeedViewport {
        &self.viewport
    }

    pub fn navigator(&self) -> &ScrollNavigator {
        &self.navigator
    }

    pub fn current_index(&self) -> usize {
        let last = self.item_count.saturating_sub(1) as i64;
        self.viewport.current_index().clamp(0, last.max(0)) as usize
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.tracker.is_active(index)
    }

    pub fn controller(&self, id: &str) -> Option<&PlaybackController<M>> {
        self.controllers.get(id)
    }

    pub fn controller_mut(&mut self, id: &str) -> Option<&mut PlaybackController<M>> {
        self.controllers.get_mut(id)
    }

    pub fn mounted_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn resize(&mut self, viewport_height: f64) {
        self.viewport.resize(viewport_height);
    }

    /// Advance one frame: animation, cooldown, mounting and activation.
    pub fn sync(&mut self, videos: &[VideoRecord], now: Instant) {
        self.item_count = videos.len();

        if self.viewport.advance(now) {
            self.navigator.on_scroll_settled(now);
        }
        self.navigator.tick(now);

        // The list may have shrunk under us.
        if !videos.is_empty() && self.viewport.current_index() >= videos.len() as i64 && !self.viewport.is_scrolling() {
            self.viewport.jump_to_index(videos.len() - 1, videos.len());
        }

        self.mount(videos);

        let changes = self.tracker.update(
            self.viewport.scroll_top(),
            self.viewport.viewport_height(),
            videos.len(),
        );
        for change in &changes {
            tracing::trace!(index = change.index, active = change.active, "visibility changed");
        }

        // Reconcile every mounted controller, including ones mounted this frame.
        for (index, video) in videos.iter().enumerate() {
            let desired = self.tracker.is_active(index);
            if let Some(controller) = self.controllers.get_mut(&video.id) {
                if controller.is_active() != desired {
                    controller.set_active(desired);
                }
            }
        }
    }

    fn mount(&mut self, videos: &[VideoRecord]) {
        let current = self.current_index();
        let first = current.saturating_sub(MOUNT_RADIUS);
        let last = (current + MOUNT_RADIUS).min(videos.len().saturating_sub(1));

        let wanted: HashMap<&str, usize> = videos
            .iter()
            .enumerate()
            .filter(|(index, _)| *index >= first && *index <= last)
            .map(|(index, video)| (video.id.as_str(), index))
            .collect();

        self.controllers.retain(|id, controller| {
            let keep = wanted.contains_key(id.as_str());
            if !keep {
                controller.teardown();
                tracing::debug!(id = %id, "unmounted feed item");
            }
            keep
        });

        for (id, index) in wanted {
            if self.controllers.contains_key(id) {
                continue;
            }
            let video = &videos[index];
            let default_muted = index == 0 || self.mute_by_default;
            let mut controller = PlaybackController::new((self.make_surface)(video), default_muted);
            controller.bind(&video.url);
            tracing::debug!(id = %video.id, index, "mounted feed item");
            self.controllers.insert(video.id.clone(), controller);
        }
    }

    /// Release every mounted session, e.g. when the feed leaves the screen.
    /// The next `sync` mounts the current range again.
    pub fn unmount_all(&mut self) {
        for (id, mut controller) in self.controllers.drain() {
            controller.teardown();
            tracing::debug!(id = %id, "unmounted feed item");
        }
        self.tracker.reset();
    }

    pub fn wheel(&mut self, delta_y: f64, now: Instant) -> NavigationOutcome {
        self.navigator.wheel(delta_y, now, &mut self.viewport, self.item_count)
    }

    pub fn key(&mut self, key: &str, now: Instant) -> NavigationOutcome {
        self.navigator.key(key, now, &mut self.viewport, self.item_count)
    }

    pub fn touch_start(&mut self, y: f64, now: Instant) {
        self.navigator.touch_start(y, now);
    }

    pub fn touch_move(&mut self, y: f64, now: Instant) -> NavigationOutcome {
        self.navigator.touch_move(y, now, &mut self.viewport, self.item_count)
    }

    pub fn touch_end(&mut self) {
        self.navigator.touch_end();
    }

    /// Tap on the current item.
    pub fn tap(&mut self, videos: &[VideoRecord], target: TapTarget) {
        let Some(video) = videos.get(self.current_index()) else {
            return;
        };
        let Some(controller) = self.controllers.get_mut(&video.id) else {
            return;
        };
        match target {
            TapTarget::Surface => controller.toggle_play(),
            TapTarget::MuteButton => controller.toggle_mute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::playback::fake::FakeSurface;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    const H: f64 = 800.0;

    fn videos(n: usize) -> Vec<VideoRecord> {
        (0..n)
            .map(|i| VideoRecord {
                id: format!("id-{}", i),
                url: format!("https://cdn.example/{}.m3u8", i),
                created_at: 0,
            })
            .collect()
    }

    fn page() -> FeedPage<FakeSurface> {
        FeedPage::new(&FeedConfig::default(), H, Box::new(|_: &VideoRecord| FakeSurface::ready()))
    }

    #[test]
    fn first_item_mounts_muted_and_plays() {
        let videos = videos(5);
        let mut page = page();
        page.sync(&videos, Instant::now());

        assert_eq!(page.mounted_count(), 2);
        let first = page.controller("id-0").unwrap().state();
        assert!(first.is_playing);
        assert!(first.is_muted);

        let second = page.controller("id-1").unwrap().state();
        assert!(!second.is_playing);
        assert!(!second.is_muted);
    }

    #[test]
    fn navigation_moves_playback_and_remounts() {
        let videos = videos(5);
        let mut page = page();
        let t0 = Instant::now();
        page.sync(&videos, t0);

        assert_eq!(page.key("ArrowDown", t0), NavigationOutcome::Navigated { from: 0, to: 1 });
        page.sync(&videos, t0 + Duration::from_millis(400));
        assert_eq!(page.current_index(), 1);
        assert!(page.controller("id-1").unwrap().state().is_playing);
        assert!(!page.controller("id-0").unwrap().state().is_playing);
        assert!(page.controller("id-2").is_some());

        page.sync(&videos, t0 + Duration::from_millis(800));
        page.key("ArrowDown", t0 + Duration::from_millis(800));
        page.sync(&videos, t0 + Duration::from_millis(1200));
        assert_eq!(page.current_index(), 2);
        assert!(page.controller("id-0").is_none());
        assert_eq!(page.mounted_count(), 3);
    }

    #[test]
    fn taps_reach_the_current_item_only() {
        let videos = videos(3);
        let mut page = page();
        page.sync(&videos, Instant::now());

        page.tap(&videos, TapTarget::MuteButton);
        let state = page.controller("id-0").unwrap().state();
        assert!(state.is_playing);
        assert!(!state.is_muted);

        page.tap(&videos, TapTarget::Surface);
        assert!(!page.controller("id-0").unwrap().state().is_playing);
        assert!(!page.controller("id-1").unwrap().state().is_muted);
    }

    #[test]
    fn removing_items_clamps_and_unmounts() {
        let mut list = videos(3);
        let mut page = page();
        let t0 = Instant::now();
        page.sync(&list, t0);
        page.key("ArrowDown", t0);
        page.sync(&list, t0 + Duration::from_millis(400));
        page.key("ArrowDown", t0 + Duration::from_millis(800));
        page.sync(&list, t0 + Duration::from_millis(1200));
        assert_eq!(page.current_index(), 2);

        list.truncate(1);
        page.sync(&list, t0 + Duration::from_millis(1300));
        assert_eq!(page.current_index(), 0);
        assert_eq!(page.mounted_count(), 1);
        assert!(page.controller("id-0").unwrap().state().is_playing);
    }

    #[test]
    fn unmount_all_detaches_every_surface() {
        let videos = videos(4);
        let surfaces: Rc<RefCell<Vec<FakeSurface>>> = Rc::default();
        let made = Rc::clone(&surfaces);
        let mut page = FeedPage::new(
            &FeedConfig::default(),
            H,
            Box::new(move |_: &VideoRecord| {
                let surface = FakeSurface::ready();
                made.borrow_mut().push(surface.clone());
                surface
            }),
        );
        let t0 = Instant::now();
        page.sync(&videos, t0);
        page.key("ArrowDown", t0);
        page.sync(&videos, t0 + Duration::from_millis(400));
        assert_eq!(page.mounted_count(), 3);

        page.unmount_all();
        assert_eq!(page.mounted_count(), 0);
        assert!(!page.is_active(1));
        for surface in surfaces.borrow().iter() {
            let detaches = surface.calls().iter().filter(|c| *c == "detach").count();
            assert_eq!(detaches, 1);
        }

        // Coming back mounts and plays the same item again.
        page.sync(&videos, t0 + Duration::from_millis(500));
        assert_eq!(page.mounted_count(), 3);
        assert!(page.controller("id-1").unwrap().state().is_playing);
    }

    #[test]
    fn empty_feed_mounts_nothing() {
        let mut page = page();
        page.sync(&[], Instant::now());
        assert_eq!(page.mounted_count(), 0);
        assert_eq!(page.key("ArrowDown", Instant::now()), NavigationOutcome::OutOfBounds);
        page.tap(&[], TapTarget::Surface);
    }
}
