use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use reelfeed::config::FeedConfig;
use reelfeed::error::StreamError;
use reelfeed::feed::navigator::NavigationOutcome;
use reelfeed::feed::page::{FeedPage, TapTarget};
use reelfeed::feed::registry::{VideoRecord, VideoRegistry};
use reelfeed::feed::storage::MemoryStore;
use reelfeed::player::playback::MediaSurface;

const H: f64 = 900.0;

/// Surface that is ready as soon as it is attached and logs what it was told.
struct ScriptedSurface {
    name: String,
    log: Rc<RefCell<Vec<String>>>,
    attached: bool,
}

impl MediaSurface for ScriptedSurface {
    fn attach(&mut self, _url: &str) -> Result<(), StreamError> {
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) {
        self.attached = false;
        self.log.borrow_mut().push(format!("{} detach", self.name));
    }

    fn play(&mut self) -> Result<(), StreamError> {
        if !self.attached {
            return Err(StreamError::Detached);
        }
        self.log.borrow_mut().push(format!("{} play", self.name));
        Ok(())
    }

    fn pause(&mut self) {
        self.log.borrow_mut().push(format!("{} pause", self.name));
    }

    fn set_muted(&mut self, _muted: bool) {}
}

fn feed_page(log: Rc<RefCell<Vec<String>>>, names: Vec<(String, String)>) -> FeedPage<ScriptedSurface> {
    FeedPage::new(
        &FeedConfig::default(),
        H,
        Box::new(move |video: &VideoRecord| {
            let name = names
                .iter()
                .find(|(id, _)| *id == video.id)
                .map(|(_, name)| name.clone())
                .unwrap_or_default();
            ScriptedSurface {
                name,
                log: log.clone(),
                attached: false,
            }
        }),
    )
}

#[test]
fn arrow_down_from_b_moves_playback_to_c() {
    let mut registry = VideoRegistry::load(MemoryStore::new());
    let a = registry.add("https://cdn.example/a.m3u8");
    let b = registry.add("https://cdn.example/b.m3u8");
    let c = registry.add("https://cdn.example/c.m3u8");
    let names = vec![
        (a.id.clone(), "A".to_string()),
        (b.id.clone(), "B".to_string()),
        (c.id.clone(), "C".to_string()),
    ];

    let log = Rc::new(RefCell::new(Vec::new()));
    let mut page = feed_page(log.clone(), names);
    let t0 = Instant::now();
    page.sync(registry.videos(), t0);

    // Move to B and let the cooldown run out.
    assert_eq!(page.key("ArrowDown", t0), NavigationOutcome::Navigated { from: 0, to: 1 });
    page.sync(registry.videos(), t0 + Duration::from_millis(400));
    page.sync(registry.videos(), t0 + Duration::from_millis(1000));

    assert!(page.is_active(1));
    assert!(page.controller(&b.id).unwrap().state().is_playing);
    assert!(!page.controller(&a.id).unwrap().state().is_playing);
    assert!(!page.controller(&c.id).unwrap().state().is_playing);

    log.borrow_mut().clear();
    let t1 = t0 + Duration::from_millis(1000);
    assert_eq!(page.key("ArrowDown", t1), NavigationOutcome::Navigated { from: 1, to: 2 });
    // Repeats inside the cooldown change nothing.
    assert_eq!(page.key("ArrowDown", t1 + Duration::from_millis(50)), NavigationOutcome::Swallowed);
    page.sync(registry.videos(), t1 + Duration::from_millis(400));

    assert_eq!(page.current_index(), 2);
    assert!(page.controller(&c.id).unwrap().state().is_playing);
    assert!(!page.controller(&b.id).unwrap().state().is_playing);
    // A left the mounted range and released its stream.
    assert!(page.controller(&a.id).is_none());

    let log = log.borrow();
    assert!(log.contains(&"B pause".to_string()));
    assert!(log.contains(&"C play".to_string()));
    assert!(log.contains(&"A detach".to_string()));

    // At the last item another step is ignored.
    drop(log);
    let t2 = t1 + Duration::from_millis(900);
    page.sync(registry.videos(), t2);
    assert_eq!(page.key("ArrowDown", t2), NavigationOutcome::OutOfBounds);
    assert_eq!(page.current_index(), 2);
    assert!(!page.navigator().is_navigating());
}

#[test]
fn tapping_mute_does_not_toggle_playback() {
    let mut registry = VideoRegistry::load(MemoryStore::new());
    let a = registry.add("https://cdn.example/a.m3u8");
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut page = feed_page(log, vec![(a.id.clone(), "A".to_string())]);
    page.sync(registry.videos(), Instant::now());

    let before = page.controller(&a.id).unwrap().state();
    assert!(before.is_playing);
    assert!(before.is_muted);

    page.tap(registry.videos(), TapTarget::MuteButton);
    let after = page.controller(&a.id).unwrap().state();
    assert!(after.is_playing);
    assert!(!after.is_muted);
}
