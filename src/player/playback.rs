// ==========================================
// PLAYBACK CONTROLLER
// ==========================================
// One controller per mounted feed item. It owns that item's play/mute state
// and the streaming session bound to it.
//
// Rules:
// - Becoming active starts playback, becoming inactive pauses it
// - A failed play() (stream not ready, autoplay refused) is swallowed; the
//   item just stays paused and the user can tap it
// - The surface's ready signal retries playback if the item is still active
// - Tapping toggles play/pause; the mute button only toggles mute
// - Binding a new source detaches the old session first
// - Teardown (explicit or on drop) always detaches

use crate::error::StreamError;

/// The adaptive streaming collaborator as the controller sees it.
pub trait MediaSurface {
    fn attach(&mut self, url: &str) -> Result<(), StreamError>;

    fn detach(&mut self);

    fn play(&mut self) -> Result<(), StreamError>;

    fn pause(&mut self);

    fn set_muted(&mut self, muted: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_muted: bool,
}

pub struct PlaybackController<M: MediaSurface> {
    surface: M,
    state: PlaybackState,
    active: bool,
    attached: bool,
    source: Option<String>,
}

impl<M: MediaSurface> PlaybackController<M> {
    pub fn new(mut surface: M, default_muted: bool) -> Self {
        surface.set_muted(default_muted);
        PlaybackController {
            surface,
            state: PlaybackState {
                is_playing: false,
                is_muted: default_muted,
            },
            active: false,
            attached: false,
            source: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut M {
        &mut self.surface
    }

    pub fn bind(&mut self, url: &str) {
        self.release();
        self.state.is_playing = false;
        self.source = Some(url.to_string());

        match self.surface.attach(url) {
            Ok(()) => {
                self.attached = true;
                self.surface.set_muted(self.state.is_muted);
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "could not attach stream");
            }
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if active {
            self.try_play();
        } else {
            self.pause();
        }
    }

    /// The stream behind the surface finished loading its manifest.
    pub fn on_ready(&mut self) {
        if self.active {
            self.try_play();
        }
    }

    pub fn toggle_play(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.try_play();
        }
    }

    pub fn toggle_mute(&mut self) {
        self.state.is_muted = !self.state.is_muted;
        self.surface.set_muted(self.state.is_muted);
    }

    pub fn teardown(&mut self) {
        self.release();
        self.state.is_playing = false;
        self.active = false;
    }

    fn try_play(&mut self) {
        match self.surface.play() {
            Ok(()) => self.state.is_playing = true,
            Err(e) => {
                tracing::debug!(error = %e, "play refused, staying paused");
                self.state.is_playing = false;
            }
        }
    }

    fn pause(&mut self) {
        self.surface.pause();
        self.state.is_playing = false;
    }

    fn release(&mut self) {
        if self.attached {
            self.surface.detach();
            self.attached = false;
        }
    }
}

impl<M: MediaSurface> Drop for PlaybackController<M> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Surface that records every call and plays only once marked ready.
    #[derive(Clone, Default)]
    pub struct FakeSurface {
        pub log: Rc<RefCell<Vec<String>>>,
        pub ready: Rc<RefCell<bool>>,
        pub fail_attach: bool,
    }

    impl FakeSurface {
        pub fn ready() -> Self {
            let surface = FakeSurface::default();
            *surface.ready.borrow_mut() = true;
            surface
        }

        pub fn calls(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    impl MediaSurface for FakeSurface {
        fn attach(&mut self, url: &str) -> Result<(), StreamError> {
            if self.fail_attach {
                return Err(StreamError::InvalidUrl(url.to_string()));
            }
            self.log.borrow_mut().push(format!("attach {}", url));
            Ok(())
        }

        fn detach(&mut self) {
            self.log.borrow_mut().push("detach".to_string());
        }

        fn play(&mut self) -> Result<(), StreamError> {
            if *self.ready.borrow() {
                self.log.borrow_mut().push("play".to_string());
                Ok(())
            } else {
                Err(StreamError::NotReady)
            }
        }

        fn pause(&mut self) {
            self.log.borrow_mut().push("pause".to_string());
        }

        fn set_muted(&mut self, muted: bool) {
            self.log.borrow_mut().push(format!("muted {}", muted));
        }
    }
}
