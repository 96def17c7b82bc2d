// Vertical video feed: one flick moves exactly one video.
//
// `feed` holds the registry, the gesture navigator and visibility tracking,
// `player` the per-item playback controller and the HLS surface, `ui` the
// terminal shell around them.

pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod player;
pub mod ui;
