pub mod clock;
pub mod hls;
pub mod playback;
