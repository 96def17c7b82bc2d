// Runtime configuration for the feed.
//
// Read from `config.json` in the app's config directory. Every field is
// optional in the file; anything missing falls back to the defaults below,
// which are the values the feed was tuned with.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR_NAME: &str = "reelfeed";
const CONFIG_DIR_ENV: &str = "REELFEED_CONFIG_DIR";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Minimum time between two accepted navigations, and the time after which
    /// a navigation is considered finished.
    pub cooldown_ms: u64,
    /// Vertical swipe distance a touch must exceed to count as a flick.
    pub touch_threshold_px: f64,
    /// A flick must cover the threshold within this long of touch start.
    pub touch_window_ms: u64,
    /// Fraction of an item that must be inside the observation root.
    pub visibility_threshold: f64,
    /// Fraction of the viewport height trimmed from the top and the bottom of
    /// the observation root.
    pub root_margin: f64,
    pub haptic_pulse_ms: u64,
    /// Ring the terminal bell as the haptic channel.
    pub haptic_bell: bool,
    pub smooth_scroll_ms: u64,
    /// Pixel height of one terminal row, used to turn mouse drags into swipes.
    pub cell_height_px: f64,
    /// Upper bound for HLS variant selection, in bits per second.
    pub max_bandwidth: Option<u64>,
    /// Mute default for every item except the first, which always starts muted.
    pub mute_by_default: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            cooldown_ms: 800,
            touch_threshold_px: 40.0,
            touch_window_ms: 300,
            visibility_threshold: 0.7,
            root_margin: 0.1,
            haptic_pulse_ms: 8,
            haptic_bell: false,
            smooth_scroll_ms: 300,
            cell_height_px: 16.0,
            max_bandwidth: None,
            mute_by_default: false,
        }
    }
}

impl FeedConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn touch_window(&self) -> Duration {
        Duration::from_millis(self.touch_window_ms)
    }

    pub fn haptic_pulse(&self) -> Duration {
        Duration::from_millis(self.haptic_pulse_ms)
    }

    pub fn smooth_scroll(&self) -> Duration {
        Duration::from_millis(self.smooth_scroll_ms)
    }

    /// Load `config.json` from `dir`. A missing file yields the defaults; a
    /// malformed one is logged and also yields the defaults.
    pub fn load_from(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE_NAME);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FeedConfig::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read config, using defaults");
                return FeedConfig::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed config, using defaults");
                FeedConfig::default()
            }
        }
    }
}

/// Directory holding the config file, the log and the persisted video store.
/// `REELFEED_CONFIG_DIR` wins over the platform config directory.
pub fn app_dir() -> Result<PathBuf, String> {
    let dir = match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::config_dir()
            .ok_or("Could not find config directory")?
            .join(APP_DIR_NAME),
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create config directory: {}", e))?;

    Ok(dir)
}
