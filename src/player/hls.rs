// HLS streaming surface.
//
// Attaching a source spawns a task that downloads the manifest, picks a
// variant that fits the bandwidth cap, loads that variant's media playlist
// and reports back over a channel. Playback is refused until the app has fed
// the ready event back in with `mark_ready`.

use reqwest::{Client, Url};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::clock::PlaybackClock;
use super::playback::MediaSurface;
use crate::error::StreamError;

// ==========================================
// PLAYLIST MODEL
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub bandwidth: u64,
    pub resolution: Option<(u32, u32)>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub duration: f64,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaPlaylist {
    pub target_duration: Option<f64>,
    pub segments: Vec<Segment>,
    pub ended: bool,
}

impl MediaPlaylist {
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master(Vec<Variant>),
    Media(MediaPlaylist),
}

/// What the UI shows once a stream is ready.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub variant: Option<Variant>,
    pub duration: f64,
    pub segment_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Ready {
        key: String,
        generation: u64,
        summary: StreamSummary,
    },
    Failed {
        key: String,
        generation: u64,
        reason: String,
    },
}

// ==========================================
// PARSING
// ==========================================

/// Split an attribute list, keeping commas inside quoted values.
fn parse_attributes(list: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    let mut flush = |item: &mut String| {
        if let Some((name, value)) = item.split_once('=') {
            attributes.push((name.trim().to_string(), value.trim().trim_matches('"').to_string()));
        }
        item.clear();
    };

    for c in list.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => flush(&mut current),
            _ => current.push(c),
        }
    }
    flush(&mut current);

    attributes
}

fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once(['x', 'X'])?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

pub fn parse_playlist(text: &str) -> Result<Playlist, StreamError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("#EXTM3U") {
        return Err(StreamError::NotHls);
    }

    let mut variants = Vec::new();
    let mut media = MediaPlaylist::default();
    let mut pending_variant: Option<(u64, Option<(u32, u32)>)> = None;
    let mut pending_duration: Option<f64> = None;

    for line in lines {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let mut bandwidth = 0;
            let mut resolution = None;
            for (name, value) in parse_attributes(attrs) {
                match name.as_str() {
                    "BANDWIDTH" => bandwidth = value.parse().unwrap_or(0),
                    "RESOLUTION" => resolution = parse_resolution(&value),
                    _ => {}
                }
            }
            pending_variant = Some((bandwidth, resolution));
        } else if let Some(info) = line.strip_prefix("#EXTINF:") {
            let duration = info.split(',').next().unwrap_or("").trim();
            pending_duration = duration.parse().ok();
        } else if let Some(target) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            media.target_duration = target.trim().parse().ok();
        } else if line == "#EXT-X-ENDLIST" {
            media.ended = true;
        } else if line.starts_with('#') {
            continue;
        } else if let Some((bandwidth, resolution)) = pending_variant.take() {
            variants.push(Variant {
                bandwidth,
                resolution,
                uri: line.to_string(),
            });
        } else if let Some(duration) = pending_duration.take() {
            media.segments.push(Segment {
                duration,
                uri: line.to_string(),
            });
        }
    }

    if !variants.is_empty() {
        Ok(Playlist::Master(variants))
    } else if !media.segments.is_empty() {
        Ok(Playlist::Media(media))
    } else {
        Err(StreamError::Empty)
    }
}

/// Highest bandwidth under the cap; the lowest one if none fits.
pub fn select_variant(variants: &[Variant], max_bandwidth: Option<u64>) -> Option<&Variant> {
    let fitting = variants
        .iter()
        .filter(|v| max_bandwidth.map_or(true, |cap| v.bandwidth <= cap))
        .max_by_key(|v| v.bandwidth);

    fitting.or_else(|| variants.iter().min_by_key(|v| v.bandwidth))
}

// ==========================================
// LOADING
// ==========================================

async fn fetch_text(client: &Client, url: &Url) -> Result<String, StreamError> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

async fn load_stream(client: Client, url: Url, max_bandwidth: Option<u64>) -> Result<StreamSummary, StreamError> {
    match parse_playlist(&fetch_text(&client, &url).await?)? {
        Playlist::Media(media) => Ok(StreamSummary {
            variant: None,
            duration: media.duration(),
            segment_count: media.segments.len(),
        }),
        Playlist::Master(variants) => {
            let variant = select_variant(&variants, max_bandwidth)
                .cloned()
                .ok_or(StreamError::Empty)?;
            let variant_url = url
                .join(&variant.uri)
                .map_err(|_| StreamError::InvalidUrl(variant.uri.clone()))?;
            tracing::debug!(bandwidth = variant.bandwidth, url = %variant_url, "selected variant");

            match parse_playlist(&fetch_text(&client, &variant_url).await?)? {
                Playlist::Media(media) => Ok(StreamSummary {
                    variant: Some(variant),
                    duration: media.duration(),
                    segment_count: media.segments.len(),
                }),
                Playlist::Master(_) => Err(StreamError::Empty),
            }
        }
    }
}

// ==========================================
// SURFACE
// ==========================================

struct Session {
    generation: u64,
    task: JoinHandle<()>,
    summary: Option<StreamSummary>,
}

pub struct HlsSurface {
    key: String,
    client: Client,
    events: mpsc::UnboundedSender<StreamEvent>,
    max_bandwidth: Option<u64>,
    generation: u64,
    session: Option<Session>,
    muted: bool,
    playing: bool,
    clock: PlaybackClock,
}

impl HlsSurface {
    pub fn new(
        key: impl Into<String>,
        client: Client,
        events: mpsc::UnboundedSender<StreamEvent>,
        max_bandwidth: Option<u64>,
    ) -> Self {
        HlsSurface {
            key: key.into(),
            client,
            events,
            max_bandwidth,
            generation: 0,
            session: None,
            muted: false,
            playing: false,
            clock: PlaybackClock::new(),
        }
    }

    /// Apply a ready event. Events from a session that was since replaced or
    /// detached are ignored; returns whether the event was applied.
    pub fn mark_ready(&mut self, generation: u64, summary: StreamSummary) -> bool {
        match self.session.as_mut() {
            Some(session) if session.generation == generation => {
                session.summary = Some(summary);
                true
            }
            _ => false,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.session.as_ref().map(|s| s.generation) == Some(generation)
    }

    pub fn summary(&self) -> Option<&StreamSummary> {
        self.session.as_ref().and_then(|s| s.summary.as_ref())
    }

    pub fn is_attached(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.summary.is_none())
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self, now: Instant) -> f64 {
        let duration = self.summary().map_or(0.0, |s| s.duration);
        self.clock.position(now, duration)
    }
}

impl MediaSurface for HlsSurface {
    fn attach(&mut self, url: &str) -> Result<(), StreamError> {
        self.detach();

        let url = Url::parse(url).map_err(|_| StreamError::InvalidUrl(url.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StreamError::NoRuntime)?;

        self.generation += 1;
        let generation = self.generation;
        let key = self.key.clone();
        let client = self.client.clone();
        let events = self.events.clone();
        let max_bandwidth = self.max_bandwidth;

        tracing::debug!(key = %key, url = %url, generation, "loading stream");
        let task = runtime.spawn(async move {
            let event = match load_stream(client, url, max_bandwidth).await {
                Ok(summary) => StreamEvent::Ready {
                    key,
                    generation,
                    summary,
                },
                Err(e) => StreamEvent::Failed {
                    key,
                    generation,
                    reason: e.to_string(),
                },
            };
            // The app may already be gone; nothing to do then.
            let _ = events.send(event);
        });

        self.session = Some(Session {
            generation,
            task,
            summary: None,
        });
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(session) = self.session.take() {
            session.task.abort();
            tracing::debug!(key = %self.key, generation = session.generation, "stream detached");
        }
        self.playing = false;
        self.clock.reset();
    }

    fn play(&mut self) -> Result<(), StreamError> {
        let session = self.session.as_ref().ok_or(StreamError::Detached)?;
        if session.summary.is_none() {
            return Err(StreamError::NotReady);
        }
        self.playing = true;
        self.clock.resume(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
        self.clock.pause(Instant::now());
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}

impl Drop for HlsSurface {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"
360p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080p/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-TARGETDURATION:6
#EXTINF:6.0,
seg0.ts
#EXTINF:6.0,
seg1.ts
#EXTINF:3.5,title
seg2.ts
#EXT-X-ENDLIST
";

    #[test]
    fn parses_master_playlist_with_quoted_codecs() {
        let Playlist::Master(variants) = parse_playlist(MASTER).unwrap() else {
            panic!("expected a master playlist");
        };
        assert_eq!(variants.len(), 3);
        assert_eq!(
            variants[0],
            Variant {
                bandwidth: 800_000,
                resolution: Some((640, 360)),
                uri: "360p/index.m3u8".to_string(),
            }
        );
    }

    #[test]
    fn parses_media_playlist() {
        let Playlist::Media(media) = parse_playlist(MEDIA).unwrap() else {
            panic!("expected a media playlist");
        };
        assert_eq!(media.segments.len(), 3);
        assert_eq!(media.duration(), 15.5);
        assert_eq!(media.target_duration, Some(6.0));
        assert!(media.ended);
    }

    #[test]
    fn rejects_non_hls_and_empty_documents() {
        assert!(matches!(parse_playlist("<html></html>"), Err(StreamError::NotHls)));
        assert!(matches!(parse_playlist("#EXTM3U\n#EXT-X-VERSION:3\n"), Err(StreamError::Empty)));
    }

    #[test]
    fn variant_selection_respects_cap() {
        let Playlist::Master(variants) = parse_playlist(MASTER).unwrap() else {
            panic!("expected a master playlist");
        };
        assert_eq!(select_variant(&variants, None).unwrap().bandwidth, 5_000_000);
        assert_eq!(select_variant(&variants, Some(3_000_000)).unwrap().bandwidth, 2_800_000);
        assert_eq!(select_variant(&variants, Some(100)).unwrap().bandwidth, 800_000);
        assert!(select_variant(&[], None).is_none());
    }

    fn surface() -> (HlsSurface, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (HlsSurface::new("item", Client::new(), tx, None), rx)
    }

    fn summary() -> StreamSummary {
        StreamSummary {
            variant: None,
            duration: 10.0,
            segment_count: 2,
        }
    }

    #[test]
    fn attach_without_runtime_fails() {
        let (mut surface, _rx) = surface();
        assert!(matches!(
            surface.attach("https://cdn.example/a.m3u8"),
            Err(StreamError::NoRuntime)
        ));
        assert!(matches!(surface.attach("not a url"), Err(StreamError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn play_waits_for_ready_and_stale_events_are_ignored() {
        let (mut surface, _rx) = surface();
        assert!(matches!(surface.play(), Err(StreamError::Detached)));

        surface.attach("http://127.0.0.1:9/a.m3u8").unwrap();
        assert!(surface.is_loading());
        assert!(matches!(surface.play(), Err(StreamError::NotReady)));

        surface.attach("http://127.0.0.1:9/b.m3u8").unwrap();
        assert!(!surface.mark_ready(1, summary()));
        assert!(surface.mark_ready(2, summary()));

        surface.set_muted(true);
        surface.play().unwrap();
        assert!(surface.is_playing());
        assert!(surface.is_muted());

        surface.detach();
        assert!(!surface.is_attached());
        assert!(!surface.is_playing());
    }
}
