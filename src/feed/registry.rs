// ==========================================
// VIDEO REGISTRY
// ==========================================
// The ordered list of videos shown in the feed.
// It handles:
// - Adding a URL (fresh id + timestamp, appended at the end)
// - Removing a video by id
// - Persisting the whole list after every change
// - Loading and migrating whatever an older version left in storage
//
// Insertion order IS feed order. Records are never edited in place; the admin
// panel removes and re-adds instead.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::storage::KeyValueStore;
use crate::error::StoreError;

pub const STORE_KEY: &str = "video-store";
pub const CURRENT_VERSION: u32 = 2;

// ==========================================
// VIDEO RECORD
// ==========================================
// id: String
//   - Random UUID v4 in its hyphenated text form
//   - Unique within the registry; the feed keys its players by it
//
// url: String
//   - Expected to point at an HLS manifest (.m3u8), not checked
//
// created_at: i64
//   - Milliseconds since the Unix epoch
//   - Stored as `createdAt` to stay readable by older builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub url: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

// Envelope written under STORE_KEY:
// { "state": { "videos": [...] }, "version": 2 }
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateV2 {
    videos: Vec<VideoRecord>,
}

// Version 1 (and unversioned documents) had no creation timestamp.
#[derive(Debug, Deserialize)]
struct StateV1 {
    videos: Vec<VideoV1>,
}

#[derive(Debug, Deserialize)]
struct VideoV1 {
    id: String,
    url: String,
}

fn migrate_v1_to_v2(state: StateV1, now_ms: i64) -> StateV2 {
    StateV2 {
        videos: state
            .videos
            .into_iter()
            .map(|video| VideoRecord {
                id: video.id,
                url: video.url,
                created_at: now_ms,
            })
            .collect(),
    }
}

/// Parse a stored document and bring it forward to the current shape.
fn decode_state(raw: &str, now_ms: i64) -> Result<StateV2, StoreError> {
    let corrupt = |source| StoreError::Corrupt {
        key: STORE_KEY.to_string(),
        source,
    };

    let envelope: Envelope<serde_json::Value> = serde_json::from_str(raw).map_err(corrupt)?;

    match envelope.version {
        0 | 1 => {
            let v1: StateV1 = serde_json::from_value(envelope.state).map_err(corrupt)?;
            Ok(migrate_v1_to_v2(v1, now_ms))
        }
        CURRENT_VERSION => serde_json::from_value(envelope.state).map_err(corrupt),
        found => Err(StoreError::UnsupportedVersion {
            found,
            supported: CURRENT_VERSION,
        }),
    }
}

fn new_video_id() -> String {
    Uuid::new_v4().to_string()
}

pub struct VideoRegistry<S: KeyValueStore> {
    videos: Vec<VideoRecord>,
    store: S,
}

impl<S: KeyValueStore> VideoRegistry<S> {
    /// Hydrate from `store`. Unreadable or too-new documents are logged and
    /// replaced by an empty list on the next write.
    pub fn load(store: S) -> Self {
        Self::load_at(store, Utc::now().timestamp_millis())
    }

    /// Same as `load`, with the timestamp used to backfill migrated records.
    pub fn load_at(store: S, now_ms: i64) -> Self {
        let videos = match store.get(STORE_KEY) {
            Ok(Some(raw)) => match decode_state(&raw, now_ms) {
                Ok(state) => {
                    tracing::info!(count = state.videos.len(), "video store hydrated");
                    state.videos
                }
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable video store");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read video store");
                Vec::new()
            }
        };

        VideoRegistry { videos, store }
    }

    pub fn add(&mut self, url: &str) -> VideoRecord {
        let mut id = new_video_id();
        while self.videos.iter().any(|v| v.id == id) {
            id = new_video_id();
        }

        let record = VideoRecord {
            id,
            url: url.to_string(),
            created_at: Utc::now().timestamp_millis(),
        };
        self.videos.push(record.clone());
        tracing::info!(id = %record.id, url = %record.url, "video added");

        self.persist();
        record
    }

    /// Removing an unknown id is not an error; the list is still re-persisted.
    pub fn remove(&mut self, id: &str) {
        let before = self.videos.len();
        self.videos.retain(|video| video.id != id);
        if self.videos.len() < before {
            tracing::info!(id, "video removed");
        } else {
            tracing::debug!(id, "remove requested for unknown video");
        }

        self.persist();
    }

    pub fn videos(&self) -> &[VideoRecord] {
        &self.videos
    }

    pub fn get(&self, index: usize) -> Option<&VideoRecord> {
        self.videos.get(index)
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // Fire-and-forget: a failed write is logged, the in-memory list stays authoritative.
    fn persist(&mut self) {
        let envelope = Envelope {
            state: StateV2 {
                videos: self.videos.clone(),
            },
            version: CURRENT_VERSION,
        };

        let result = serde_json::to_string(&envelope)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set(STORE_KEY, &json));

        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist video store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::storage::{FileStore, MemoryStore};

    fn urls<S: KeyValueStore>(registry: &VideoRegistry<S>) -> Vec<&str> {
        registry.videos().iter().map(|v| v.url.as_str()).collect()
    }

    #[test]
    fn add_appends_in_order_with_unique_ids() {
        let mut registry = VideoRegistry::load(MemoryStore::new());
        let a = registry.add("https://cdn.example/a.m3u8");
        let b = registry.add("https://cdn.example/b.m3u8");

        assert_ne!(a.id, b.id);
        let parsed = Uuid::parse_str(&a.id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.hyphenated().to_string(), a.id);
        assert!(b.created_at >= a.created_at);
        assert_eq!(urls(&registry), vec!["https://cdn.example/a.m3u8", "https://cdn.example/b.m3u8"]);
    }

    #[test]
    fn remove_keeps_order_of_remaining() {
        let mut registry = VideoRegistry::load(MemoryStore::new());
        let ids: Vec<String> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| registry.add(&format!("https://cdn.example/{}.m3u8", name)).id)
            .collect();

        registry.remove(&ids[1]);

        assert_eq!(registry.len(), 3);
        assert_eq!(
            urls(&registry),
            vec![
                "https://cdn.example/a.m3u8",
                "https://cdn.example/c.m3u8",
                "https://cdn.example/d.m3u8"
            ]
        );
    }

    #[test]
    fn remove_unknown_id_is_a_no_op() {
        let mut registry = VideoRegistry::load(MemoryStore::new());
        registry.add("https://cdn.example/a.m3u8");
        registry.remove("not-an-id");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let mut registry = VideoRegistry::load(MemoryStore::new());
        let a = registry.add("https://cdn.example/a.m3u8");
        registry.add("https://cdn.example/b.m3u8");
        registry.remove(&a.id);

        let raw = registry.store().get(STORE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["state"]["videos"].as_array().unwrap().len(), 1);
        assert_eq!(value["state"]["videos"][0]["url"], "https://cdn.example/b.m3u8");
        assert!(value["state"]["videos"][0]["createdAt"].is_i64());
    }

    #[test]
    fn reload_from_file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let added = {
            let mut registry = VideoRegistry::load(FileStore::new(dir.path()));
            registry.add("https://cdn.example/a.m3u8")
        };

        let registry = VideoRegistry::load(FileStore::new(dir.path()));
        assert_eq!(registry.videos(), &[added]);
    }

    #[test]
    fn version_one_records_get_backfilled_timestamps() {
        let raw = r#"{
            "state": { "videos": [
                { "id": "one", "url": "https://cdn.example/1.m3u8" },
                { "id": "two", "url": "https://cdn.example/2.m3u8" }
            ]},
            "version": 1
        }"#;
        let registry = VideoRegistry::load_at(MemoryStore::with_entry(STORE_KEY, raw), 1_700_000_000_000);

        let videos = registry.videos();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id, "one");
        assert_eq!(videos[0].url, "https://cdn.example/1.m3u8");
        assert_eq!(videos[1].id, "two");
        assert_eq!(videos[1].url, "https://cdn.example/2.m3u8");
        assert!(videos.iter().all(|v| v.created_at == 1_700_000_000_000));
    }

    #[test]
    fn unversioned_document_is_treated_as_version_one() {
        let raw = r#"{ "state": { "videos": [ { "id": "x", "url": "u" } ] } }"#;
        let registry = VideoRegistry::load_at(MemoryStore::with_entry(STORE_KEY, raw), 42);
        assert_eq!(registry.videos()[0].created_at, 42);
    }

    #[test]
    fn current_version_keeps_stored_timestamps() {
        let raw = r#"{ "state": { "videos": [ { "id": "x", "url": "u", "createdAt": 7 } ] }, "version": 2 }"#;
        let registry = VideoRegistry::load_at(MemoryStore::with_entry(STORE_KEY, raw), 42);
        assert_eq!(registry.videos()[0].created_at, 7);
    }

    #[test]
    fn corrupt_or_future_documents_reset_to_empty() {
        let corrupt = VideoRegistry::load(MemoryStore::with_entry(STORE_KEY, "{ nope"));
        assert!(corrupt.is_empty());

        let future = r#"{ "state": { "videos": [] }, "version": 9 }"#;
        let future = VideoRegistry::load(MemoryStore::with_entry(STORE_KEY, future));
        assert!(future.is_empty());

        let wrong_shape = r#"{ "state": { "videos": [ { "id": 1 } ] }, "version": 2 }"#;
        let wrong_shape = VideoRegistry::load(MemoryStore::with_entry(STORE_KEY, wrong_shape));
        assert!(wrong_shape.is_empty());
    }

    #[test]
    fn decode_reports_unsupported_version() {
        let err = decode_state(r#"{ "state": {}, "version": 3 }"#, 0).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { found: 3, supported: 2 }));
    }
}
