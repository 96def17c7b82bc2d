// Error types shared by the feed library.
//
// Nothing here ever reaches a top-level handler: the registry logs storage
// failures, the playback controller swallows surface failures. The enums
// exist so those call sites can log something precise.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored document for key '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("could not serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("no stream is attached")]
    Detached,

    #[error("stream is not ready yet")]
    NotReady,

    #[error("no async runtime available to load the manifest")]
    NoRuntime,

    #[error("invalid stream url '{0}'")]
    InvalidUrl(String),

    #[error("manifest request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("manifest is not an HLS playlist")]
    NotHls,

    #[error("manifest lists no playable variants or segments")]
    Empty,
}
