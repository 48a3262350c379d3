use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// In-process store for tests; built with the `test-helpers` feature.
#[cfg(any(test, feature = "test-helpers"))]
mod memory;
#[cfg(any(test, feature = "test-helpers"))]
pub use memory::{MemoryRecord, MemoryStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Store unreachable")]
    Unreachable,

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

/// Row id as returned by the index table, which may be numeric or a uuid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{}", i),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: RecordId,
    pub filename: String,
}

/// Object bucket plus index table. Calls are blocking; workers own their store.
pub trait RemoteStore: Send {
    /// Uploads (or overwrites) an object keyed by file name.
    fn put_object(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError>;
    fn public_url(&self, name: &str) -> String;
    fn insert_record(&self, filename: &str, url: &str) -> Result<(), StoreError>;
    fn count_records(&self) -> Result<u64, StoreError>;
    /// Oldest `limit` records by creation time, oldest first.
    fn oldest_records(&self, limit: u64) -> Result<Vec<PhotoRecord>, StoreError>;
    fn remove_objects(&self, names: &[String]) -> Result<(), StoreError>;
    fn delete_record(&self, id: &RecordId) -> Result<(), StoreError>;
}

pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}
