use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{PhotoRecord, RecordId, RemoteStore, StoreError};

#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub id: i64,
    pub filename: String,
    pub url: String,
    /// Insertion sequence, standing in for the creation timestamp.
    pub created_at: u64,
}

#[derive(Debug, Default)]
struct MemoryInner {
    objects: BTreeMap<String, Vec<u8>>,
    records: Vec<MemoryRecord>,
    next_id: i64,
    clock: u64,
    unreachable: bool,
}

/// In-process store. Clones share contents, so a caller can keep a handle
/// while a worker owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// While set, every call fails with [`StoreError::Unreachable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(name).cloned()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn records(&self) -> Vec<MemoryRecord> {
        self.lock().records.clone()
    }

    fn online(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        let inner = self.lock();
        if inner.unreachable {
            Err(StoreError::Unreachable)
        } else {
            Ok(inner)
        }
    }
}

impl RemoteStore for MemoryStore {
    fn put_object(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), StoreError> {
        self.online()?.objects.insert(name.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("memory://photos/{}", name)
    }

    fn insert_record(&self, filename: &str, url: &str) -> Result<(), StoreError> {
        let mut inner = self.online()?;
        inner.next_id += 1;
        inner.clock += 1;
        let record = MemoryRecord {
            id: inner.next_id,
            filename: filename.to_string(),
            url: url.to_string(),
            created_at: inner.clock,
        };
        inner.records.push(record);
        Ok(())
    }

    fn count_records(&self) -> Result<u64, StoreError> {
        Ok(self.online()?.records.len() as u64)
    }

    fn oldest_records(&self, limit: u64) -> Result<Vec<PhotoRecord>, StoreError> {
        let inner = self.online()?;
        let mut sorted: Vec<&MemoryRecord> = inner.records.iter().collect();
        sorted.sort_by_key(|r| r.created_at);
        Ok(sorted
            .into_iter()
            .take(limit as usize)
            .map(|r| PhotoRecord {
                id: RecordId::Int(r.id),
                filename: r.filename.clone(),
            })
            .collect())
    }

    fn remove_objects(&self, names: &[String]) -> Result<(), StoreError> {
        let mut inner = self.online()?;
        for name in names {
            inner.objects.remove(name);
        }
        Ok(())
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), StoreError> {
        let mut inner = self.online()?;
        inner.records.retain(|r| &RecordId::Int(r.id) != id);
        Ok(())
    }
}
