use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::spill::RetrySpill;
use super::store::{content_type_for, RemoteStore, StoreError};
use super::DeliveryJob;
use crate::shutdown::Shutdown;

/// Deletes the oldest records beyond `max_records` from both the bucket and
/// the index. Returns how many were removed.
pub fn enforce_retention(store: &dyn RemoteStore, max_records: u64) -> Result<usize, StoreError> {
    let total = store.count_records()?;
    if total <= max_records {
        return Ok(0);
    }
    let excess = total - max_records;

    let oldest = store.oldest_records(excess)?;
    if oldest.is_empty() {
        return Ok(0);
    }

    let names: Vec<String> = oldest.iter().map(|r| r.filename.clone()).collect();
    store.remove_objects(&names)?;
    for record in &oldest {
        store.delete_record(&record.id)?;
    }

    tracing::info!("Cleaned {} old images", oldest.len());
    Ok(oldest.len())
}

pub struct UploadWorker {
    store: Box<dyn RemoteStore>,
    spill: RetrySpill,
    max_records: u64,
    poll: Duration,
}

impl UploadWorker {
    pub fn new(store: Box<dyn RemoteStore>, spill: RetrySpill, max_records: u64, poll: Duration) -> Self {
        Self {
            store,
            spill,
            max_records,
            poll,
        }
    }

    /// Bucket upload, then index insert, then retention. A retention failure is
    /// logged and does not fail the upload.
    pub fn upload(&self, path: &Path) -> Result<()> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("No file name in {}", path.display()))?;
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

        self.store.put_object(filename, bytes, content_type_for(path))?;
        let url = self.store.public_url(filename);
        self.store.insert_record(filename, &url)?;
        tracing::info!("Uploaded {}", filename);

        if let Err(e) = enforce_retention(self.store.as_ref(), self.max_records) {
            tracing::warn!("Cleanup error: {}", e);
        }
        Ok(())
    }

    /// Single pass over whatever the spill held at startup.
    pub fn drain_spill(&self) -> usize {
        match self.spill.drain(|path| self.upload(path)) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Retry queue error: {:#}", e);
                0
            }
        }
    }

    pub fn handle(&self, job: &DeliveryJob) {
        if !job.file_path.exists() {
            tracing::warn!("Upload skipped, file is gone: {}", job.file_path.display());
            return;
        }
        if let Err(e) = self.upload(&job.file_path) {
            tracing::warn!("Upload failed for {}: {:#}", job.file_path.display(), e);
            match self.spill.spill(&job.file_path) {
                Ok(dest) => tracing::info!("Moved {} to offline retry queue", dest.display()),
                Err(e) => tracing::error!("Failed to spill: {:#}", e),
            }
        }
    }

    pub fn run(self, jobs: Receiver<DeliveryJob>, shutdown: Shutdown) {
        let retried = self.drain_spill();
        if retried > 0 {
            tracing::info!("Uploaded {} files from the retry queue", retried);
        }

        while !shutdown.is_triggered() {
            match jobs.recv_timeout(self.poll) {
                Ok(job) => self.handle(&job),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("Upload worker stopped");
    }

    pub fn spawn(self, jobs: Receiver<DeliveryJob>, shutdown: Shutdown) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("upload".into())
            .spawn(move || self.run(jobs, shutdown))
            .context("Failed to spawn upload worker")
    }
}

/// Takes the upload worker's place when no remote store is configured. Jobs
/// are logged and dropped so the queue stays empty; files stay in the local backup.
pub fn discard_uploads(jobs: Receiver<DeliveryJob>, poll: Duration, shutdown: Shutdown) -> usize {
    let mut discarded = 0;
    while !shutdown.is_triggered() {
        match jobs.recv_timeout(poll) {
            Ok(job) => {
                tracing::info!("Cloud sync disabled, {} kept locally only", job.file_path.display());
                discarded += 1;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    discarded
}

pub fn spawn_discard(jobs: Receiver<DeliveryJob>, poll: Duration, shutdown: Shutdown) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("upload-off".into())
        .spawn(move || {
            let n = discard_uploads(jobs, poll, shutdown);
            tracing::debug!("Upload queue closed, {} jobs discarded", n);
        })
        .context("Failed to spawn upload discard worker")
}
