mod common;

use anyhow::{bail, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::*;
use magic_booth::booth::Tick;
use magic_booth::config::BoothConfig;
use magic_booth::delivery::print::{PrintOutcome, PrintWorker, Printer};
use magic_booth::delivery::spill::RetrySpill;
use magic_booth::delivery::store::MemoryStore;
use magic_booth::delivery::upload::UploadWorker;
use magic_booth::delivery::{self, DeliveryJob};
use magic_booth::shutdown::Shutdown;

const POLL: Duration = Duration::from_millis(20);

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[derive(Clone, Default)]
struct PaperTray {
    printed: Arc<Mutex<Vec<PathBuf>>>,
    jammed: bool,
}

impl Printer for PaperTray {
    fn print(&self, path: &Path) -> Result<PrintOutcome> {
        self.printed.lock().unwrap().push(path.to_path_buf());
        if self.jammed {
            bail!("paper jam");
        }
        Ok(PrintOutcome::Sent)
    }
}

#[test]
fn failed_upload_is_spilled_then_retried_once_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("magic_100.jpg");
    write_jpeg(&photo);
    let original = fs::read(&photo).unwrap();

    let store = MemoryStore::new();
    let spill = RetrySpill::open(dir.path().join("retry_queue")).unwrap();

    // Offline: the file lands in the spill, byte for byte
    store.set_unreachable(true);
    let worker = UploadWorker::new(Box::new(store.clone()), spill.clone(), 600, POLL);
    worker.handle(&DeliveryJob::new(&photo));
    let spilled = spill.dir().join("magic_100.jpg");
    assert_eq!(fs::read(&spilled).unwrap(), original);
    assert!(photo.exists());

    // Next startup, online: delivered and removed
    store.set_unreachable(false);
    let worker = UploadWorker::new(Box::new(store.clone()), spill.clone(), 600, POLL);
    assert_eq!(worker.drain_spill(), 1);
    assert!(!spilled.exists());
    assert_eq!(store.object("magic_100.jpg").unwrap(), original);
    assert_eq!(store.records().len(), 1);

    // Nothing left to retry
    assert_eq!(worker.drain_spill(), 0);
    assert_eq!(store.records().len(), 1);
}

#[test]
fn spill_left_in_place_when_still_offline() {
    let dir = tempfile::tempdir().unwrap();
    let spill = RetrySpill::open(dir.path()).unwrap();
    write_jpeg(&dir.path().join("magic_1.jpg"));

    let store = MemoryStore::new();
    store.set_unreachable(true);
    let worker = UploadWorker::new(Box::new(store), spill.clone(), 600, POLL);

    assert_eq!(worker.drain_spill(), 0);
    assert_eq!(spill.pending().unwrap().len(), 1);
}

#[test]
fn upload_worker_thread_uploads_and_enforces_cap() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let spill = RetrySpill::open(dir.path().join("retry_queue")).unwrap();
    let shutdown = Shutdown::new();
    let (dispatcher, queues) = delivery::queues();

    let handle = UploadWorker::new(Box::new(store.clone()), spill, 2, POLL)
        .spawn(queues.upload, shutdown.clone())
        .unwrap();

    for i in 0..3 {
        let photo = dir.path().join(format!("magic_{}.jpg", i));
        write_jpeg(&photo);
        dispatcher.dispatch(&photo).unwrap();
        // Each upload finishes before the next, so creation order is stable
        assert!(wait_until(|| store.object_names().contains(&format!("magic_{}.jpg", i))));
    }
    assert!(wait_until(|| store.records().len() == 2));

    let names: Vec<_> = store.records().into_iter().map(|r| r.filename).collect();
    assert_eq!(names, ["magic_1.jpg", "magic_2.jpg"]);
    assert_eq!(store.object_names(), ["magic_1.jpg", "magic_2.jpg"]);

    shutdown.trigger();
    handle.join().unwrap();
}

#[test]
fn print_failures_are_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("magic_3.jpg");
    write_jpeg(&photo);

    let tray = PaperTray {
        jammed: true,
        ..PaperTray::default()
    };
    let worker = PrintWorker::new(Box::new(tray.clone()), POLL);
    assert_eq!(worker.handle(&DeliveryJob::new(&photo)), None);
    assert_eq!(tray.printed.lock().unwrap().len(), 1);

    // Missing files never reach the printer
    assert_eq!(worker.handle(&DeliveryJob::new(dir.path().join("gone.jpg"))), None);
    assert_eq!(tray.printed.lock().unwrap().len(), 1);
}

#[test]
fn capture_reaches_store_and_printer() {
    let dir = tempfile::tempdir().unwrap();
    let Rig { mut booth, ctx, queues, .. } = rig(&dir.path().join("storage"), BoothConfig::default());

    let store = MemoryStore::new();
    let tray = PaperTray::default();
    let spill = RetrySpill::open(ctx.storage.retry_dir()).unwrap();
    let uploader = UploadWorker::new(Box::new(store.clone()), spill, 600, POLL)
        .spawn(queues.upload, ctx.shutdown.clone())
        .unwrap();
    let printer = PrintWorker::new(Box::new(tray.clone()), POLL)
        .spawn(queues.print, ctx.shutdown.clone())
        .unwrap();

    let path = match booth.tick().unwrap() {
        Tick::Captured(path) => path,
        other => panic!("expected capture, got {:?}", other),
    };
    let name = path.file_name().unwrap().to_str().unwrap().to_string();

    assert!(wait_until(|| store.object(&name).is_some()));
    assert!(wait_until(|| tray.printed.lock().unwrap().as_slice() == [path.clone()]));
    assert_eq!(store.records()[0].url, format!("memory://photos/{}", name));

    ctx.shutdown.trigger();
    uploader.join().unwrap();
    printer.join().unwrap();
}
