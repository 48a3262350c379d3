//! Background delivery of saved artifacts: cloud upload with an on-disk retry
//! spill, and printing. Each worker owns its queue receiver and its own thread.

pub mod print;
pub mod spill;
pub mod store;
pub mod supabase;
pub mod upload;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

/// "This file is ready". Ownership moves to whichever worker receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryJob {
    pub file_path: PathBuf,
}

impl DeliveryJob {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

/// Sending half of both delivery queues.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    upload: Sender<DeliveryJob>,
    print: Sender<DeliveryJob>,
}

/// Receiving halves, handed to the workers.
pub struct Queues {
    pub upload: Receiver<DeliveryJob>,
    pub print: Receiver<DeliveryJob>,
}

pub fn queues() -> (Dispatcher, Queues) {
    let (upload_tx, upload_rx) = mpsc::channel();
    let (print_tx, print_rx) = mpsc::channel();
    (
        Dispatcher {
            upload: upload_tx,
            print: print_tx,
        },
        Queues {
            upload: upload_rx,
            print: print_rx,
        },
    )
}

impl Dispatcher {
    /// Enqueues the same job on both queues. Both sends are always attempted.
    pub fn dispatch(&self, path: &Path) -> Result<()> {
        let upload = self.upload.send(DeliveryJob::new(path));
        let print = self.print.send(DeliveryJob::new(path));
        match (upload, print) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(_), Ok(())) => Err(anyhow!("upload queue closed")),
            (Ok(()), Err(_)) => Err(anyhow!("print queue closed")),
            (Err(_), Err(_)) => Err(anyhow!("delivery queues closed")),
        }
    }

    /// Direct line to the printer, used for prints requested over HTTP.
    pub fn print_sender(&self) -> Sender<DeliveryJob> {
        self.print.clone()
    }
}
