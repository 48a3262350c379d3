use anyhow::{anyhow, Context, Result};
use colored::*;
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::DeliveryJob;
use crate::config::PrintConfig;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Sent,
    /// No print system on this machine; the job was only logged.
    Simulated,
}

pub trait Printer: Send {
    fn print(&self, path: &Path) -> Result<PrintOutcome>;
}

/// Placement `(x, y, width, height)` of an image scaled to fit the page with its
/// aspect ratio kept, centered.
pub fn fit_to_page(img_w: u32, img_h: u32, page_w: u32, page_h: u32) -> (u32, u32, u32, u32) {
    if img_w == 0 || img_h == 0 {
        return (page_w / 2, page_h / 2, 0, 0);
    }
    let ratio = (page_w as f64 / img_w as f64).min(page_h as f64 / img_h as f64);
    let w = ((img_w as f64 * ratio) as u32).min(page_w);
    let h = ((img_h as f64 * ratio) as u32).min(page_h);
    ((page_w - w) / 2, (page_h - h) / 2, w, h)
}

/// White page with the image fitted and centered on it.
pub fn compose_page(img: &RgbImage, page_w: u32, page_h: u32) -> RgbImage {
    let mut page = RgbImage::from_pixel(page_w, page_h, Rgb([255, 255, 255]));
    let (x, y, w, h) = fit_to_page(img.width(), img.height(), page_w, page_h);
    if w > 0 && h > 0 {
        let scaled = imageops::resize(img, w, h, FilterType::Lanczos3);
        imageops::replace(&mut page, &scaled, x as i64, y as i64);
    }
    page
}

/// Prints through the system spooler (`lp` by default).
pub struct SystemPrinter {
    config: PrintConfig,
    spool_dir: PathBuf,
}

impl SystemPrinter {
    pub fn new(config: PrintConfig, spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            spool_dir: spool_dir.into(),
        }
    }

    fn render(&self, path: &Path) -> Result<PathBuf> {
        // Animations print their first frame
        let img = image::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .to_rgb8();
        let page = compose_page(&img, self.config.page_width, self.config.page_height);

        std::fs::create_dir_all(&self.spool_dir)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("job");
        let out = self.spool_dir.join(format!("print_{}.jpg", name));
        page.save(&out).with_context(|| format!("Failed to write {}", out.display()))?;
        Ok(out)
    }
}

impl Printer for SystemPrinter {
    fn print(&self, path: &Path) -> Result<PrintOutcome> {
        let page = self.render(path)?;
        tracing::info!("Starting print job for {}", path.display());

        let status = Command::new(&self.config.command)
            .arg("-t")
            .arg(&self.config.job_title)
            .arg(&page)
            .status();

        let result = match status {
            Ok(s) if s.success() => Ok(PrintOutcome::Sent),
            Ok(s) => Err(anyhow!("{} exited with {}", self.config.command, s)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                println!("{}", format!("[Printer] Simulated printing: {}", path.display()).yellow());
                Ok(PrintOutcome::Simulated)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to run {}", self.config.command)),
        };

        let _ = std::fs::remove_file(&page);
        result
    }
}

pub struct PrintWorker {
    printer: Box<dyn Printer>,
    poll: Duration,
}

impl PrintWorker {
    pub fn new(printer: Box<dyn Printer>, poll: Duration) -> Self {
        Self { printer, poll }
    }

    /// Failures are logged and dropped; print jobs are never retried.
    pub fn handle(&self, job: &DeliveryJob) -> Option<PrintOutcome> {
        if !job.file_path.exists() {
            tracing::warn!("Print skipped, file is gone: {}", job.file_path.display());
            return None;
        }
        match self.printer.print(&job.file_path) {
            Ok(outcome) => {
                if outcome == PrintOutcome::Sent {
                    tracing::info!("Sent {} to printer", job.file_path.display());
                }
                Some(outcome)
            }
            Err(e) => {
                tracing::error!("Print failed: {:#}", e);
                None
            }
        }
    }

    pub fn run(self, jobs: Receiver<DeliveryJob>, shutdown: Shutdown) {
        while !shutdown.is_triggered() {
            match jobs.recv_timeout(self.poll) {
                Ok(job) => {
                    self.handle(&job);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("Print worker stopped");
    }

    pub fn spawn(self, jobs: Receiver<DeliveryJob>, shutdown: Shutdown) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("print".into())
            .spawn(move || self.run(jobs, shutdown))
            .context("Failed to spawn print worker")
    }
}
