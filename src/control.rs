use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

use crate::capture::CaptureMode;
use crate::delivery::DeliveryJob;
use crate::filters::Filter;
use crate::session::SessionHandle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Invalid filter")]
    InvalidFilter,

    #[error("Invalid mode")]
    InvalidMode,

    #[error("Event Mode locked settings")]
    Locked,

    #[error("Missing imageUrl")]
    MissingImageUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub mode: String,
    pub filter: String,
    pub event_mode: bool,
}

/// What the HTTP layer may do to a running booth.
#[derive(Clone)]
pub struct ControlPlane {
    session: SessionHandle,
    settings_locked: bool,
    print_queue: Sender<DeliveryJob>,
    temp_dir: PathBuf,
    http: reqwest::Client,
}

/// Local name for a downloaded print: the last URL path segment without its
/// query, or a timestamped name when there is none.
pub fn print_file_name(url: &str) -> String {
    let tail = url.rsplit('/').next().unwrap_or("");
    let name = tail.split(['?', '#']).next().unwrap_or("");
    if name.is_empty() || name == "." || name == ".." {
        format!("print_{}.jpg", chrono::Local::now().timestamp())
    } else {
        name.to_string()
    }
}

impl ControlPlane {
    pub fn new(
        session: SessionHandle,
        settings_locked: bool,
        print_queue: Sender<DeliveryJob>,
        temp_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            session,
            settings_locked,
            print_queue,
            temp_dir: temp_dir.into(),
            http,
        })
    }

    pub fn health(&self) -> Health {
        let state = self.session.snapshot();
        Health {
            status: "ok",
            mode: state.mode.to_string(),
            filter: state.filter.to_string(),
            event_mode: self.settings_locked,
        }
    }

    /// The name is validated before the lock is consulted, so a locked booth
    /// still reports unknown names as invalid.
    pub fn set_filter(&self, name: &str) -> Result<Filter, ControlError> {
        let filter: Filter = name.parse().map_err(|_| ControlError::InvalidFilter)?;
        if self.settings_locked {
            return Err(ControlError::Locked);
        }
        self.session.set_filter(filter);
        tracing::info!("Filter set to {}", filter);
        Ok(filter)
    }

    pub fn set_mode(&self, name: &str) -> Result<CaptureMode, ControlError> {
        let mode: CaptureMode = name.parse().map_err(|_| ControlError::InvalidMode)?;
        if self.settings_locked {
            return Err(ControlError::Locked);
        }
        self.session.set_mode(mode);
        tracing::info!("Mode set to {}", mode);
        Ok(mode)
    }

    /// Accepts the request right away and downloads in the background. Must be
    /// called from inside a tokio runtime.
    pub fn request_print(&self, image_url: Option<&str>) -> Result<(), ControlError> {
        let url = match image_url.map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => return Err(ControlError::MissingImageUrl),
        };

        let plane = self.clone();
        tokio::spawn(async move {
            if let Err(e) = plane.fetch_and_enqueue(&url).await {
                tracing::warn!("Fetch failed for {}: {:#}", url, e);
            }
        });
        Ok(())
    }

    /// Downloads `url` into the temp folder and queues it for printing.
    pub async fn fetch_and_enqueue(&self, url: &str) -> Result<PathBuf> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let path = self.temp_dir.join(print_file_name(url));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.print_queue
            .send(DeliveryJob::new(&path))
            .context("Print queue closed")?;
        tracing::info!("Queued remote print {}", path.display());
        Ok(path)
    }
}
