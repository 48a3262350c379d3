use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide cooperative stop flag. Every loop checks it at the top of an iteration.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is set. Polls, so it works from any async context.
    pub async fn wait(self) {
        while !self.is_triggered() {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }
}
