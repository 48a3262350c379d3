use std::sync::{Arc, Mutex, MutexGuard};

use crate::capture::CaptureMode;
use crate::filters::Filter;

/// Mode and filter currently selected for the next capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub mode: CaptureMode,
    pub filter: Filter,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Single,
            filter: Filter::StrangerTheme,
        }
    }
}

/// Cloneable handle over the one lock guarding [`SessionState`].
/// The lock is only held for a single read or write.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // State is two Copy fields; a panicked writer cannot leave it half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SessionState {
        *self.lock()
    }

    pub fn set_mode(&self, mode: CaptureMode) {
        self.lock().mode = mode;
    }

    pub fn set_filter(&self, filter: Filter) {
        self.lock().filter = filter;
    }
}
