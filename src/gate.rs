use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

/// Single-slot in-flight token for capture sequences.
///
/// Backed by a bounded channel of capacity 1: acquiring is a `try_send`, so a
/// busy slot fails immediately instead of waiting.
pub struct CaptureGate {
    slot: SyncSender<()>,
    drain: Mutex<Receiver<()>>,
}

/// Holding this means a capture sequence is in flight. Dropping it frees the slot.
pub struct CapturePermit<'a> {
    gate: &'a CaptureGate,
}

impl CaptureGate {
    pub fn new() -> Self {
        let (slot, drain) = mpsc::sync_channel(1);
        Self {
            slot,
            drain: Mutex::new(drain),
        }
    }

    pub fn try_acquire(&self) -> Option<CapturePermit<'_>> {
        match self.slot.try_send(()) {
            Ok(()) => Some(CapturePermit { gate: self }),
            Err(TrySendError::Full(())) => None,
            // Receiver lives as long as the gate
            Err(TrySendError::Disconnected(())) => None,
        }
    }

    fn release(&self) {
        let drain = self.drain.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = drain.try_recv();
    }
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CapturePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let gate = CaptureGate::new();
        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert!(gate.try_acquire().is_none());

        drop(permit);
        assert!(gate.try_acquire().is_some());
        // The temporary permit above was dropped too
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_released_on_unwind() {
        let gate = CaptureGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _permit = gate.try_acquire().unwrap();
            panic!("sequence blew up");
        }));
        assert!(result.is_err());
        assert!(gate.try_acquire().is_some());
    }
}
