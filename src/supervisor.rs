use anyhow::{anyhow, Result};
use colored::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    Backoff,
    Stopped,
}

/// Restarts the capture loop after failures. Only a clean return or a shutdown
/// request stops it.
pub struct Supervisor {
    backoff: Duration,
    shutdown: Shutdown,
    state: SupervisorState,
    restarts: u32,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Supervisor {
    pub fn new(backoff: Duration, shutdown: Shutdown) -> Self {
        Self {
            backoff,
            shutdown,
            state: SupervisorState::Running,
            restarts: 0,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Calls `session` until it returns `Ok` or shutdown is requested. Each call
    /// builds its own resources, so whatever it opened is dropped before the backoff.
    pub fn run<F>(&mut self, mut session: F) -> SupervisorState
    where
        F: FnMut() -> Result<()>,
    {
        while !self.shutdown.is_triggered() {
            self.state = SupervisorState::Running;

            let outcome = panic::catch_unwind(AssertUnwindSafe(&mut session))
                .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(payload.as_ref()))));

            match outcome {
                Ok(()) => break,
                Err(e) => {
                    tracing::error!("Camera crashed: {:#}", e);
                    self.state = SupervisorState::Backoff;
                    self.wait_backoff();
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    self.restarts += 1;
                    println!("{}", format!("Restarting camera (attempt {})...", self.restarts).yellow());
                }
            }
        }
        self.state = SupervisorState::Stopped;
        self.state
    }

    fn wait_backoff(&self) {
        let step = Duration::from_millis(50);
        let mut waited = Duration::ZERO;
        while waited < self.backoff && !self.shutdown.is_triggered() {
            let nap = step.min(self.backoff - waited);
            thread::sleep(nap);
            waited += nap;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[test]
    fn test_restarts_after_error_and_panic() {
        let mut sup = Supervisor::new(Duration::from_millis(1), Shutdown::new());
        let mut calls = 0;
        let end = sup.run(|| {
            calls += 1;
            match calls {
                1 => bail!("device lost"),
                2 => panic!("driver blew up"),
                _ => Ok(()),
            }
        });
        assert_eq!(end, SupervisorState::Stopped);
        assert_eq!(calls, 3);
        assert_eq!(sup.restarts(), 2);
    }

    #[test]
    fn test_shutdown_during_failure_stops() {
        let shutdown = Shutdown::new();
        let mut sup = Supervisor::new(Duration::from_secs(30), shutdown.clone());
        let mut calls = 0;
        sup.run(|| {
            calls += 1;
            shutdown.trigger();
            bail!("gone")
        });
        assert_eq!(calls, 1);
        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert_eq!(sup.restarts(), 0);
    }

    #[test]
    fn test_already_stopped_never_runs() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut sup = Supervisor::new(Duration::ZERO, shutdown);
        let mut ran = false;
        sup.run(|| {
            ran = true;
            Ok(())
        });
        assert!(!ran);
    }
}
