//! Synthetic progress while a recognition call is outstanding.
//!
//! The numbers are an estimate for user feedback only; they are not tied to
//! what the model is doing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Generation, SessionSnapshot, SessionState};
use crate::config::ProgressConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPolicy {
    pub start: u8,
    pub step: u8,
    pub cap: u8,
    pub interval: Duration,
}

impl ProgressPolicy {
    pub fn from_config(config: &ProgressConfig) -> Self {
        let cap = config.cap.min(100);
        Self {
            start: config.start.min(cap),
            step: config.step,
            cap,
            interval: config.interval(),
        }
    }

    /// Value after one more tick. Never decreases, never passes the cap.
    pub fn advance(&self, current: u8) -> u8 {
        current.saturating_add(self.step).min(self.cap).max(current)
    }

    /// Values shown from the first tick until the cap is reached.
    pub fn schedule(&self) -> Vec<u8> {
        let mut values = vec![self.start];
        let mut current = self.start;
        loop {
            let next = self.advance(current);
            if next == current {
                break;
            }
            values.push(next);
            current = next;
        }
        values
    }
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self::from_config(&ProgressConfig::default())
    }
}

/// Tick progress for `generation` until it reaches the cap or the session
/// moves on. The caller aborts the task once recognition resolves.
pub(crate) fn spawn_ticker(
    state: Arc<watch::Sender<SessionSnapshot>>,
    generation: Generation,
    policy: ProgressPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(policy.interval).await;

            let mut finished = false;
            state.send_if_modified(|snapshot| {
                if snapshot.generation != generation
                    || snapshot.state != SessionState::Processing
                {
                    finished = true;
                    return false;
                }

                let next = policy.advance(snapshot.progress);
                finished = next >= policy.cap;
                if next == snapshot.progress {
                    return false;
                }
                snapshot.progress = next;
                true
            });

            if finished {
                break;
            }
        }
    })
}
