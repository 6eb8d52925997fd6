//! The re-armable transfer timer.
//!
//! A node has exactly one timer: the delay until its next random transfer.
//! The runner owns the deadline and awaits it as one branch of its select
//! loop, so firing needs no task and no channel.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};
use tracing::trace;

/// Deadline of the next random transfer, if one is armed.
#[derive(Debug, Default)]
pub struct TransferTimer {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl TransferTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire after `delay`, replacing any pending deadline.
    pub fn arm(&mut self, delay: Duration) {
        let deadline = Instant::now() + delay;
        match self.deadline.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.deadline = Some(Box::pin(sleep_until(deadline))),
        }
        trace!(?delay, "Transfer timer armed");
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Complete when the armed deadline passes, leaving the timer disarmed.
    ///
    /// Never completes while disarmed. Dropping the future early keeps the
    /// deadline armed, so it is safe to use in `select!`.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => pending().await,
        }
    }
}
