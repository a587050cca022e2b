use std::future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{self, Instant, Sleep};

/// Restartable single-shot liveness timer.
pub struct Watchdog {
    timeout: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Start the timer, or push the deadline out if already running.
    pub fn arm(&mut self) {
        let deadline = Instant::now() + self.timeout;
        match &mut self.sleep {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(time::sleep_until(deadline))),
        }
    }

    pub fn disarm(&mut self) {
        self.sleep = None;
    }

    /// Resolves when the armed deadline passes; pending forever while disarmed.
    ///
    /// Callers must `disarm` after expiry, a fired `Sleep` stays ready.
    pub async fn expired(&mut self) {
        match &mut self.sleep {
            Some(sleep) => sleep.as_mut().await,
            None => future::pending().await,
        }
    }
}
