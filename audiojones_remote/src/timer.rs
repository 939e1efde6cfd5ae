use std::future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// Re-armable one-shot timer meant to be polled from a `select!` loop.
/// At most one instance is ever pending: arming replaces it, firing clears it.
#[derive(Debug, Default)]
pub(crate) struct OneShot {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl OneShot {
    pub(crate) fn arm(&mut self, delay: Duration) {
        self.sleep = Some(Box::pin(tokio::time::sleep(delay)));
    }

    pub(crate) fn cancel(&mut self) {
        self.sleep = None;
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.sleep.is_some()
    }

    #[cfg(test)]
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|s| s.deadline())
    }

    /// Completes when the armed timer fires. Never completes while disarmed.
    /// Cancel safe.
    pub(crate) async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => future::pending().await,
        }
    }
}
