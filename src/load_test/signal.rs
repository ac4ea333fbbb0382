use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Cooperative stop signal shared by every worker of a run.
///
/// A signal is done once its token has been cancelled or its deadline (if any) has
/// passed. Both transitions are one-way: a done signal never becomes active again.
/// Clones observe the same token, so cancelling any clone stops the whole run.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A fresh signal that stays active until [`CancelSignal::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal nobody holds a handle to cancel. Used when the caller supplies none.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Adds a deadline. An earlier deadline already on the signal wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the signal is done.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

impl From<CancellationToken> for CancelSignal {
    fn from(token: CancellationToken) -> Self {
        Self::from_token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn never_is_active() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        assert!(signal.deadline().is_none());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let signal = CancelSignal::new();
        let observer = signal.clone();
        signal.cancel();
        assert!(observer.is_cancelled());
        // Monotonic: cancelling twice changes nothing.
        signal.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn token_cancellation_propagates() {
        let token = CancellationToken::new();
        let signal = CancelSignal::from(token.clone());
        assert!(!signal.is_cancelled());
        token.cancel();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_expires() {
        time::pause();

        let signal = CancelSignal::new().with_timeout(Duration::from_secs(5));
        assert!(!signal.is_cancelled());

        let mut waiter = task::spawn(signal.cancelled());
        assert_pending!(waiter.poll());

        time::advance(Duration::from_secs(6)).await;
        assert!(signal.is_cancelled());
        assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn earlier_deadline_wins() {
        time::pause();

        let now = Instant::now();
        let signal = CancelSignal::new()
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(signal.deadline(), Some(now + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn cancelled_resolves_on_explicit_cancel() {
        let signal = CancelSignal::new().with_timeout(Duration::from_secs(3600));
        let mut waiter = task::spawn(signal.cancelled());
        assert_pending!(waiter.poll());

        signal.cancel();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }
}
