use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Single-shot inactivity deadline owned by a segmenter.
///
/// Arming replaces any previous deadline, so at most one expiry is ever
/// pending. The watchdog itself never spawns anything: the task hosting the
/// segmenter awaits [`expire_at`] on the current deadline, which ties the
/// timer's lifetime to that task.
#[derive(Debug, Clone)]
pub struct InactivityWatchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl InactivityWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// (Re)schedules expiry one timeout from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Resolves once `deadline` is reached; never resolves for `None`.
pub async fn expire_at(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;
    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test(start_paused = true)]
    async fn rearming_pushes_the_deadline_back() {
        let mut watchdog = InactivityWatchdog::new(Duration::from_secs(60));
        watchdog.arm();
        let first = watchdog.deadline().unwrap();

        advance(Duration::from_secs(10)).await;
        watchdog.arm();
        let second = watchdog.deadline().unwrap();

        assert_eq!(second - first, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_fires_at_the_deadline() {
        let mut watchdog = InactivityWatchdog::new(Duration::from_millis(500));
        watchdog.arm();

        let mut expiry = task::spawn(expire_at(watchdog.deadline()));
        assert_pending!(expiry.poll());

        advance(Duration::from_millis(499)).await;
        assert_pending!(expiry.poll());

        advance(Duration::from_millis(1)).await;
        assert_ready!(expiry.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_watchdog_never_fires() {
        let mut watchdog = InactivityWatchdog::new(Duration::from_millis(10));
        watchdog.arm();
        watchdog.disarm();
        assert!(!watchdog.is_armed());

        let mut expiry = task::spawn(expire_at(watchdog.deadline()));
        advance(Duration::from_secs(3600)).await;
        assert_pending!(expiry.poll());
    }
}
