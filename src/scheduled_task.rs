use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use rocket::tokio::{
    self,
    sync::Notify,
    task::{JoinError, JoinHandle},
    time::Duration,
};

/// A task scheduled for a specific point in the future.
/// It runs by itself at that point, or can be cancelled or triggered early.
pub struct ScheduledTask<T> {
    handle: JoinHandle<T>,
    trigger: Arc<Notify>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Schedule `task` to run at `run_at`.
    /// A `run_at` in the past runs it straight away.
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let trigger = Arc::new(Notify::new());
        let early = trigger.clone();
        let delay = until(run_at);
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = early.notified() => {}
            }
            task.await
        });

        Self { handle, trigger }
    }

    /// Cancel the task. Returns true iff it had already completed before we could cancel it.
    pub async fn cancel(self) -> bool {
        self.handle.abort();
        self.handle.await.is_ok()
    }

    /// Run the task now instead of waiting for its scheduled time.
    pub fn trigger_now(&self) {
        // `notify_one` stores a permit, so this works even before the task first polls.
        self.trigger.notify_one();
    }
}

/// Awaiting a `ScheduledTask` waits for it to run and yields its output.
impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

/// Time from now until `datetime`, or zero if it has passed.
fn until(datetime: DateTime<Utc>) -> Duration {
    (datetime - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
