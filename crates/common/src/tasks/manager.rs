use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How long tasks get to finish in-flight work after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// TaskManager keeps track of spawned tokio tasks so that they can be
/// cancelled together. Tasks receive a child cancellation token and are
/// expected to return once it fires, which gives queue and cache state a
/// chance to settle before the process exits.
pub struct TaskManager<T: Send> {
    handles: Vec<JoinHandle<T>>,
    cancellation_token: CancellationToken,
}

impl<T: Send + 'static> Default for TaskManager<T> {
    fn default() -> Self {
        Self {
            handles: vec![],
            cancellation_token: CancellationToken::new(),
        }
    }
}

impl<T: Send + 'static> TaskManager<T> {
    /// Spawn a new asynchronous task.
    ///
    /// The callback receives a child cancellation token so the task can be
    /// notified about shutdown.
    pub fn spawn<F, Fut>(&mut self, callback: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let handle = tokio::spawn(callback(self.child_token()));
        self.handles.push(handle);
    }

    /// Notify all running tasks to stop and wait for them to finish, up to
    /// the grace period per task.
    pub async fn abort(&mut self) {
        self.cancellation_token.cancel();

        for handle in self.handles.drain(..) {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Task did not finish within the shutdown grace period");
            }
        }
    }

    /// Provides a child cancellation token.
    pub fn child_token(&self) -> CancellationToken {
        self.cancellation_token.child_token()
    }

    /// Wait for a termination signal and cancel all running tasks.
    pub async fn wait_shutdown(&mut self) {
        let mut term_signal =
            signal(SignalKind::terminate()).expect("Failed to create termination signal");
        let mut interrupt_signal =
            signal(SignalKind::interrupt()).expect("Failed to create interrupt signal");

        tokio::select! {
            _ = signal::ctrl_c() => {
                self.abort().await;
            }
            _ = term_signal.recv() => {
                self.abort().await;
            },
            _ = interrupt_signal.recv() => {
                self.abort().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn abort_cancels_and_waits_for_spawned_tasks() {
        let mut manager = TaskManager::<u32>::default();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        manager.spawn(|cancellation_token| async move {
            started_tx.send(()).unwrap();
            cancellation_token.cancelled().await;
            7
        });

        started_rx.await.unwrap();
        manager.abort().await;
        assert!(manager.handles.is_empty());
    }
}
