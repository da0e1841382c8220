//! Cooperative shutdown signal shared by the Scheduler (C5) and the
//! Ingestion Pipeline (C6). Generalized from the teacher's
//! `exporter::shutdown`, which handled a single axum server's graceful
//! shutdown future; here the same signal is also consulted between
//! scheduler ticks and ingestion passes, with a bounded grace window for
//! in-flight work.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;

/// Waits for SIGINT/SIGTERM (Unix) or Ctrl+C (elsewhere).
pub async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("Failed to install SIGINT handler")?;
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("Received SIGINT signal"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")?;
        tracing::info!("Received Ctrl+C signal");
    }

    Ok(())
}

/// A cooperative cancellation flag: `signal()` is called once, from the
/// `shutdown_signal()` future; `is_cancelled()` is polled by the Scheduler
/// between ticks and by the Ingestion Pipeline between passes and inside
/// their worker pools.
#[derive(Clone)]
pub struct CancelToken {
    notify: Arc<Notify>,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            cancelled: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }

    /// Spawns a task that watches `shutdown_signal()` and cancels `self`
    /// when it fires.
    pub fn spawn_watcher(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                tracing::error!("Error setting up shutdown handler: {}", e);
                return;
            }
            token.cancel();
        });
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `fut` to completion unless a cancellation arrives first; once
/// cancelled, `fut` is given `grace` more time to finish before this
/// function gives up on it and returns `None`. `fut` itself is not aborted
/// when the grace window elapses (tasks can't be preempted); the caller
/// simply stops waiting on it.
pub async fn with_grace_window<F, T>(token: &CancelToken, grace: Duration, fut: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::pin!(fut);

    tokio::select! {
        output = &mut fut => Some(output),
        () = token.cancelled() => {
            tokio::select! {
                output = &mut fut => Some(output),
                () = tokio::time::sleep(grace) => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_signal_times_out_without_a_real_signal() {
        let result = timeout(StdDuration::from_millis(100), shutdown_signal()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let waiter = {
            let token = token.clone();
            tokio::spawn(async move {
                token.cancelled().await;
            })
        };

        token.cancel();
        timeout(StdDuration::from_millis(200), waiter)
            .await
            .expect("waiter should complete after cancel")
            .expect("task should not panic");

        assert!(token.is_cancelled());
    }
}
