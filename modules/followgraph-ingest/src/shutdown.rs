use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

/// Watch for stop signals. The first one sets `cancelled` so the running pass
/// stops at its next boundary; the function returns `Ok(())` on the second,
/// at which point the caller should exit without waiting.
pub async fn watch_stop_signals<F, Fut>(cancelled: Arc<AtomicBool>, mut next_signal: F) -> io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    next_signal().await?;
    warn!("Stop requested, finishing the current unit of work (press Ctrl-C again to exit now)");
    cancelled.store(true, Ordering::Relaxed);

    next_signal().await?;
    warn!("Second stop request, exiting immediately");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn first_signal_cancels_and_second_returns() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let signals = Arc::new(Notify::new());

        let watcher = tokio::spawn({
            let cancelled = cancelled.clone();
            let signals = signals.clone();
            watch_stop_signals(cancelled, move || {
                let signals = signals.clone();
                async move {
                    signals.notified().await;
                    Ok(())
                }
            })
        });

        signals.notify_one();
        while !cancelled.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }
        assert!(!watcher.is_finished());

        signals.notify_one();
        watcher.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn listener_failure_is_reported_without_cancelling() {
        let cancelled = Arc::new(AtomicBool::new(false));

        let result = watch_stop_signals(cancelled.clone(), || async {
            Err(io::Error::new(io::ErrorKind::Other, "no signal handler"))
        })
        .await;

        assert!(result.is_err());
        assert!(!cancelled.load(Ordering::Relaxed));
    }
}
