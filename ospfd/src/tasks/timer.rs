use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};

/// Interval timer on a tokio task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct Timer {
    _tx: UnboundedSender<()>,
}

impl Timer {
    pub fn new<F, Fut>(duration: Duration, mut cb: F) -> Timer
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(duration);
            _ = interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        (cb)().await;
                    }
                    message = rx.recv() => {
                        if message.is_none() {
                            break;
                        }
                    }
                }
            }
        });

        Timer { _tx: tx }
    }

    pub fn repeat<F, Fut>(sec: u64, cb: F) -> Timer
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        Self::new(Duration::from_secs(sec), cb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn timer_repeat_and_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let timer = Timer::new(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(count.load(Ordering::SeqCst) >= 2);

        drop(timer);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stopped = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), stopped);
    }
}
