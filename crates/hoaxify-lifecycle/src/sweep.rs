//! Cancellable periodic sweeps.
//!
//! A [`Sweep`] is one pass over a store that removes whatever has gone
//! stale. [`spawn`] runs it on a fixed interval until the returned
//! [`SweepHandle`] is stopped. A failed pass is logged and the next one is
//! still scheduled; the loop itself never exits on error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::LifecycleError;

pub trait Sweep: Send + Sync + 'static {
    /// Short label used in log lines.
    fn name(&self) -> &'static str;

    /// Runs one pass and returns how many rows it reclaimed.
    fn sweep_once(&self) -> impl Future<Output = Result<usize, LifecycleError>> + Send;
}

/// Owns a running sweep loop.
///
/// Dropping the handle leaves the loop running detached; call
/// [`SweepHandle::stop`] for a deterministic shutdown.
pub struct SweepHandle {
    name: &'static str,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweepHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops scheduling new passes and waits for an in-flight pass to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(sweep = self.name, error = %e, "Sweep task ended abnormally");
        }
    }
}

/// Starts `sweep` on a tokio task. The first pass runs one `interval` after
/// the call, not immediately.
pub fn spawn<S: Sweep>(sweep: Arc<S>, interval: Duration) -> SweepHandle {
    let cancel = CancellationToken::new();
    let name = sweep.name();
    let task = tokio::spawn(run(sweep, interval, cancel.clone()));

    SweepHandle { name, cancel, task }
}

async fn run<S: Sweep>(sweep: Arc<S>, period: Duration, cancel: CancellationToken) {
    let name = sweep.name();
    info!(sweep = name, interval_secs = period.as_secs(), "Sweep started");

    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(sweep = name, "Sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep.sweep_once().await {
                    Ok(0) => debug!(sweep = name, "Sweep: nothing to reclaim"),
                    Ok(count) => info!(sweep = name, count, "Sweep: reclaimed rows"),
                    Err(e) => warn!(sweep = name, error = %e, "Sweep pass failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    struct Counting {
        passes: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                passes: AtomicUsize::new(0),
                fail,
            })
        }

        fn passes(&self) -> usize {
            self.passes.load(Ordering::SeqCst)
        }
    }

    impl Sweep for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn sweep_once(&self) -> Result<usize, LifecycleError> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow::anyhow!("disk on fire").into())
            } else {
                Ok(1)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_interval() {
        let sweep = Counting::new(false);
        let handle = spawn(sweep.clone(), HOUR);

        time::sleep(HOUR / 2).await;
        assert_eq!(sweep.passes(), 0, "first pass waits a full interval");

        time::sleep(HOUR * 3).await;
        assert_eq!(sweep.passes(), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pass_does_not_stop_the_loop() {
        let sweep = Counting::new(true);
        let handle = spawn(sweep.clone(), HOUR);

        time::sleep(HOUR * 2 + HOUR / 2).await;
        assert_eq!(sweep.passes(), 2);
        assert!(handle.is_running());

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_passes() {
        let sweep = Counting::new(false);
        let handle = spawn(sweep.clone(), HOUR);

        time::sleep(HOUR + HOUR / 2).await;
        assert_eq!(sweep.passes(), 1);

        handle.stop().await;
        time::sleep(HOUR * 5).await;
        assert_eq!(sweep.passes(), 1);
    }
}
