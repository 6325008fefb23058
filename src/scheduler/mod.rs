pub mod broadcast;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{ensure, Result};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs background jobs on fixed intervals until shut down.
pub struct Scheduler {
    shutdown: CancellationToken,
    jobs: Vec<(String, JoinHandle<()>)>,
}

impl Scheduler {
    /// Create a scheduler whose jobs stop when `shutdown` is cancelled
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            jobs: Vec::new(),
        }
    }

    /// Spawn `task` every `period`, starting immediately.
    ///
    /// A run that overruns the period delays the next one rather than
    /// triggering a burst of catch-up runs.
    pub fn add_interval_job<F>(&mut self, period: Duration, name: &str, task: F) -> Result<()>
    where
        F: Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static,
    {
        ensure!(!period.is_zero(), "Job '{}' needs a non-zero period", name);

        let job_name = name.to_string();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                debug!("Running scheduled task: {}", job_name);
                task().await;
            }

            info!("Scheduled task '{}' stopped", job_name);
        });

        info!("Scheduled task '{}' every {:?}", name, period);
        self.jobs.push((name.to_string(), handle));
        Ok(())
    }

    /// Cancel every job and wait for them to finish
    pub async fn shutdown(self) {
        self.shutdown.cancel();

        let (names, handles): (Vec<_>, Vec<_>) = self.jobs.into_iter().unzip();
        let results = futures::future::join_all(handles).await;
        for (name, result) in names.iter().zip(results) {
            if let Err(e) = result {
                error!("Scheduled task '{}' ended abnormally: {}", name, e);
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_interval_job_runs_until_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(CancellationToken::new());

        let counter = runs.clone();
        scheduler
            .add_interval_job(Duration::from_secs(10), "count", move || {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .unwrap();

        // Ticks at 0s, 10s and 20s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        scheduler.shutdown().await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let mut scheduler = Scheduler::new(CancellationToken::new());
        let result = scheduler.add_interval_job(Duration::ZERO, "bad", || Box::pin(async {}));
        assert!(result.is_err());
    }
}
