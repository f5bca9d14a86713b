//! Collection scheduling
//!
//! Fires a job on a fixed interval after a startup delay. At most one
//! invocation is in flight at a time: a tick that lands while the previous
//! run is still executing is skipped, never queued.

use log::{error, info, warn};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct Scheduler {
    interval: Duration,
    startup_delay: Duration,
    in_flight: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(interval: Duration, startup_delay: Duration) -> Self {
        Self {
            interval,
            startup_delay,
            in_flight: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Spawn the timer task. `job` runs once per tick unless the previous
    /// invocation has not finished yet.
    pub fn start<F, Fut>(&mut self, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let interval = self.interval;
        let startup_delay = self.startup_delay;
        let in_flight = self.in_flight.clone();
        let job = Arc::new(job);

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(startup_delay).await;

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if in_flight.swap(true, Ordering::AcqRel) {
                    warn!("Previous run still in flight, skipping tick");
                    continue;
                }

                // Run in its own task so ticks keep firing while it executes.
                let job = job.clone();
                let in_flight = in_flight.clone();
                tokio::spawn(async move {
                    if let Err(e) = job().await {
                        error!("Scheduled run failed: {:#}", e);
                    }
                    in_flight.store(false, Ordering::Release);
                });
            }
        }));

        info!(
            "Scheduler started: interval {:?}, startup delay {:?}",
            interval, startup_delay
        );
    }

    /// Stop ticking. An in-flight run is not cancelled.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Counts invocations and tracks how many run concurrently.
    #[derive(Default)]
    struct Probe {
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl Probe {
        fn enter(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn start_with_job_duration(
        scheduler: &mut Scheduler,
        probe: Arc<Probe>,
        job_duration: Duration,
    ) {
        scheduler.start(move || {
            let probe = probe.clone();
            async move {
                probe.enter();
                tokio::time::sleep(job_duration).await;
                probe.exit();
                Ok(())
            }
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_delay_is_honored() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = Scheduler::new(Duration::from_secs(10), Duration::from_secs(60));
        start_with_job_duration(&mut scheduler, probe.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_run_skips_ticks() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = Scheduler::new(Duration::from_secs(10), Duration::ZERO);
        // Each run spans 2.5 intervals, so every other tick or two is skipped.
        start_with_job_duration(&mut scheduler, probe.clone(), Duration::from_secs(25));

        tokio::time::sleep(Duration::from_secs(95)).await;

        // Runs start at t=0, 30, 60, 90; ticks at 10, 20, 40, ... are skipped.
        assert_eq!(probe.runs.load(Ordering::SeqCst), 4);
        assert_eq!(probe.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_runs_fire_every_tick() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = Scheduler::new(Duration::from_secs(10), Duration::ZERO);
        start_with_job_duration(&mut scheduler, probe.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(45)).await;

        // Runs at t=0, 10, 20, 30, 40.
        assert_eq!(probe.runs.load(Ordering::SeqCst), 5);
        assert_eq!(probe.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_runs_do_not_stop_ticks() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(Duration::from_secs(10), Duration::ZERO);
        {
            let runs = runs.clone();
            scheduler.start(move || {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("boom"))
                }
            });
        }

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticking() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = Scheduler::new(Duration::from_secs(10), Duration::ZERO);
        start_with_job_duration(&mut scheduler, probe.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(15)).await;
        scheduler.stop();
        let runs_at_stop = probe.runs.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(probe.runs.load(Ordering::SeqCst), runs_at_stop);
    }
}
