use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::pool::WorkerPool;
use crate::scheduler::context::SchedulerContext;

/// Tracks how long the node has been continuously idle.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    threshold: usize,
    grace: Duration,
    low_since: Option<Instant>,
}

impl IdleTracker {
    pub fn new(threshold: usize, grace: Duration) -> Self {
        Self {
            threshold,
            grace,
            low_since: None,
        }
    }

    /// Feed one observation of the task counter. Returns true when a worker
    /// should be torn down, at most once per `grace` of sustained idleness.
    pub fn observe(&mut self, running_tasks: usize, now: Instant) -> bool {
        if running_tasks > self.threshold {
            self.low_since = None;
            return false;
        }
        match self.low_since {
            None => {
                self.low_since = Some(now);
                false
            }
            Some(since) if now.duration_since(since) >= self.grace => {
                self.low_since = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

/// Background loop that shrinks the pool after sustained idleness.
pub struct LoadMonitor {
    context: Arc<SchedulerContext>,
    pool: Arc<WorkerPool>,
    tick: Duration,
    tracker: IdleTracker,
}

impl LoadMonitor {
    pub fn new(context: Arc<SchedulerContext>, pool: Arc<WorkerPool>, config: &MonitorConfig) -> Self {
        Self {
            context,
            pool,
            tick: config.tick,
            tracker: IdleTracker::new(config.idle_threshold, config.idle_grace),
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Load monitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    let running = self.context.running_tasks();
                    if self.tracker.observe(running, Instant::now()) && !self.pool.is_empty() {
                        tracing::info!(running, workers = self.pool.len(), "Sustained idle load, removing one worker");
                        self.pool.kill_one_worker().await;
                    }
                }
            }
        }
    }
}
