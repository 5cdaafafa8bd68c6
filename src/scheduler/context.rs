use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::error::{JudgeError, Result};
use crate::pool::WorkerProcess;

/// A registered, health-checked worker.
#[derive(Debug)]
pub struct WorkerRecord {
    pub addr: SocketAddr,
    /// Registration order; lower is older
    pub sequence: u64,
    pub process: WorkerProcess,
    consecutive_failures: u32,
}

impl WorkerRecord {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Address snapshot of a live worker, taken for delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTarget {
    pub addr: SocketAddr,
    pub sequence: u64,
}

/// Point-in-time view of the scheduler, as reported by `GET_INFO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    pub running_tasks: usize,
    pub max_tasks: usize,
    pub max_workers: usize,
    pub active_workers: usize,
    pub pending_workers: usize,
}

#[derive(Debug)]
struct SchedulerState {
    running_tasks: usize,
    /// Oldest first
    workers: Vec<WorkerRecord>,
    /// Ports held by spawns still waiting on their health check
    reserved_ports: Vec<u16>,
    next_sequence: u64,
    config: RuntimeConfig,
}

/// Shared scheduler state: the local task counter, the live worker list and
/// the runtime configuration, all behind one lock.
///
/// Critical sections never await, so nothing that sleeps or does I/O runs
/// while the lock is held.
#[derive(Debug)]
pub struct SchedulerContext {
    state: Mutex<SchedulerState>,
}

impl SchedulerContext {
    pub fn new(config: RuntimeConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SchedulerState {
                running_tasks: 0,
                workers: Vec::new(),
                reserved_ports: Vec::new(),
                next_sequence: 0,
                config,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a local execution slot if the counter is below the ceiling.
    pub fn try_acquire_slot(self: &Arc<Self>) -> Option<TaskSlot> {
        let mut state = self.lock();
        if state.running_tasks < state.config.max_tasks {
            state.running_tasks += 1;
            Some(TaskSlot::new(self.clone(), false))
        } else {
            None
        }
    }

    /// Take a local execution slot regardless of the ceiling.
    pub fn acquire_overload_slot(self: &Arc<Self>) -> TaskSlot {
        self.lock().running_tasks += 1;
        TaskSlot::new(self.clone(), true)
    }

    fn release_slot(&self) {
        let mut state = self.lock();
        state.running_tasks = state.running_tasks.saturating_sub(1);
    }

    pub fn running_tasks(&self) -> usize {
        self.lock().running_tasks
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.lock();
        SchedulerSnapshot {
            running_tasks: state.running_tasks,
            max_tasks: state.config.max_tasks,
            max_workers: state.config.max_workers,
            active_workers: state.workers.len(),
            pending_workers: state.reserved_ports.len(),
        }
    }

    pub fn admin_secret(&self) -> String {
        self.lock().config.admin_secret.clone()
    }

    pub fn set_max_tasks(&self, max_tasks: usize) -> Result<()> {
        if max_tasks < 1 {
            return Err(JudgeError::AdminValue(
                "MAX_TASKS must be >= 1".to_string(),
            ));
        }
        self.lock().config.max_tasks = max_tasks;
        Ok(())
    }

    pub fn set_max_workers(&self, max_workers: usize) {
        self.lock().config.max_workers = max_workers;
    }

    pub fn worker_count(&self) -> usize {
        self.lock().workers.len()
    }

    /// Live workers in delegation order, oldest first.
    pub fn worker_targets(&self) -> Vec<WorkerTarget> {
        self.lock()
            .workers
            .iter()
            .map(|w| WorkerTarget {
                addr: w.addr,
                sequence: w.sequence,
            })
            .collect()
    }

    /// Reserve the lowest port in `ports` not held by a live or pending
    /// worker, provided the pool (including pending spawns) is below its
    /// ceiling.
    pub fn reserve_worker_port(&self, ports: &[u16]) -> Option<u16> {
        let mut state = self.lock();
        if state.workers.len() + state.reserved_ports.len() >= state.config.max_workers {
            return None;
        }
        let port = ports.iter().copied().find(|port| {
            !state.reserved_ports.contains(port) && !state.workers.iter().any(|w| w.port() == *port)
        })?;
        state.reserved_ports.push(port);
        Some(port)
    }

    pub fn release_port(&self, port: u16) {
        self.lock().reserved_ports.retain(|p| *p != port);
    }

    /// Append a healthy worker to the live set, consuming its port
    /// reservation. Returns its registration sequence.
    pub fn register_worker(&self, addr: SocketAddr, process: WorkerProcess) -> u64 {
        let mut state = self.lock();
        state.reserved_ports.retain(|p| *p != addr.port());
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.workers.push(WorkerRecord {
            addr,
            sequence,
            process,
            consecutive_failures: 0,
        });
        sequence
    }

    /// Remove the most recently registered worker.
    pub fn pop_newest_worker(&self) -> Option<WorkerRecord> {
        self.lock().workers.pop()
    }

    /// Remove every worker, newest first.
    pub fn drain_workers(&self) -> Vec<WorkerRecord> {
        let mut workers = std::mem::take(&mut self.lock().workers);
        workers.reverse();
        workers
    }

    /// Record the result of a delegation attempt. A worker whose consecutive
    /// failures reach `prune_after` is removed and returned.
    pub fn record_delegation(
        &self,
        sequence: u64,
        succeeded: bool,
        prune_after: u32,
    ) -> Option<WorkerRecord> {
        let mut state = self.lock();
        let index = state.workers.iter().position(|w| w.sequence == sequence)?;
        let worker = &mut state.workers[index];
        if succeeded {
            worker.consecutive_failures = 0;
            return None;
        }
        worker.consecutive_failures += 1;
        if prune_after > 0 && worker.consecutive_failures >= prune_after {
            Some(state.workers.remove(index))
        } else {
            None
        }
    }
}

/// A held unit of the local task counter, released exactly once on drop.
#[derive(Debug)]
pub struct TaskSlot {
    context: Arc<SchedulerContext>,
    overload: bool,
}

impl TaskSlot {
    fn new(context: Arc<SchedulerContext>, overload: bool) -> Self {
        Self { context, overload }
    }

    /// True when the slot was taken past the concurrency ceiling.
    pub fn is_overload(&self) -> bool {
        self.overload
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.context.release_slot();
    }
}
