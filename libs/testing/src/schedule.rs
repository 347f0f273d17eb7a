//! In-memory schedule backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use autoserv_id::TaskId;
use autoserv_sync::schedule::TaskUpdate;
use autoserv_sync::{DateRange, RebalanceResult, ScheduleApi, ScheduleTask, SyncError};

/// Recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleCall {
    List(DateRange),
    Update(TaskId, TaskUpdate),
    AutoBalance,
}

/// Fake backend for board tests.
///
/// Updates are applied to the stored tasks unless a failure is injected.
/// A rebalance replaces the stored tasks with the configured outcome.
#[derive(Debug, Default)]
pub struct FakeScheduleApi {
    tasks: Mutex<Vec<ScheduleTask>>,
    calls: Mutex<Vec<ScheduleCall>>,
    list_failure: Mutex<Option<SyncErrorSpec>>,
    update_failure: Mutex<Option<SyncErrorSpec>>,
    rebalance_failure: Mutex<Option<SyncErrorSpec>>,
    update_delay: Mutex<Option<Duration>>,
    rebalance_outcome: Mutex<Option<(RebalanceResult, Vec<ScheduleTask>)>>,
    list_count: AtomicUsize,
}

/// `SyncError` is not `Clone`, so failures are stored as status and message.
#[derive(Debug, Clone)]
struct SyncErrorSpec {
    status: u16,
    message: String,
}

impl SyncErrorSpec {
    fn to_error(&self) -> SyncError {
        SyncError::api(self.status, self.message.clone())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl FakeScheduleApi {
    pub fn new(tasks: Vec<ScheduleTask>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    /// Stored tasks.
    pub fn tasks(&self) -> Vec<ScheduleTask> {
        lock(&self.tasks).clone()
    }

    pub fn calls(&self) -> Vec<ScheduleCall> {
        lock(&self.calls).clone()
    }

    /// Number of `list_tasks` calls.
    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::Relaxed)
    }

    pub fn fail_lists(&self, status: u16, message: &str) {
        *lock(&self.list_failure) = Some(SyncErrorSpec {
            status,
            message: message.to_string(),
        });
    }

    pub fn fail_updates(&self, status: u16, message: &str) {
        *lock(&self.update_failure) = Some(SyncErrorSpec {
            status,
            message: message.to_string(),
        });
    }

    pub fn fail_rebalance(&self, status: u16, message: &str) {
        *lock(&self.rebalance_failure) = Some(SyncErrorSpec {
            status,
            message: message.to_string(),
        });
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        *lock(&self.list_failure) = None;
        *lock(&self.update_failure) = None;
        *lock(&self.rebalance_failure) = None;
    }

    /// Delay every update and auto-balance by `delay`.
    pub fn delay_mutations(&self, delay: Duration) {
        *lock(&self.update_delay) = Some(delay);
    }

    /// Result and resulting task list for the next auto-balance.
    pub fn set_rebalance_outcome(&self, result: RebalanceResult, tasks: Vec<ScheduleTask>) {
        *lock(&self.rebalance_outcome) = Some((result, tasks));
    }

    fn record(&self, call: ScheduleCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl ScheduleApi for FakeScheduleApi {
    async fn list_tasks(&self, range: DateRange) -> Result<Vec<ScheduleTask>, SyncError> {
        self.record(ScheduleCall::List(range));
        self.list_count.fetch_add(1, Ordering::Relaxed);
        if let Some(failure) = lock(&self.list_failure).as_ref() {
            return Err(failure.to_error());
        }
        Ok(lock(&self.tasks)
            .iter()
            .filter(|t| range.contains(t.window.day()))
            .cloned()
            .collect())
    }

    async fn update_task(
        &self,
        task_id: &TaskId,
        update: &TaskUpdate,
    ) -> Result<ScheduleTask, SyncError> {
        self.record(ScheduleCall::Update(task_id.clone(), update.clone()));

        let delay = *lock(&self.update_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = lock(&self.update_failure).as_ref() {
            return Err(failure.to_error());
        }

        let window = autoserv_sync::TimeWindow::new(update.start_time, update.end_time)
            .map_err(|e| SyncError::api(400, e.to_string()))?;

        let mut tasks = lock(&self.tasks);
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == task_id)
            .ok_or_else(|| SyncError::api(404, format!("task {task_id} not found")))?;
        task.window = window;
        if let Some(employee) = &update.employee_id {
            task.employee_id = employee.clone();
        }
        Ok(task.clone())
    }

    async fn auto_balance(&self) -> Result<RebalanceResult, SyncError> {
        self.record(ScheduleCall::AutoBalance);
        let delay = *lock(&self.update_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = lock(&self.rebalance_failure).as_ref() {
            return Err(failure.to_error());
        }

        match lock(&self.rebalance_outcome).take() {
            Some((result, tasks)) => {
                *lock(&self.tasks) = tasks;
                Ok(result)
            }
            None => Ok(RebalanceResult {
                no_employee_overworked: true,
                all_conflicts_resolved: true,
                ..RebalanceResult::default()
            }),
        }
    }
}
