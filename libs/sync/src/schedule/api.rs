//! Schedule endpoints.

use async_trait::async_trait;
use autoserv_id::TaskId;

use super::task::{DateRange, RebalanceResult, ScheduleTask, TaskUpdate};
use crate::client::ApiClient;
use crate::idempotency::idempotency_key;
use crate::SyncError;

/// Schedule operations offered by the backend.
#[async_trait]
pub trait ScheduleApi: Send + Sync + 'static {
    /// `GET /api/schedule?from=..&to=..`
    async fn list_tasks(&self, range: DateRange) -> Result<Vec<ScheduleTask>, SyncError>;

    /// `PUT /api/schedule/task/{id}`
    async fn update_task(
        &self,
        task_id: &TaskId,
        update: &TaskUpdate,
    ) -> Result<ScheduleTask, SyncError>;

    /// `POST /api/schedule/auto-balance`
    async fn auto_balance(&self) -> Result<RebalanceResult, SyncError>;
}

#[async_trait]
impl ScheduleApi for ApiClient {
    async fn list_tasks(&self, range: DateRange) -> Result<Vec<ScheduleTask>, SyncError> {
        self.get(&format!("/api/schedule?{}", range.query())).await
    }

    async fn update_task(
        &self,
        task_id: &TaskId,
        update: &TaskUpdate,
    ) -> Result<ScheduleTask, SyncError> {
        let path = format!("/api/schedule/task/{task_id}");
        let key = idempotency_key("task.update", &path, update)?;
        self.put_with_idempotency_key(&path, update, Some(&key)).await
    }

    async fn auto_balance(&self) -> Result<RebalanceResult, SyncError> {
        self.post_empty("/api/schedule/auto-balance").await
    }
}
