//! Auto-balance requests.

use tokio::sync::watch;
use tracing::{info, warn};

use super::api::ScheduleApi;
use super::board::BoardError;
use super::controller::BoardController;
use super::task::RebalanceResult;
use crate::SyncError;

/// Progress of the current rebalance request.
///
/// `Processing` is indeterminate: the backend reports nothing until it is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RebalanceStatus {
    #[default]
    Idle,
    Processing,
    Completed(RebalanceResult),
    Failed,
}

impl RebalanceStatus {
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing)
    }
}

/// Issues auto-balance requests and folds the outcome into a board.
///
/// The redistribution itself happens server-side; the coordinator never
/// simulates it. On success the board is refetched in full, on failure it is
/// left untouched.
#[derive(Debug)]
pub struct RebalanceCoordinator {
    status_tx: watch::Sender<RebalanceStatus>,
}

impl Default for RebalanceCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RebalanceCoordinator {
    pub fn new() -> Self {
        let (status_tx, _rx) = watch::channel(RebalanceStatus::Idle);
        Self { status_tx }
    }

    /// Watch the request status.
    pub fn subscribe(&self) -> watch::Receiver<RebalanceStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> RebalanceStatus {
        *self.status_tx.borrow()
    }

    /// Request a rebalance and refetch `board` on success.
    ///
    /// Refused while the board has a move awaiting confirmation.
    pub async fn request_rebalance<A: ScheduleApi>(
        &self,
        board: &mut BoardController<A>,
    ) -> Result<RebalanceResult, SyncError> {
        if board.has_pending_move() {
            return Err(BoardError::MovePending.into());
        }

        self.status_tx.send_replace(RebalanceStatus::Processing);
        let mut in_flight = InFlight(Some(&self.status_tx));
        info!("Auto-balance requested");

        let timeout = board.mutation_timeout();
        let result = match tokio::time::timeout(timeout, board.api().auto_balance()).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                operation: "auto-balance",
                elapsed: timeout,
            }),
        };

        match result {
            Ok(outcome) => {
                info!(
                    tasks_moved = outcome.tasks_moved,
                    tasks_reassigned = outcome.tasks_reassigned,
                    no_employee_overworked = outcome.no_employee_overworked,
                    all_conflicts_resolved = outcome.all_conflicts_resolved,
                    "Auto-balance completed"
                );
                board.notifier().success(format!(
                    "Rebalanced: {} moved, {} reassigned",
                    outcome.tasks_moved, outcome.tasks_reassigned
                ));

                if let Err(e) = board.load().await {
                    warn!(error = %e, "Refetch after auto-balance failed");
                }

                in_flight.finish(RebalanceStatus::Completed(outcome));
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Auto-balance failed");
                board.notifier().error(format!("Auto-balance failed: {e}"));
                in_flight.finish(RebalanceStatus::Failed);
                Err(e)
            }
        }
    }
}

/// Puts the status back to `Idle` if a request is dropped before it finishes.
struct InFlight<'a>(Option<&'a watch::Sender<RebalanceStatus>>);

impl InFlight<'_> {
    fn finish(&mut self, status: RebalanceStatus) {
        if let Some(tx) = self.0.take() {
            tx.send_replace(status);
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            tx.send_replace(RebalanceStatus::Idle);
        }
    }
}
