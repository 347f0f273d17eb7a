//! Board controller: loading, optimistic moves and confirmation.
//!
//! The controller owns the board for one view. A move is applied locally
//! first and published to watchers, then confirmed with the backend:
//!
//! - confirmation fails → the board reverts to the last confirmed state and an
//!   error notification is sent
//! - confirmation succeeds → the board is refetched in full
//!
//! Only one move may be awaiting confirmation at a time.

use std::sync::Arc;
use std::time::Duration;

use autoserv_id::{EmployeeId, TaskId};
use autoserv_reconcile::{MutationTicket, Optimistic};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::api::ScheduleApi;
use super::board::{BoardError, ScheduleBoard};
use super::task::{DateRange, ScheduleTask, TaskUpdate, TimeWindow};
use crate::notify::Notifier;
use crate::SyncError;

/// A drag-and-drop reassignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub task_id: TaskId,
    pub from: EmployeeId,
    pub to: EmployeeId,
    pub window: TimeWindow,
}

/// A move applied locally and awaiting confirmation.
#[derive(Debug)]
#[must_use = "a pending move must be confirmed"]
pub struct PendingMove {
    ticket: MutationTicket,
    request: MoveRequest,
}

impl PendingMove {
    pub fn request(&self) -> &MoveRequest {
        &self.request
    }
}

/// Owns the schedule board for one date range.
pub struct BoardController<A: ScheduleApi> {
    api: Arc<A>,
    range: DateRange,
    roster: Vec<EmployeeId>,
    state: Optimistic<ScheduleBoard>,
    board_tx: watch::Sender<ScheduleBoard>,
    notifier: Notifier,
    mutation_timeout: Duration,
}

impl<A: ScheduleApi> BoardController<A> {
    /// Create a controller with an empty board. Call [`load`](Self::load) to
    /// populate it.
    pub fn new(
        api: Arc<A>,
        range: DateRange,
        mutation_timeout: Duration,
        notifier: Notifier,
    ) -> Self {
        let (board_tx, _rx) = watch::channel(ScheduleBoard::default());
        Self {
            api,
            range,
            roster: Vec::new(),
            state: Optimistic::new(ScheduleBoard::default()),
            board_tx,
            notifier,
            mutation_timeout,
        }
    }

    /// Assignees to show even when they have no tasks in range.
    #[must_use]
    pub fn with_roster(mut self, roster: impl IntoIterator<Item = EmployeeId>) -> Self {
        self.roster = roster.into_iter().collect();
        self
    }

    /// Watch the displayed board.
    pub fn subscribe(&self) -> watch::Receiver<ScheduleBoard> {
        self.board_tx.subscribe()
    }

    /// The displayed board, including an unconfirmed move.
    pub fn board(&self) -> &ScheduleBoard {
        self.state.current()
    }

    /// The last board the backend agreed with.
    pub fn confirmed_board(&self) -> &ScheduleBoard {
        self.state.confirmed()
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn has_pending_move(&self) -> bool {
        self.state.pending().is_some()
    }

    pub(crate) fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub(crate) fn mutation_timeout(&self) -> Duration {
        self.mutation_timeout
    }

    /// Fetch the range and replace the board wholesale.
    ///
    /// Refused while a move awaits confirmation. On failure the board is left
    /// as it was.
    pub async fn load(&mut self) -> Result<(), SyncError> {
        if self.has_pending_move() {
            return Err(BoardError::MovePending.into());
        }
        self.refetch().await
    }

    async fn refetch(&mut self) -> Result<(), SyncError> {
        let tasks = self.api.list_tasks(self.range).await.map_err(|e| {
            warn!(error = %e, range = %self.range.query(), "Failed to fetch schedule");
            e
        })?;

        let board = ScheduleBoard::with_roster(self.roster.iter().cloned(), tasks)?;
        debug!(
            tasks = board.len(),
            fingerprint = %board.fingerprint(),
            "Schedule loaded"
        );

        self.state.reset(board);
        self.publish();
        Ok(())
    }

    /// Switch to another range and load it.
    pub async fn set_range(&mut self, range: DateRange) -> Result<(), SyncError> {
        if self.has_pending_move() {
            return Err(BoardError::MovePending.into());
        }
        self.range = range;
        self.load().await
    }

    /// Apply a move locally and publish it.
    pub fn begin_move(&mut self, request: MoveRequest) -> Result<PendingMove, SyncError> {
        let (ticket, ()) = self.state.begin(|board: &mut ScheduleBoard| {
            board.move_task(&request.task_id, &request.from, &request.to, request.window)
        })?;

        debug!(
            task_id = %request.task_id,
            from = %request.from,
            to = %request.to,
            window = %request.window,
            "Optimistic move applied"
        );
        self.publish();

        Ok(PendingMove { ticket, request })
    }

    /// Confirm a pending move with the backend.
    ///
    /// Success refetches the board; failure (including timeout) rolls back to
    /// the last confirmed board and notifies.
    pub async fn confirm_move(&mut self, pending: PendingMove) -> Result<ScheduleTask, SyncError> {
        let PendingMove { ticket, request } = pending;

        let employee_id = (request.from != request.to).then(|| request.to.clone());
        let update = TaskUpdate::new(request.window, employee_id);

        let result = match tokio::time::timeout(
            self.mutation_timeout,
            self.api.update_task(&request.task_id, &update),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                operation: "task update",
                elapsed: self.mutation_timeout,
            }),
        };

        match result {
            Ok(updated) => {
                self.state.confirm(ticket).map_err(BoardError::from)?;
                info!(task_id = %request.task_id, to = %request.to, "Move confirmed");
                self.notifier
                    .success(format!("Task {} moved to {}", request.task_id, request.to));

                if let Err(e) = self.refetch().await {
                    warn!(error = %e, "Refetch after move failed, keeping confirmed board");
                }
                Ok(updated)
            }
            Err(e) => {
                self.state.rollback(ticket).map_err(BoardError::from)?;
                warn!(task_id = %request.task_id, error = %e, "Move rejected, rolled back");
                self.notifier
                    .error(format!("Could not move task {}: {}", request.task_id, e));
                self.publish();
                Err(e)
            }
        }
    }

    /// Apply and confirm a move in one step.
    pub async fn move_task(&mut self, request: MoveRequest) -> Result<ScheduleTask, SyncError> {
        let pending = self.begin_move(request)?;
        self.confirm_move(pending).await
    }

    fn publish(&self) {
        let board = self.state.current().clone();
        self.board_tx.send_if_modified(|shown| {
            if *shown == board {
                return false;
            }
            *shown = board;
            true
        });
    }
}
