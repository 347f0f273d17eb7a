//! Tasks grouped by assignee.

use std::collections::{BTreeMap, HashSet};

use autoserv_id::{EmployeeId, TaskId};
use autoserv_reconcile::{Fingerprint, ReconcileError};
use chrono::NaiveDate;
use thiserror::Error;

use super::task::{InvalidWindow, ScheduleTask, TimeWindow};

/// Board errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("task {task_id} not found under {assignee}")]
    TaskNotFound {
        task_id: TaskId,
        assignee: EmployeeId,
    },

    #[error("task {0} appears more than once")]
    DuplicateTask(TaskId),

    #[error("a move is still awaiting confirmation")]
    MovePending,

    #[error(transparent)]
    InvalidWindow(#[from] InvalidWindow),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Partition tasks by assignee.
///
/// Deterministic: groups are keyed in assignee order and tasks keep their
/// input order within a group.
pub fn group_by_assignee(
    tasks: impl IntoIterator<Item = ScheduleTask>,
) -> BTreeMap<EmployeeId, Vec<ScheduleTask>> {
    let mut groups: BTreeMap<EmployeeId, Vec<ScheduleTask>> = BTreeMap::new();
    for task in tasks {
        groups
            .entry(task.employee_id.clone())
            .or_default()
            .push(task);
    }
    groups
}

/// The client-side schedule board.
///
/// Invariant: every task id appears under exactly one assignee, and a task's
/// `employee_id` always names the group it sits in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleBoard {
    groups: BTreeMap<EmployeeId, Vec<ScheduleTask>>,
}

impl ScheduleBoard {
    /// Build a board from a fetched task list.
    pub fn from_tasks(tasks: impl IntoIterator<Item = ScheduleTask>) -> Result<Self, BoardError> {
        Self::with_roster(std::iter::empty(), tasks)
    }

    /// Build a board that also shows assignees without tasks.
    pub fn with_roster(
        roster: impl IntoIterator<Item = EmployeeId>,
        tasks: impl IntoIterator<Item = ScheduleTask>,
    ) -> Result<Self, BoardError> {
        let mut groups = group_by_assignee(tasks);

        let mut seen = HashSet::new();
        for task in groups.values().flatten() {
            if !seen.insert(&task.id) {
                return Err(BoardError::DuplicateTask(task.id.clone()));
            }
        }

        for employee in roster {
            groups.entry(employee).or_default();
        }

        Ok(Self { groups })
    }

    /// All groups, keyed by assignee.
    pub fn groups(&self) -> &BTreeMap<EmployeeId, Vec<ScheduleTask>> {
        &self.groups
    }

    /// Assignees shown on the board, including empty ones.
    pub fn assignees(&self) -> impl Iterator<Item = &EmployeeId> {
        self.groups.keys()
    }

    /// Tasks for one assignee, in board order.
    pub fn tasks_for(&self, assignee: &EmployeeId) -> &[ScheduleTask] {
        self.groups.get(assignee).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Task ids for one assignee, in board order.
    pub fn task_ids(&self, assignee: &EmployeeId) -> Vec<&str> {
        self.tasks_for(assignee).iter().map(|t| t.id.as_str()).collect()
    }

    /// Locate a task.
    pub fn find(&self, task_id: &TaskId) -> Option<&ScheduleTask> {
        self.groups.values().flatten().find(|t| &t.id == task_id)
    }

    /// Total number of tasks.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks for one assignee starting on a given day.
    pub fn tasks_on(&self, assignee: &EmployeeId, day: NaiveDate) -> Vec<&ScheduleTask> {
        self.tasks_for(assignee)
            .iter()
            .filter(|t| t.window.day() == day)
            .collect()
    }

    /// Minutes booked for one assignee on a given day.
    pub fn booked_minutes(&self, assignee: &EmployeeId, day: NaiveDate) -> i64 {
        self.tasks_on(assignee, day)
            .iter()
            .map(|t| t.window.duration().num_minutes())
            .sum()
    }

    /// Move a task to another assignee and window.
    ///
    /// Removes the task from `from` and appends it to `to`. Overlap with other
    /// tasks is not checked here; conflict detection belongs to the backend.
    pub fn move_task(
        &mut self,
        task_id: &TaskId,
        from: &EmployeeId,
        to: &EmployeeId,
        new_window: TimeWindow,
    ) -> Result<(), BoardError> {
        let not_found = || BoardError::TaskNotFound {
            task_id: task_id.clone(),
            assignee: from.clone(),
        };

        let source = self.groups.get_mut(from).ok_or_else(not_found)?;
        let index = source
            .iter()
            .position(|t| &t.id == task_id)
            .ok_or_else(not_found)?;

        let mut task = source.remove(index);
        task.employee_id = to.clone();
        task.window = new_window;

        self.groups.entry(to.clone()).or_default().push(task);
        Ok(())
    }

    /// Content fingerprint, used to skip redundant notifications.
    pub fn fingerprint(&self) -> Fingerprint {
        let tasks: Vec<&ScheduleTask> = self.groups.values().flatten().collect();
        let assignees: Vec<&EmployeeId> = self.groups.keys().collect();
        Fingerprint::of(&(assignees, tasks))
    }
}
