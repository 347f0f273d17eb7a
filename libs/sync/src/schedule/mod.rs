//! Schedule board: grouping, optimistic moves and rebalancing.

mod api;
mod board;
mod controller;
mod rebalance;
mod task;

pub use api::ScheduleApi;
pub use board::{group_by_assignee, BoardError, ScheduleBoard};
pub use controller::{BoardController, MoveRequest, PendingMove};
pub use rebalance::{RebalanceCoordinator, RebalanceStatus};
pub use task::{
    DateRange, InvalidRange, InvalidWindow, RebalanceResult, ScheduleTask, TaskStatus, TaskUpdate,
    TimeWindow,
};
