//! Client-side reconciliation primitives.
//!
//! This library holds the rules for folding server-originated state into a
//! local view. Key concepts:
//!
//! - **Baseline**: a one-shot snapshot read over request/response.
//! - **Push**: a pushed update on a subscription; always authoritative.
//! - **Optimistic mutation**: a local change applied before the server
//!   confirms it, reverted wholesale if confirmation fails.
//!
//! # Invariants
//!
//! - A baseline never overwrites state that already exists
//! - Pushes are applied in the order they are handed in, last write wins
//! - A rolled-back mutation restores the exact last confirmed value

mod fingerprint;
mod live;
mod optimistic;

pub use fingerprint::Fingerprint;
pub use live::{Applied, Checkpoint, LiveState, OrderingPolicy, WriteSource};
pub use optimistic::{MutationTicket, Optimistic};

use thiserror::Error;

/// Reconciliation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Another optimistic mutation is still awaiting confirmation.
    #[error("mutation {0} is still pending confirmation")]
    MutationPending(u64),

    /// The ticket does not refer to the pending mutation.
    #[error("unknown or already settled mutation ticket {0}")]
    UnknownTicket(u64),

    /// The state has been closed and accepts no further writes.
    #[error("state is closed")]
    Closed,
}
