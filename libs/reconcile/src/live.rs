//! Last-write-wins live state fed by a baseline read and a push stream.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Fingerprint;

/// Where a write came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSource {
    /// One-shot request/response read.
    Baseline,
    /// Pushed update on a subscription.
    Push,
}

/// How pushes are ordered against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderingPolicy {
    /// Trust transport delivery order. Every push replaces the state.
    #[default]
    DeliveryOrder,

    /// Pushes carrying a sequence number at or below the last applied one are
    /// rejected. Pushes without a sequence are applied as in `DeliveryOrder`.
    Sequenced,
}

/// Outcome of a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// First value adopted into an empty state.
    Adopted,

    /// Existing value replaced by a different one.
    Replaced,

    /// Value replaced by an identical one.
    Unchanged,

    /// Baseline dropped because state already exists.
    IgnoredBaseline,

    /// Push dropped because its sequence is not newer than the checkpoint.
    RejectedStale { sequence: u64, last: u64 },

    /// State is closed.
    Closed,
}

impl Applied {
    /// Returns true if observers should be told about a new value.
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Adopted | Self::Replaced)
    }
}

/// Checkpoint for sequenced pushes.
///
/// Tracks the last applied sequence for at-most-once application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Last applied sequence.
    pub last_sequence: u64,

    /// Timestamp of last checkpoint update.
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a new checkpoint.
    pub fn new(last_sequence: u64) -> Self {
        Self {
            last_sequence,
            updated_at: Utc::now(),
        }
    }

    /// Check if a sequence has already been applied (or superseded).
    pub fn is_processed(&self, sequence: u64) -> bool {
        sequence <= self.last_sequence
    }

    /// Advance the checkpoint to a new sequence.
    pub fn advance(&mut self, sequence: u64) {
        if sequence > self.last_sequence {
            self.last_sequence = sequence;
            self.updated_at = Utc::now();
        }
    }
}

/// A single authoritative value with two write sources.
///
/// The baseline is only adopted into an empty state, so a slow baseline read
/// can never regress a value that a push already delivered. The decision is
/// made on presence, not on timestamps, because neither source carries a
/// clock the client can trust.
#[derive(Debug, Clone)]
pub struct LiveState<T> {
    value: Option<T>,
    fingerprint: Option<Fingerprint>,
    source: Option<WriteSource>,
    updated_at: Option<DateTime<Utc>>,
    policy: OrderingPolicy,
    checkpoint: Option<Checkpoint>,
    pushes_applied: u64,
    closed: bool,
}

impl<T> Default for LiveState<T> {
    fn default() -> Self {
        Self::new(OrderingPolicy::default())
    }
}

impl<T> LiveState<T> {
    /// Create an empty state.
    pub fn new(policy: OrderingPolicy) -> Self {
        Self {
            value: None,
            fingerprint: None,
            source: None,
            updated_at: None,
            policy,
            checkpoint: None,
            pushes_applied: 0,
            closed: false,
        }
    }

    /// Current value, if any write has been applied.
    pub fn current(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Source of the current value.
    pub fn source(&self) -> Option<WriteSource> {
        self.source
    }

    /// Time of the last applied write.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Number of pushes applied so far.
    pub fn pushes_applied(&self) -> u64 {
        self.pushes_applied
    }

    /// Ordering policy in effect.
    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    /// Stop accepting writes. The last value stays readable.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<T: Serialize> LiveState<T> {
    /// Apply a baseline read. Adopted only when no state exists yet.
    pub fn apply_baseline(&mut self, value: T) -> Applied {
        if self.closed {
            return Applied::Closed;
        }
        if self.value.is_some() {
            return Applied::IgnoredBaseline;
        }
        self.store(value, WriteSource::Baseline)
    }

    /// Apply a pushed value. Replaces whatever is there.
    pub fn apply_push(&mut self, value: T, sequence: Option<u64>) -> Applied {
        if self.closed {
            return Applied::Closed;
        }

        if let (OrderingPolicy::Sequenced, Some(sequence)) = (self.policy, sequence) {
            match &mut self.checkpoint {
                Some(cp) if cp.is_processed(sequence) => {
                    return Applied::RejectedStale {
                        sequence,
                        last: cp.last_sequence,
                    };
                }
                Some(cp) => cp.advance(sequence),
                None => self.checkpoint = Some(Checkpoint::new(sequence)),
            }
        }

        self.pushes_applied += 1;
        self.store(value, WriteSource::Push)
    }

    fn store(&mut self, value: T, source: WriteSource) -> Applied {
        let fingerprint = Fingerprint::of(&value);
        let applied = match &self.fingerprint {
            None => Applied::Adopted,
            Some(prev) if *prev == fingerprint => Applied::Unchanged,
            Some(_) => Applied::Replaced,
        };

        self.value = Some(value);
        self.fingerprint = Some(fingerprint);
        self.source = Some(source);
        self.updated_at = Some(Utc::now());
        applied
    }
}
