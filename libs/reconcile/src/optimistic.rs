//! Optimistic mutation with whole-value rollback.

use crate::ReconcileError;

/// Handle for one in-flight optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationTicket(u64);

impl MutationTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A value with a confirmed version and a locally mutated version.
///
/// `current` is what the user sees. `confirmed` is the last value the server
/// agreed with. At most one mutation may be pending at a time; it is settled
/// with [`Optimistic::confirm`] or [`Optimistic::rollback`].
#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    confirmed: T,
    current: T,
    pending: Option<u64>,
    next_ticket: u64,
}

impl<T: Clone> Optimistic<T> {
    pub fn new(value: T) -> Self {
        Self {
            confirmed: value.clone(),
            current: value,
            pending: None,
            next_ticket: 1,
        }
    }

    /// The value including any unconfirmed mutation.
    pub fn current(&self) -> &T {
        &self.current
    }

    /// The last confirmed value.
    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    /// The pending mutation, if any.
    pub fn pending(&self) -> Option<MutationTicket> {
        self.pending.map(MutationTicket)
    }

    /// Apply a mutation locally.
    ///
    /// The closure runs against a copy of the current value; if it fails,
    /// nothing changes. Fails with [`ReconcileError::MutationPending`] while
    /// another mutation is unsettled.
    pub fn begin<R, E>(
        &mut self,
        mutate: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<(MutationTicket, R), E>
    where
        E: From<ReconcileError>,
    {
        if let Some(pending) = self.pending {
            return Err(ReconcileError::MutationPending(pending).into());
        }

        let mut next = self.current.clone();
        let out = mutate(&mut next)?;

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.current = next;
        self.pending = Some(ticket);

        Ok((MutationTicket(ticket), out))
    }

    /// Accept the pending mutation as the new confirmed value.
    pub fn confirm(&mut self, ticket: MutationTicket) -> Result<(), ReconcileError> {
        self.settle(ticket)?;
        self.confirmed = self.current.clone();
        Ok(())
    }

    /// Discard the pending mutation and restore the confirmed value.
    pub fn rollback(&mut self, ticket: MutationTicket) -> Result<&T, ReconcileError> {
        self.settle(ticket)?;
        self.current = self.confirmed.clone();
        Ok(&self.current)
    }

    /// Replace both versions with a fresh server value.
    ///
    /// Any pending mutation is superseded; its ticket becomes unknown.
    pub fn reset(&mut self, value: T) {
        self.confirmed = value.clone();
        self.current = value;
        self.pending = None;
    }

    fn settle(&mut self, ticket: MutationTicket) -> Result<(), ReconcileError> {
        match self.pending {
            Some(id) if id == ticket.0 => {
                self.pending = None;
                Ok(())
            }
            _ => Err(ReconcileError::UnknownTicket(ticket.0)),
        }
    }
}
