//! Delay queue for scheduled operations.
//!
//! An operation is identified by the hash of its call and a salt. It becomes
//! executable once the block timestamp reaches its eta and is consumed on
//! first execution; consumed ids are remembered so the same operation can
//! never run twice.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sluice_types::{Address, Amount, Hash, HashDomain};
use tracing::{debug, info};

use crate::error::{GovernanceError, GovernanceResult};

/// Default minimum delay in seconds.
pub const DEFAULT_MIN_DELAY: u64 = 3600;

/// A call waiting for its eta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub target: Address,
    pub value: Amount,
    pub payload: Vec<u8>,
    /// Earliest timestamp at which the call may run
    pub eta: u64,
}

/// Identifier of one operation in a batch.
///
/// The position is part of the hash so identical calls inside one batch get
/// distinct ids.
pub fn hash_operation(
    target: &Address,
    value: Amount,
    payload: &[u8],
    salt: &Hash,
    position: usize,
) -> Hash {
    Hash::tagged(
        HashDomain::Operation,
        &[
            target.as_bytes(),
            &value.to_be_bytes(),
            payload,
            salt.as_bytes(),
            &(position as u64).to_be_bytes(),
        ],
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelock {
    min_delay: u64,
    pending: BTreeMap<Hash, PendingOperation>,
    done: BTreeSet<Hash>,
}

impl Timelock {
    pub fn new(min_delay: u64) -> Self {
        Self {
            min_delay,
            pending: BTreeMap::new(),
            done: BTreeSet::new(),
        }
    }

    pub fn min_delay(&self) -> u64 {
        self.min_delay
    }

    pub fn set_min_delay(&mut self, delay: u64) {
        info!(old = self.min_delay, new = delay, "min delay updated");
        self.min_delay = delay;
    }

    /// Schedule one operation to become ready at `now + delay`.
    pub fn schedule(
        &mut self,
        id: Hash,
        target: Address,
        value: Amount,
        payload: Vec<u8>,
        now: u64,
        delay: u64,
    ) -> GovernanceResult<u64> {
        if delay < self.min_delay {
            return Err(GovernanceError::DelayTooShort {
                requested: delay,
                minimum: self.min_delay,
            });
        }
        if self.done.contains(&id) {
            return Err(GovernanceError::AlreadyExecuted(id));
        }
        if self.pending.contains_key(&id) {
            return Err(GovernanceError::OperationExists(id));
        }

        let eta = now.checked_add(delay).ok_or(GovernanceError::ArithmeticOverflow)?;
        self.pending.insert(
            id,
            PendingOperation {
                target,
                value,
                payload,
                eta,
            },
        );
        debug!(op = %id.short(), %target, eta, "operation scheduled");
        Ok(eta)
    }

    pub fn is_pending(&self, id: &Hash) -> bool {
        self.pending.contains_key(id)
    }

    pub fn is_done(&self, id: &Hash) -> bool {
        self.done.contains(id)
    }

    pub fn is_ready(&self, id: &Hash, now: u64) -> bool {
        self.pending.get(id).map(|op| op.eta <= now).unwrap_or(false)
    }

    pub fn get(&self, id: &Hash) -> Option<&PendingOperation> {
        self.pending.get(id)
    }

    /// Eta of a pending operation.
    pub fn eta(&self, id: &Hash) -> Option<u64> {
        self.pending.get(id).map(|op| op.eta)
    }

    /// Check that `id` may run at `now` without consuming it.
    pub fn ensure_ready(&self, id: &Hash, now: u64) -> GovernanceResult<&PendingOperation> {
        if self.done.contains(id) {
            return Err(GovernanceError::AlreadyExecuted(*id));
        }
        let op = self
            .pending
            .get(id)
            .ok_or(GovernanceError::OperationNotFound(*id))?;
        if now < op.eta {
            return Err(GovernanceError::TimelockNotElapsed { eta: op.eta, now });
        }
        Ok(op)
    }

    /// Consume a ready operation.
    pub fn take_ready(&mut self, id: &Hash, now: u64) -> GovernanceResult<PendingOperation> {
        self.ensure_ready(id, now)?;
        let op = self
            .pending
            .remove(id)
            .ok_or(GovernanceError::OperationNotFound(*id))?;
        self.done.insert(*id);
        debug!(op = %id.short(), "operation consumed");
        Ok(op)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
