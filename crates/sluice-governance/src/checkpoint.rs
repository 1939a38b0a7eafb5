//! Append-only history of values keyed by block height.
//!
//! Lookups at an arbitrary past height are a binary search over the entries;
//! there is no replay and no pruning.

use serde::{Deserialize, Serialize};
use sluice_types::Amount;

use crate::error::{GovernanceError, GovernanceResult};

/// A value recorded at a block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Block height the value took effect
    pub height: u64,
    /// Value from that height on
    pub value: Amount,
}

/// Ordered checkpoint sequence with strictly increasing heights.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoints {
    entries: Vec<Checkpoint>,
}

impl Checkpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` at `height`.
    ///
    /// A second write at the latest height overwrites that entry instead of
    /// appending a duplicate. Returns `(previous, new)`.
    pub fn push(&mut self, height: u64, value: Amount) -> GovernanceResult<(Amount, Amount)> {
        match self.entries.last_mut() {
            Some(last) if last.height > height => Err(GovernanceError::InvalidParameter(format!(
                "checkpoint at height {} precedes latest height {}",
                height, last.height
            ))),
            Some(last) if last.height == height => {
                let previous = last.value;
                last.value = value;
                Ok((previous, value))
            }
            Some(last) => {
                let previous = last.value;
                self.entries.push(Checkpoint { height, value });
                Ok((previous, value))
            }
            None => {
                self.entries.push(Checkpoint { height, value });
                Ok((0, value))
            }
        }
    }

    /// Add `delta` to the latest value at `height`.
    pub fn increase(&mut self, height: u64, delta: Amount) -> GovernanceResult<(Amount, Amount)> {
        let next = self
            .latest()
            .checked_add(delta)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        self.push(height, next)
    }

    /// Subtract `delta` from the latest value at `height`.
    pub fn decrease(&mut self, height: u64, delta: Amount) -> GovernanceResult<(Amount, Amount)> {
        let next = self
            .latest()
            .checked_sub(delta)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        self.push(height, next)
    }

    /// Value in effect at `height`: the last entry with `entry.height <= height`,
    /// or 0 when none exists.
    pub fn upper_lookup(&self, height: u64) -> Amount {
        let pos = self.entries.partition_point(|c| c.height <= height);
        if pos == 0 {
            0
        } else {
            self.entries[pos - 1].value
        }
    }

    /// Latest recorded value, 0 when empty.
    pub fn latest(&self) -> Amount {
        self.entries.last().map(|c| c.value).unwrap_or(0)
    }

    pub fn get(&self, pos: usize) -> Option<&Checkpoint> {
        self.entries.get(pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }
}
