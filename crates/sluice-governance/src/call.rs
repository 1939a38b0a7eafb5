//! Typed call payloads and the call-stack guard.
//!
//! Proposals carry opaque payload bytes; those bytes are a bincode-encoded
//! [`Call`]. An empty payload is a plain value transfer.

use serde::{Deserialize, Serialize};
use sluice_types::{Address, Amount, Index};

use crate::access::Role;
use crate::error::{GovernanceError, GovernanceResult};

/// Maximum nested call depth within one transaction.
pub const MAX_CALL_DEPTH: usize = 64;

/// A call a component can receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    /// Value transfer with no call data
    Deposit,

    TokenMint { to: Address, amount: Amount },
    TokenTransfer { to: Address, amount: Amount },

    Store { value: Amount },
    TransferOwnership { new_owner: Address },

    VotesMint { to: Address, index: Index, amount: Amount },
    VotesTransfer { from: Address, to: Address, index: Index, amount: Amount },
    Delegate { index: Index, delegatee: Address },

    SharesMint { to: Address, index: Index, units: Amount },
    SharesTransfer { from: Address, to: Address, index: Index, units: Amount },

    /// Operator approval on a voting or share ledger
    SetApprovalForAll { operator: Address, approved: bool },

    GrantRole { role: Role, account: Address },
    RevokeRole { role: Role, account: Address },
    RenounceRole { role: Role },

    UpdateDelay { delay: u64 },
    SetValve { index: Index, treasury: Address },
    Split { token: Address },
}

impl Call {
    pub fn encode(&self) -> GovernanceResult<Vec<u8>> {
        if *self == Call::Deposit {
            return Ok(Vec::new());
        }
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(payload: &[u8]) -> GovernanceResult<Self> {
        if payload.is_empty() {
            return Ok(Call::Deposit);
        }
        Ok(bincode::deserialize(payload)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Call::Deposit => "deposit",
            Call::TokenMint { .. } => "mint",
            Call::TokenTransfer { .. } => "transfer",
            Call::Store { .. } => "store",
            Call::TransferOwnership { .. } => "transferOwnership",
            Call::VotesMint { .. } | Call::SharesMint { .. } => "mint",
            Call::VotesTransfer { .. } | Call::SharesTransfer { .. } => "safeTransferFrom",
            Call::Delegate { .. } => "delegate",
            Call::SetApprovalForAll { .. } => "setApprovalForAll",
            Call::GrantRole { .. } => "grantRole",
            Call::RevokeRole { .. } => "revokeRole",
            Call::RenounceRole { .. } => "renounceRole",
            Call::UpdateDelay { .. } => "updateDelay",
            Call::SetValve { .. } => "setValve",
            Call::Split { .. } => "split",
        }
    }
}

/// A single frame in the call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub target: Address,
    pub caller: Address,
    pub value: Amount,
}

/// Tracks the components currently executing and rejects re-entry.
///
/// A component calling itself is not re-entry: governed self-calls such as
/// delay or role changes arrive that way.
#[derive(Debug, Clone, Default)]
pub struct CallGuard {
    stack: Vec<CallFrame>,
}

impl CallGuard {
    pub fn enter(&mut self, caller: Address, target: Address, value: Amount) -> GovernanceResult<usize> {
        let depth = self.stack.len();
        if depth >= MAX_CALL_DEPTH {
            return Err(GovernanceError::CallDepthExceeded(depth));
        }
        if caller != target && self.contains(&target) {
            return Err(GovernanceError::Reentrancy(target));
        }
        self.stack.push(CallFrame {
            target,
            caller,
            value,
        });
        Ok(depth)
    }

    pub fn exit(&mut self) -> Option<CallFrame> {
        self.stack.pop()
    }

    pub fn contains(&self, target: &Address) -> bool {
        self.stack.iter().any(|f| f.target == *target)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn reset(&mut self) {
        self.stack.clear();
    }
}
