//! Multi-index voting ledger with delegation and historical checkpoints.
//!
//! Every index is an independent fungible ledger. Holders delegate their
//! balance at an index to a delegatee (possibly themselves); the delegatee's
//! voting power is checkpointed at every change so governance can read it at
//! any past height.
//!
//! A balance carries no voting power until its holder delegates for the first
//! time. The sum of all checkpointed votes at an index therefore equals the
//! *delegated* supply, and equals total supply once every holder has delegated.

use std::collections::{BTreeMap, BTreeSet};

use sluice_types::{Address, Amount, BlockContext, Index};
use tracing::{debug, info};

use crate::access::{Role, RoleTable};
use crate::checkpoint::{Checkpoint, Checkpoints};
use crate::error::{GovernanceError, GovernanceResult};
use crate::shares::{ShareSnapshot, ShareSource};

#[derive(Debug, Clone, Default)]
struct IndexLedger {
    balances: BTreeMap<Address, Amount>,
    /// first-receipt order, for share-style enumeration
    holder_order: Vec<Address>,
    delegates: BTreeMap<Address, Address>,
    votes: BTreeMap<Address, Checkpoints>,
    total_supply: Checkpoints,
}

impl IndexLedger {
    fn credit(&mut self, to: Address, amount: Amount) -> GovernanceResult<()> {
        let balance = self.balances.entry(to).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        if !self.holder_order.contains(&to) {
            self.holder_order.push(to);
        }
        Ok(())
    }
}

/// Voting-power ledger ("governance token") partitioned by index.
#[derive(Debug, Clone)]
pub struct VotingLedger {
    address: Address,
    roles: RoleTable,
    indices: BTreeMap<Index, IndexLedger>,
    /// owner -> operators allowed to move the owner's balances
    operators: BTreeMap<Address, BTreeSet<Address>>,
}

impl VotingLedger {
    /// Create a ledger at `address`; `owner` becomes admin and minter.
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            roles: RoleTable::with_admin(address, owner).with_member(Role::Minter, owner),
            indices: BTreeMap::new(),
            operators: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    pub fn roles_mut(&mut self) -> &mut RoleTable {
        &mut self.roles
    }

    pub fn balance_of(&self, account: &Address, index: Index) -> Amount {
        self.indices
            .get(&index)
            .and_then(|l| l.balances.get(account).copied())
            .unwrap_or(0)
    }

    pub fn total_supply(&self, index: Index) -> Amount {
        self.indices
            .get(&index)
            .map(|l| l.total_supply.latest())
            .unwrap_or(0)
    }

    /// Current delegatee of `account`, `Address::ZERO` if it never delegated.
    pub fn delegates(&self, account: &Address, index: Index) -> Address {
        self.indices
            .get(&index)
            .and_then(|l| l.delegates.get(account).copied())
            .unwrap_or(Address::ZERO)
    }

    /// Indices that have seen any activity.
    pub fn indices(&self) -> Vec<Index> {
        self.indices.keys().copied().collect()
    }

    /// Accounts with a non-zero balance at `index`.
    pub fn holders(&self, index: Index) -> Vec<(Address, Amount)> {
        self.indices
            .get(&index)
            .map(|l| {
                l.balances
                    .iter()
                    .filter(|(_, b)| **b > 0)
                    .map(|(a, b)| (*a, *b))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sum of balances whose holders have delegated to a non-zero delegatee.
    pub fn delegated_supply(&self, index: Index) -> Amount {
        let Some(ledger) = self.indices.get(&index) else {
            return 0;
        };
        ledger
            .balances
            .iter()
            .filter(|(holder, _)| {
                ledger
                    .delegates
                    .get(*holder)
                    .map(|d| !d.is_zero())
                    .unwrap_or(false)
            })
            .map(|(_, b)| *b)
            .sum()
    }

    /// Create `amount` units for `to` at `index`. Caller must hold the minter role.
    pub fn mint(
        &mut self,
        ctx: &BlockContext,
        caller: &Address,
        to: Address,
        index: Index,
        amount: Amount,
    ) -> GovernanceResult<()> {
        self.roles.ensure_role(Role::Minter, caller)?;
        if to.is_zero() {
            return Err(GovernanceError::InvalidParameter("mint to zero address".to_string()));
        }

        let ledger = self.indices.entry(index).or_default();
        ledger.credit(to, amount)?;
        ledger.total_supply.increase(ctx.height, amount)?;

        let delegatee = ledger.delegates.get(&to).copied().unwrap_or(Address::ZERO);
        Self::move_voting_power(ledger, ctx.height, Address::ZERO, delegatee, amount)?;

        info!(index, %to, amount, "voting units minted");
        Ok(())
    }

    /// Move `amount` units from `from` to `to` at `index`.
    ///
    /// `caller` must be `from` or an operator approved by `from`.
    pub fn transfer(
        &mut self,
        ctx: &BlockContext,
        caller: &Address,
        from: Address,
        to: Address,
        index: Index,
        amount: Amount,
    ) -> GovernanceResult<()> {
        if *caller != from && !self.is_approved_for_all(&from, caller) {
            return Err(GovernanceError::NotPermitted(format!(
                "{} is neither owner nor approved operator of {}",
                caller, from
            )));
        }
        if to.is_zero() {
            return Err(GovernanceError::InvalidParameter(
                "transfer to zero address".to_string(),
            ));
        }

        let available = self.balance_of(&from, index);
        if amount > available {
            return Err(GovernanceError::InsufficientBalance {
                index,
                required: amount,
                available,
            });
        }

        let ledger = self.indices.entry(index).or_default();
        ledger.balances.insert(from, available - amount);
        ledger.credit(to, amount)?;

        let src = ledger.delegates.get(&from).copied().unwrap_or(Address::ZERO);
        let dst = ledger.delegates.get(&to).copied().unwrap_or(Address::ZERO);
        Self::move_voting_power(ledger, ctx.height, src, dst, amount)?;

        debug!(index, %from, %to, amount, "voting units transferred");
        Ok(())
    }

    /// Point `account`'s voting weight at `index` to `delegatee`.
    ///
    /// Delegating to `Address::ZERO` withdraws the weight entirely.
    pub fn delegate(
        &mut self,
        ctx: &BlockContext,
        account: Address,
        index: Index,
        delegatee: Address,
    ) -> GovernanceResult<()> {
        let ledger = self.indices.entry(index).or_default();
        let previous = ledger
            .delegates
            .insert(account, delegatee)
            .unwrap_or(Address::ZERO);
        let weight = ledger.balances.get(&account).copied().unwrap_or(0);
        Self::move_voting_power(ledger, ctx.height, previous, delegatee, weight)?;

        info!(index, %account, from = %previous, to = %delegatee, weight, "delegate changed");
        Ok(())
    }

    pub fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool) {
        let set = self.operators.entry(owner).or_default();
        if approved {
            set.insert(operator);
        } else {
            set.remove(&operator);
        }
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operators
            .get(owner)
            .map(|s| s.contains(operator))
            .unwrap_or(false)
    }

    /// Voting power of `account` at `index` as of the end of block `height`.
    ///
    /// `height` must be in the past: the current block can still change.
    pub fn get_votes(
        &self,
        ctx: &BlockContext,
        account: &Address,
        index: Index,
        height: u64,
    ) -> GovernanceResult<Amount> {
        Self::ensure_past(ctx, height)?;
        Ok(self
            .indices
            .get(&index)
            .and_then(|l| l.votes.get(account))
            .map(|c| c.upper_lookup(height))
            .unwrap_or(0))
    }

    /// Voting power of `account` at `index` right now.
    pub fn current_votes(&self, account: &Address, index: Index) -> Amount {
        self.indices
            .get(&index)
            .and_then(|l| l.votes.get(account))
            .map(|c| c.latest())
            .unwrap_or(0)
    }

    /// Total supply at `index` as of the end of block `height`.
    pub fn get_past_total_supply(
        &self,
        ctx: &BlockContext,
        index: Index,
        height: u64,
    ) -> GovernanceResult<Amount> {
        Self::ensure_past(ctx, height)?;
        Ok(self
            .indices
            .get(&index)
            .map(|l| l.total_supply.upper_lookup(height))
            .unwrap_or(0))
    }

    pub fn num_checkpoints(&self, account: &Address, index: Index) -> usize {
        self.indices
            .get(&index)
            .and_then(|l| l.votes.get(account))
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn checkpoint(&self, account: &Address, index: Index, pos: usize) -> Option<Checkpoint> {
        self.indices
            .get(&index)
            .and_then(|l| l.votes.get(account))
            .and_then(|c| c.get(pos).copied())
    }

    /// Every account that ever held voting power at `index`.
    pub fn voters(&self, index: Index) -> Vec<Address> {
        self.indices
            .get(&index)
            .map(|l| l.votes.keys().copied().collect())
            .unwrap_or_default()
    }

    fn ensure_past(ctx: &BlockContext, height: u64) -> GovernanceResult<()> {
        if height >= ctx.height {
            return Err(GovernanceError::FutureLookup {
                requested: height,
                current: ctx.height,
            });
        }
        Ok(())
    }

    fn move_voting_power(
        ledger: &mut IndexLedger,
        height: u64,
        src: Address,
        dst: Address,
        amount: Amount,
    ) -> GovernanceResult<()> {
        if src == dst || amount == 0 {
            return Ok(());
        }
        if !src.is_zero() {
            let (old, new) = ledger.votes.entry(src).or_default().decrease(height, amount)?;
            debug!(delegate = %src, old, new, height, "votes checkpointed");
        }
        if !dst.is_zero() {
            let (old, new) = ledger.votes.entry(dst).or_default().increase(height, amount)?;
            debug!(delegate = %dst, old, new, height, "votes checkpointed");
        }
        Ok(())
    }
}

/// Voting balances can double as share units: a treasury may split by the
/// voting ledger of its index instead of a dedicated share ledger.
impl ShareSource for VotingLedger {
    fn return_percents(&self, index: Index) -> ShareSnapshot {
        match self.indices.get(&index) {
            Some(ledger) => ShareSnapshot::from_ordered(
                index,
                ledger.total_supply.latest(),
                ledger
                    .holder_order
                    .iter()
                    .map(|h| (*h, ledger.balances.get(h).copied().unwrap_or(0))),
            ),
            None => ShareSnapshot::empty(index),
        }
    }
}
