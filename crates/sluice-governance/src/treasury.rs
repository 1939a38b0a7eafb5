//! Timelock-gated treasuries ("valves").
//!
//! A treasury holds funds for one index. Proposers schedule call batches on
//! its timelock; once ready, the batch runs with the treasury as caller. The
//! treasury can also split its token balance over the share holders of its
//! index.

use serde::{Deserialize, Serialize};
use sluice_types::{Address, Amount, Hash, Index};
use tracing::info;

use crate::access::{Role, RoleTable};
use crate::error::{GovernanceError, GovernanceResult};
use crate::proposal::ProposalCalls;
use crate::shares::ShareSource;
use crate::split::SplitPlan;
use crate::timelock::{hash_operation, PendingOperation, Timelock};

/// Operation ids and common eta of a scheduled batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledBatch {
    pub operation_ids: Vec<Hash>,
    pub eta: u64,
}

/// Capabilities shared by treasuries and the registry: role-gated access to
/// an own timelock.
pub trait Controller {
    fn address(&self) -> Address;
    fn roles(&self) -> &RoleTable;
    fn roles_mut(&mut self) -> &mut RoleTable;
    fn timelock(&self) -> &Timelock;
    fn timelock_mut(&mut self) -> &mut Timelock;

    fn min_delay(&self) -> u64 {
        self.timelock().min_delay()
    }

    /// Schedule one call `delay` seconds from `now` and return its id.
    /// Caller must hold the proposer role.
    #[allow(clippy::too_many_arguments)]
    fn schedule(
        &mut self,
        caller: &Address,
        target: Address,
        value: Amount,
        payload: Vec<u8>,
        salt: &Hash,
        now: u64,
        delay: u64,
    ) -> GovernanceResult<Hash> {
        self.roles().ensure_role(Role::Proposer, caller)?;
        let id = hash_operation(&target, value, &payload, salt, 0);
        let eta = self.timelock_mut().schedule(id, target, value, payload, now, delay)?;
        info!(controller = %self.address(), id = %id.short(), eta, "operation scheduled");
        Ok(id)
    }

    /// Schedule every call of `calls` with the minimum delay. Caller must
    /// hold the proposer role.
    fn schedule_batch(
        &mut self,
        caller: &Address,
        calls: &ProposalCalls,
        salt: &Hash,
        now: u64,
    ) -> GovernanceResult<ScheduledBatch> {
        self.roles().ensure_role(Role::Proposer, caller)?;
        let delay = self.min_delay();
        let mut operation_ids = Vec::with_capacity(calls.len());
        let mut eta = now;
        for (position, (target, value, payload)) in calls.iter().enumerate() {
            let id = hash_operation(target, value, payload, salt, position);
            eta = self
                .timelock_mut()
                .schedule(id, *target, value, payload.to_vec(), now, delay)?;
            operation_ids.push(id);
        }
        info!(controller = %self.address(), ops = operation_ids.len(), eta, "batch scheduled");
        Ok(ScheduledBatch { operation_ids, eta })
    }

    /// Consume a ready batch in order. Caller must hold the executor role.
    fn take_ready_batch(
        &mut self,
        caller: &Address,
        ids: &[Hash],
        now: u64,
    ) -> GovernanceResult<Vec<PendingOperation>> {
        self.roles().ensure_role(Role::Executor, caller)?;
        // check the whole batch first so a late op leaves nothing consumed
        for id in ids {
            self.timelock().ensure_ready(id, now)?;
        }
        ids.iter()
            .map(|id| self.timelock_mut().take_ready(id, now))
            .collect()
    }

    /// Change the minimum delay. Only the controller itself may do this,
    /// i.e. through a scheduled operation.
    fn update_delay(&mut self, caller: &Address, delay: u64) -> GovernanceResult<()> {
        if *caller != self.address() {
            return Err(GovernanceError::NotPermitted(format!(
                "delay of {} can only be changed by itself",
                self.address()
            )));
        }
        self.timelock_mut().set_min_delay(delay);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Treasury {
    address: Address,
    index: Index,
    /// Ledger the split reads percentages from
    book: Address,
    roles: RoleTable,
    timelock: Timelock,
    splits: u64,
}

impl Treasury {
    /// A treasury for `index` administered by `admin` until handoff.
    pub fn new(address: Address, index: Index, book: Address, admin: Address, min_delay: u64) -> Self {
        Self {
            address,
            index,
            book,
            roles: RoleTable::with_admin(address, admin),
            timelock: Timelock::new(min_delay),
            splits: 0,
        }
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn book(&self) -> Address {
        self.book
    }

    /// Number of completed splits.
    pub fn splits(&self) -> u64 {
        self.splits
    }

    /// Plan a split of `balance` over the holders at this treasury's index.
    pub fn plan_split<S: ShareSource + ?Sized>(
        &self,
        shares: &S,
        balance: Amount,
    ) -> GovernanceResult<SplitPlan> {
        SplitPlan::compute(&shares.return_percents(self.index), balance)
    }

    pub(crate) fn record_split(&mut self, plan: &SplitPlan) {
        self.splits += 1;
        info!(
            treasury = %self.address,
            index = self.index,
            balance = plan.balance,
            recipients = plan.payouts.len(),
            remainder = plan.remainder,
            "split paid"
        );
    }
}

impl Controller for Treasury {
    fn address(&self) -> Address {
        self.address
    }

    fn roles(&self) -> &RoleTable {
        &self.roles
    }

    fn roles_mut(&mut self) -> &mut RoleTable {
        &mut self.roles
    }

    fn timelock(&self) -> &Timelock {
        &self.timelock
    }

    fn timelock_mut(&mut self) -> &mut Timelock {
        &mut self.timelock
    }
}
