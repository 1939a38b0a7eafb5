//! In-memory ledger substrate.
//!
//! The world owns every component by address, the native balances, and the
//! block clock. Each public mutating entry point is one transaction: the
//! state is snapshotted first and restored if any step fails, so no error
//! ever leaves a partially applied change behind.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use sluice_types::{Address, Amount, BlockContext, Hash, Index};
use tracing::{debug, info, warn};

use crate::access::{Role, RoleTable};
use crate::call::{Call, CallGuard};
use crate::error::{GovernanceError, GovernanceResult};
use crate::governor::Governor;
use crate::proposal::{ProposalCalls, ProposalState, QueuedBatch};
use crate::registry::TreasuryRegistry;
use crate::shares::{ShareLedger, ShareSnapshot, ShareSource};
use crate::split::SplitPlan;
use crate::token::{FungibleToken, ValueStore};
use crate::treasury::{Controller, Treasury};
use crate::votes::VotingLedger;

/// Default seconds between blocks when mining.
pub const DEFAULT_BLOCK_TIME: u64 = 12;

/// Everything that can live at an address.
#[derive(Debug, Clone)]
pub enum Component {
    Votes(VotingLedger),
    Shares(ShareLedger),
    Treasury(Treasury),
    Registry(TreasuryRegistry),
    Governor(Governor),
    Token(FungibleToken),
    Store(ValueStore),
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Votes(_) => "voting-ledger",
            Component::Shares(_) => "share-ledger",
            Component::Treasury(_) => "treasury",
            Component::Registry(_) => "registry",
            Component::Governor(_) => "governor",
            Component::Token(_) => "token",
            Component::Store(_) => "value-store",
        }
    }

    fn roles_mut(&mut self) -> Option<&mut RoleTable> {
        match self {
            Component::Votes(c) => Some(c.roles_mut()),
            Component::Shares(c) => Some(c.roles_mut()),
            Component::Treasury(c) => Some(c.roles_mut()),
            Component::Registry(c) => Some(c.roles_mut()),
            Component::Token(c) => Some(c.roles_mut()),
            Component::Governor(_) | Component::Store(_) => None,
        }
    }

    fn share_source(&self) -> Option<&dyn ShareSource> {
        match self {
            Component::Votes(c) => Some(c as &dyn ShareSource),
            Component::Shares(c) => Some(c as &dyn ShareSource),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct WorldState {
    components: BTreeMap<Address, Component>,
    native: BTreeMap<Address, Amount>,
    nonces: BTreeMap<Address, u64>,
}

macro_rules! component_accessors {
    ($($get:ident, $get_mut:ident, $variant:ident => $ty:ty;)*) => {
        $(
            pub fn $get(&self, address: &Address) -> GovernanceResult<&$ty> {
                match self.state.components.get(address) {
                    Some(Component::$variant(c)) => Ok(c),
                    _ => Err(GovernanceError::UnknownTarget(*address)),
                }
            }

            pub fn $get_mut(&mut self, address: &Address) -> GovernanceResult<&mut $ty> {
                match self.state.components.get_mut(address) {
                    Some(Component::$variant(c)) => Ok(c),
                    _ => Err(GovernanceError::UnknownTarget(*address)),
                }
            }
        )*
    };
}

#[derive(Debug, Clone)]
pub struct World {
    ctx: BlockContext,
    block_time: u64,
    state: WorldState,
    guard: CallGuard,
}

impl Default for World {
    fn default() -> Self {
        Self::new(BlockContext::new(1, 1_700_000_000), DEFAULT_BLOCK_TIME)
    }
}

impl World {
    pub fn new(ctx: BlockContext, block_time: u64) -> Self {
        Self {
            ctx,
            block_time,
            state: WorldState::default(),
            guard: CallGuard::default(),
        }
    }

    pub fn ctx(&self) -> BlockContext {
        self.ctx
    }

    pub fn height(&self) -> u64 {
        self.ctx.height
    }

    pub fn timestamp(&self) -> u64 {
        self.ctx.timestamp
    }

    /// Produce `blocks` empty blocks.
    pub fn mine(&mut self, blocks: u64) {
        self.ctx = self.ctx.advanced(blocks, self.block_time);
        debug!(height = self.ctx.height, timestamp = self.ctx.timestamp, "mined");
    }

    /// Move the clock forward without producing blocks.
    pub fn advance_time(&mut self, seconds: u64) {
        self.ctx.timestamp = self.ctx.timestamp.saturating_add(seconds);
    }

    component_accessors! {
        votes, votes_mut, Votes => VotingLedger;
        shares, shares_mut, Shares => ShareLedger;
        treasury, treasury_mut, Treasury => Treasury;
        registry, registry_mut, Registry => TreasuryRegistry;
        governor, governor_mut, Governor => Governor;
        token, token_mut, Token => FungibleToken;
        store, store_mut, Store => ValueStore;
    }

    pub fn component(&self, address: &Address) -> Option<&Component> {
        self.state.components.get(address)
    }

    /// Place a component at the next contract address of `deployer`.
    pub fn deploy(&mut self, deployer: Address, build: impl FnOnce(Address) -> Component) -> Address {
        let nonce = self.state.nonces.entry(deployer).or_insert(0);
        let address = Address::contract(&deployer, *nonce);
        *nonce += 1;
        let component = build(address);
        info!(%address, kind = component.kind(), %deployer, "component deployed");
        self.state.components.insert(address, component);
        address
    }

    pub fn native_balance(&self, account: &Address) -> Amount {
        self.state.native.get(account).copied().unwrap_or(0)
    }

    /// Credit native units out of thin air. Test and tooling setup only.
    pub fn fund(&mut self, account: Address, amount: Amount) {
        *self.state.native.entry(account).or_insert(0) += amount;
    }

    /// Run `f` as one atomic transaction.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> GovernanceResult<T>,
    ) -> GovernanceResult<T> {
        let snapshot = self.state.clone();
        let result = f(self);
        if let Err(e) = &result {
            warn!(error = %e, "transaction reverted");
            self.state = snapshot;
            self.guard.reset();
        }
        result
    }

    /// Send `value` and `call` from `caller` to `target` as one transaction.
    pub fn send(
        &mut self,
        caller: Address,
        target: Address,
        value: Amount,
        call: Call,
    ) -> GovernanceResult<()> {
        self.transact(|w| w.dispatch(caller, target, value, call))
    }

    /// Nested call inside a running transaction.
    fn dispatch(
        &mut self,
        caller: Address,
        target: Address,
        value: Amount,
        call: Call,
    ) -> GovernanceResult<()> {
        self.guard.enter(caller, target, value)?;
        let result = self
            .move_native(caller, target, value)
            .and_then(|_| self.apply(caller, target, call));
        self.guard.exit();
        result
    }

    fn move_native(&mut self, from: Address, to: Address, value: Amount) -> GovernanceResult<()> {
        if value == 0 {
            return Ok(());
        }
        let available = self.native_balance(&from);
        if value > available {
            return Err(GovernanceError::InsufficientBalance {
                index: 0,
                required: value,
                available,
            });
        }
        self.state.native.insert(from, available - value);
        *self.state.native.entry(to).or_insert(0) += value;
        Ok(())
    }

    fn apply(&mut self, caller: Address, target: Address, call: Call) -> GovernanceResult<()> {
        let ctx = self.ctx;
        let kind = match self.state.components.get(&target) {
            Some(component) => component.kind(),
            // plain accounts accept value and nothing else
            None if call == Call::Deposit => return Ok(()),
            None => return Err(GovernanceError::UnknownTarget(target)),
        };
        let unsupported = |call: &Call| GovernanceError::UnsupportedCall {
            target,
            call: format!("{} on {}", call.name(), kind),
        };

        if let Call::Split { token } = call {
            return match self.state.components.get(&target) {
                Some(Component::Treasury(_)) => self.split_treasury(target, token).map(|_| ()),
                _ => Err(unsupported(&call)),
            };
        }

        let component = self
            .state
            .components
            .get_mut(&target)
            .ok_or(GovernanceError::UnknownTarget(target))?;
        match (component, &call) {
            (_, Call::Deposit) => Ok(()),
            (c, Call::GrantRole { role, account }) => c
                .roles_mut()
                .ok_or_else(|| unsupported(&call))?
                .grant_role(&caller, *role, *account)
                .map(|_| ()),
            (c, Call::RevokeRole { role, account }) => c
                .roles_mut()
                .ok_or_else(|| unsupported(&call))?
                .revoke_role(&caller, *role, *account)
                .map(|_| ()),
            (c, Call::RenounceRole { role }) => {
                c.roles_mut()
                    .ok_or_else(|| unsupported(&call))?
                    .renounce_role(&caller, *role);
                Ok(())
            }
            (Component::Token(t), Call::TokenMint { to, amount }) => t.mint(&caller, *to, *amount),
            (Component::Token(t), Call::TokenTransfer { to, amount }) => {
                t.transfer(&caller, *to, *amount)
            }
            (Component::Store(s), Call::Store { value }) => s.store(&caller, *value),
            (Component::Store(s), Call::TransferOwnership { new_owner }) => {
                s.transfer_ownership(&caller, *new_owner)
            }
            (Component::Votes(v), Call::VotesMint { to, index, amount }) => {
                v.mint(&ctx, &caller, *to, *index, *amount)
            }
            (Component::Votes(v), Call::VotesTransfer { from, to, index, amount }) => {
                v.transfer(&ctx, &caller, *from, *to, *index, *amount)
            }
            (Component::Votes(v), Call::Delegate { index, delegatee }) => {
                v.delegate(&ctx, caller, *index, *delegatee)
            }
            (Component::Votes(v), Call::SetApprovalForAll { operator, approved }) => {
                v.set_approval_for_all(caller, *operator, *approved);
                Ok(())
            }
            (Component::Shares(s), Call::SharesMint { to, index, units }) => {
                s.mint(&caller, *to, *index, *units)
            }
            (Component::Shares(s), Call::SharesTransfer { from, to, index, units }) => {
                s.transfer(&caller, *from, *to, *index, *units)
            }
            (Component::Shares(s), Call::SetApprovalForAll { operator, approved }) => {
                s.set_approval_for_all(caller, *operator, *approved);
                Ok(())
            }
            (Component::Treasury(t), Call::UpdateDelay { delay }) => t.update_delay(&caller, *delay),
            (Component::Registry(r), Call::UpdateDelay { delay }) => r.update_delay(&caller, *delay),
            (Component::Registry(r), Call::SetValve { index, treasury }) => {
                r.set_valve(&caller, *index, *treasury)
            }
            (_, call) => Err(unsupported(call)),
        }
    }

    /// Take a component out for a mutation that also needs to read the
    /// rest of the world. The component is always put back.
    fn with_governor<T>(
        &mut self,
        address: Address,
        f: impl FnOnce(&mut Governor, &World) -> GovernanceResult<T>,
    ) -> GovernanceResult<T> {
        let mut component = self
            .state
            .components
            .remove(&address)
            .ok_or(GovernanceError::UnknownTarget(address))?;
        let result = match &mut component {
            Component::Governor(g) => f(g, self),
            other => Err(GovernanceError::UnsupportedCall {
                target: address,
                call: format!("governance on {}", other.kind()),
            }),
        };
        self.state.components.insert(address, component);
        result
    }

    // -- governance -------------------------------------------------------

    /// Propose with the governor's configured voting period and delay.
    pub fn propose(
        &mut self,
        proposer: Address,
        governor: Address,
        index: Index,
        calls: ProposalCalls,
        description: &str,
    ) -> GovernanceResult<Hash> {
        let ctx = self.ctx;
        self.transact(|w| {
            w.with_governor(governor, |g, w| {
                let votes = w.votes(&g.ledger())?;
                g.propose_default(&ctx, votes, proposer, index, calls, description)
            })
        })
    }

    /// Propose with an explicit voting period and delay.
    #[allow(clippy::too_many_arguments)]
    pub fn propose_with(
        &mut self,
        proposer: Address,
        governor: Address,
        index: Index,
        calls: ProposalCalls,
        description: &str,
        voting_period: u64,
        voting_delay: u64,
    ) -> GovernanceResult<Hash> {
        let ctx = self.ctx;
        self.transact(|w| {
            w.with_governor(governor, |g, w| {
                let votes = w.votes(&g.ledger())?;
                g.propose(&ctx, votes, proposer, index, calls, description, voting_period, voting_delay)
            })
        })
    }

    pub fn cast_vote(
        &mut self,
        voter: Address,
        governor: Address,
        index: Index,
        id: &Hash,
        support: u8,
    ) -> GovernanceResult<Amount> {
        let ctx = self.ctx;
        self.transact(|w| {
            w.with_governor(governor, |g, w| {
                let votes = w.votes(&g.ledger())?;
                g.cast_vote(&ctx, votes, voter, index, id, support)
            })
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cast_vote_with_reason(
        &mut self,
        voter: Address,
        governor: Address,
        index: Index,
        id: &Hash,
        support: u8,
        reason: &str,
    ) -> GovernanceResult<Amount> {
        let ctx = self.ctx;
        self.transact(|w| {
            w.with_governor(governor, |g, w| {
                let votes = w.votes(&g.ledger())?;
                g.cast_vote_with_reason(&ctx, votes, voter, index, id, support, reason)
            })
        })
    }

    pub fn state(&self, governor: &Address, index: Index, id: &Hash) -> GovernanceResult<ProposalState> {
        let g = self.governor(governor)?;
        g.state(&self.ctx, self.votes(&g.ledger())?, index, id)
    }

    pub fn quorum(&self, governor: &Address, index: Index, height: u64) -> GovernanceResult<Amount> {
        let g = self.governor(governor)?;
        g.quorum(&self.ctx, self.votes(&g.ledger())?, index, height)
    }

    /// Queue a succeeded proposal on the treasury its index maps to.
    pub fn queue(
        &mut self,
        governor: Address,
        index: Index,
        calls: &ProposalCalls,
        description_hash: &Hash,
    ) -> GovernanceResult<QueuedBatch> {
        let ctx = self.ctx;
        self.transact(|w| {
            let id = {
                let g = w.governor(&governor)?;
                g.ensure_queueable(&ctx, w.votes(&g.ledger())?, index, calls, description_hash)?
            };

            let registry_address = w.governor(&governor)?.registry();
            let registry = w.registry(&registry_address)?;
            registry.roles().ensure_role(Role::Proposer, &governor)?;
            let treasury = registry.resolve(index)?;

            let scheduled = w
                .treasury_mut(&treasury)?
                .schedule_batch(&registry_address, calls, &id, ctx.timestamp)?;
            let batch = QueuedBatch {
                treasury,
                eta: scheduled.eta,
                operation_ids: scheduled.operation_ids,
            };
            w.governor_mut(&governor)?.mark_queued(index, &id, batch.clone())?;
            Ok(batch)
        })
    }

    /// Run a queued proposal's calls in order with the treasury as caller.
    pub fn execute(
        &mut self,
        governor: Address,
        index: Index,
        calls: &ProposalCalls,
        description_hash: &Hash,
    ) -> GovernanceResult<Hash> {
        let ctx = self.ctx;
        self.transact(|w| {
            let (id, batch) = w
                .governor(&governor)?
                .ensure_executable(&ctx, index, calls, description_hash)?;

            w.guard.enter(governor, governor, 0)?;
            let result = w.run_batch(governor, &batch);
            w.guard.exit();
            result?;

            w.governor_mut(&governor)?.mark_executed(index, &id)?;
            Ok(id)
        })
    }

    fn run_batch(&mut self, executor: Address, batch: &QueuedBatch) -> GovernanceResult<()> {
        let treasury = batch.treasury;
        let now = self.ctx.timestamp;
        let ops = self
            .treasury_mut(&treasury)?
            .take_ready_batch(&executor, &batch.operation_ids, now)?;

        self.guard.enter(executor, treasury, 0)?;
        let result = ops.into_iter().try_for_each(|op| {
            let call = Call::decode(&op.payload)?;
            debug!(%treasury, target = %op.target, call = call.name(), "executing operation");
            self.dispatch(treasury, op.target, op.value, call)
        });
        self.guard.exit();
        result
    }

    // -- treasury ---------------------------------------------------------

    /// Current share percentages a treasury would split by.
    pub fn return_percents(&self, treasury: &Address) -> GovernanceResult<ShareSnapshot> {
        let t = self.treasury(treasury)?;
        let source = self
            .component(&t.book())
            .and_then(Component::share_source)
            .ok_or(GovernanceError::UnknownTarget(t.book()))?;
        Ok(source.return_percents(t.index()))
    }

    /// Split a treasury's `token` balance over its share holders. Anyone may
    /// call this.
    pub fn split(&mut self, caller: Address, treasury: Address, token: Address) -> GovernanceResult<SplitPlan> {
        self.transact(|w| {
            w.guard.enter(caller, treasury, 0)?;
            let result = w.split_treasury(treasury, token);
            w.guard.exit();
            result
        })
    }

    /// Split `root`, then every treasury that received funds, breadth first.
    /// Each treasury is split at most once, so share cycles terminate.
    /// Treasuries without shares below the root keep what they received.
    pub fn cascade_split(
        &mut self,
        caller: Address,
        root: Address,
        token: Address,
    ) -> GovernanceResult<Vec<SplitPlan>> {
        self.transact(|w| {
            let mut visited = BTreeSet::from([root]);
            let mut queue = VecDeque::from([root]);
            let mut plans = Vec::new();

            while let Some(treasury) = queue.pop_front() {
                w.guard.enter(caller, treasury, 0)?;
                let result = w.split_treasury(treasury, token);
                w.guard.exit();

                let plan = match result {
                    Ok(plan) => plan,
                    Err(GovernanceError::NoShares(index)) if treasury != root => {
                        debug!(%treasury, index, "no shares, cascade stops here");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for payout in &plan.payouts {
                    let is_treasury = matches!(
                        w.state.components.get(&payout.recipient),
                        Some(Component::Treasury(_))
                    );
                    if payout.amount > 0 && is_treasury && visited.insert(payout.recipient) {
                        queue.push_back(payout.recipient);
                    }
                }
                plans.push(plan);
            }
            Ok(plans)
        })
    }

    /// Plan from one balance snapshot, then pay in holder order.
    fn split_treasury(&mut self, treasury: Address, token: Address) -> GovernanceResult<SplitPlan> {
        let balance = self.token(&token)?.balance_of(&treasury);
        let plan = {
            let t = self.treasury(&treasury)?;
            let source = self
                .component(&t.book())
                .and_then(Component::share_source)
                .ok_or(GovernanceError::UnknownTarget(t.book()))?;
            t.plan_split(source, balance)?
        };

        for payout in plan.payouts.iter().filter(|p| p.amount > 0) {
            self.dispatch(
                treasury,
                token,
                0,
                Call::TokenTransfer {
                    to: payout.recipient,
                    amount: payout.amount,
                },
            )?;
        }
        self.treasury_mut(&treasury)?.record_split(&plan);
        Ok(plan)
    }
}
