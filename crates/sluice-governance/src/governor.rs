//! Per-index governance engine.
//!
//! The governor owns proposals for every index. Voting weights and quorum are
//! read from the voting ledger at each proposal's snapshot height; the ledger
//! is passed in by reference for every read so the governor never holds
//! another component's state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sluice_types::{Address, Amount, BlockContext, Hash, Index};
use tracing::{debug, info};

use crate::error::{GovernanceError, GovernanceResult};
use crate::proposal::{
    description_hash, hash_proposal, Proposal, ProposalCalls, ProposalState, QueuedBatch, Tally,
    VoteSupport,
};
use crate::split::mul_div;
use crate::votes::VotingLedger;

/// Governor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Share of past total supply that must participate, in percent
    pub quorum_percentage: u64,
    /// Blocks voting stays open
    pub voting_period: u64,
    /// Blocks between proposal and snapshot
    pub voting_delay: u64,
    /// Votes a proposer needs at the previous block
    pub proposal_threshold: Amount,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            quorum_percentage: 4,
            voting_period: 5,
            voting_delay: 1,
            proposal_threshold: 0,
        }
    }
}

impl GovernorConfig {
    pub fn validate(&self) -> GovernanceResult<()> {
        if self.quorum_percentage > 100 {
            return Err(GovernanceError::InvalidParameter(format!(
                "quorum percentage {} exceeds 100",
                self.quorum_percentage
            )));
        }
        if self.voting_period == 0 {
            return Err(GovernanceError::InvalidParameter(
                "voting period must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Governor {
    address: Address,
    ledger: Address,
    registry: Address,
    config: GovernorConfig,
    proposals: BTreeMap<(Index, Hash), Proposal>,
}

impl Governor {
    pub fn new(address: Address, ledger: Address, registry: Address, config: GovernorConfig) -> Self {
        Self {
            address,
            ledger,
            registry,
            config,
            proposals: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the voting ledger weights are read from.
    pub fn ledger(&self) -> Address {
        self.ledger
    }

    /// Address of the registry successful proposals are queued through.
    pub fn registry(&self) -> Address {
        self.registry
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn hash_proposal(&self, index: Index, calls: &ProposalCalls, description_hash: &Hash) -> Hash {
        hash_proposal(index, calls, description_hash)
    }

    pub fn proposal(&self, index: Index, id: &Hash) -> GovernanceResult<&Proposal> {
        self.proposals
            .get(&(index, *id))
            .ok_or(GovernanceError::ProposalNotFound { index, id: *id })
    }

    fn proposal_mut(&mut self, index: Index, id: &Hash) -> GovernanceResult<&mut Proposal> {
        self.proposals
            .get_mut(&(index, *id))
            .ok_or(GovernanceError::ProposalNotFound { index, id: *id })
    }

    /// Proposals at `index`, in id order.
    pub fn proposals(&self, index: Index) -> impl Iterator<Item = &Proposal> {
        self.proposals
            .range((index, Hash::ZERO)..=(index, Hash::from_bytes([0xff; 32])))
            .map(|(_, p)| p)
    }

    /// Create a proposal with explicit voting period and delay.
    #[allow(clippy::too_many_arguments)]
    pub fn propose(
        &mut self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        proposer: Address,
        index: Index,
        calls: ProposalCalls,
        description: &str,
        voting_period: u64,
        voting_delay: u64,
    ) -> GovernanceResult<Hash> {
        calls.validate(index)?;
        if voting_period == 0 {
            return Err(GovernanceError::InvalidParameter(
                "voting period must be positive".to_string(),
            ));
        }

        if self.config.proposal_threshold > 0 {
            let proposer_votes = match ctx.height.checked_sub(1) {
                Some(prev) => votes.get_votes(ctx, &proposer, index, prev)?,
                None => 0,
            };
            if proposer_votes < self.config.proposal_threshold {
                return Err(GovernanceError::BelowProposalThreshold {
                    votes: proposer_votes,
                    threshold: self.config.proposal_threshold,
                });
            }
        }

        let desc_hash = description_hash(description);
        let id = hash_proposal(index, &calls, &desc_hash);
        if self.proposals.contains_key(&(index, id)) {
            return Err(GovernanceError::ProposalExists { index, id });
        }

        let snapshot = ctx
            .height
            .checked_add(voting_delay)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        let deadline = snapshot
            .checked_add(voting_period)
            .ok_or(GovernanceError::ArithmeticOverflow)?;

        self.proposals.insert(
            (index, id),
            Proposal {
                id,
                index,
                proposer,
                calls,
                description: description.to_string(),
                description_hash: desc_hash,
                snapshot,
                deadline,
                tally: Tally::default(),
                receipts: BTreeMap::new(),
                queued: None,
                executed: false,
            },
        );

        info!(index, id = %id.short(), %proposer, snapshot, deadline, "proposal created");
        Ok(id)
    }

    /// Create a proposal with the configured voting period and delay.
    pub fn propose_default(
        &mut self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        proposer: Address,
        index: Index,
        calls: ProposalCalls,
        description: &str,
    ) -> GovernanceResult<Hash> {
        let (period, delay) = (self.config.voting_period, self.config.voting_delay);
        self.propose(ctx, votes, proposer, index, calls, description, period, delay)
    }

    /// Quorum at `index` for a snapshot taken at `height`.
    pub fn quorum(
        &self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        index: Index,
        height: u64,
    ) -> GovernanceResult<Amount> {
        let supply = votes.get_past_total_supply(ctx, index, height)?;
        mul_div(supply, Amount::from(self.config.quorum_percentage), 100)
    }

    pub fn state(
        &self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        index: Index,
        id: &Hash,
    ) -> GovernanceResult<ProposalState> {
        let proposal = self.proposal(index, id)?;
        if proposal.executed || proposal.queued.is_some() || ctx.height <= proposal.deadline {
            // quorum is irrelevant until voting has closed
            return Ok(proposal.state(ctx.height, 0));
        }
        let quorum = self.quorum(ctx, votes, index, proposal.snapshot)?;
        Ok(proposal.state(ctx.height, quorum))
    }

    pub fn cast_vote(
        &mut self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        voter: Address,
        index: Index,
        id: &Hash,
        support: u8,
    ) -> GovernanceResult<Amount> {
        self.record_ballot(ctx, votes, voter, index, id, support, None)
    }

    pub fn cast_vote_with_reason(
        &mut self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        voter: Address,
        index: Index,
        id: &Hash,
        support: u8,
        reason: &str,
    ) -> GovernanceResult<Amount> {
        self.record_ballot(ctx, votes, voter, index, id, support, Some(reason.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_ballot(
        &mut self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        voter: Address,
        index: Index,
        id: &Hash,
        support: u8,
        reason: Option<String>,
    ) -> GovernanceResult<Amount> {
        let support = VoteSupport::try_from(support)?;
        if self.state(ctx, votes, index, id)? != ProposalState::Active {
            return Err(GovernanceError::VotingClosed { index, id: *id });
        }

        let snapshot = self.proposal(index, id)?.snapshot;
        let weight = votes.get_votes(ctx, &voter, index, snapshot)?;
        self.proposal_mut(index, id)?
            .record_vote(voter, support, weight, reason)?;

        debug!(index, id = %id.short(), %voter, ?support, weight, "vote cast");
        Ok(weight)
    }

    /// Check that the proposal may be queued and return its id.
    pub fn ensure_queueable(
        &self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        index: Index,
        calls: &ProposalCalls,
        description_hash: &Hash,
    ) -> GovernanceResult<Hash> {
        let id = hash_proposal(index, calls, description_hash);
        match self.state(ctx, votes, index, &id)? {
            ProposalState::Succeeded => Ok(id),
            ProposalState::Queued => Err(GovernanceError::AlreadyQueued { index, id }),
            ProposalState::Executed => Err(GovernanceError::AlreadyExecuted(id)),
            _ => Err(GovernanceError::ProposalNotSuccessful { index, id }),
        }
    }

    pub fn mark_queued(&mut self, index: Index, id: &Hash, batch: QueuedBatch) -> GovernanceResult<()> {
        let proposal = self.proposal_mut(index, id)?;
        info!(index, id = %id.short(), treasury = %batch.treasury, eta = batch.eta, "proposal queued");
        proposal.queued = Some(batch);
        Ok(())
    }

    /// Check that the proposal may execute now and return its id and batch.
    pub fn ensure_executable(
        &self,
        ctx: &BlockContext,
        index: Index,
        calls: &ProposalCalls,
        description_hash: &Hash,
    ) -> GovernanceResult<(Hash, QueuedBatch)> {
        let id = hash_proposal(index, calls, description_hash);
        let proposal = self.proposal(index, &id)?;
        if proposal.executed {
            return Err(GovernanceError::AlreadyExecuted(id));
        }
        let batch = proposal
            .queued
            .clone()
            .ok_or(GovernanceError::ProposalNotSuccessful { index, id })?;
        if ctx.timestamp < batch.eta {
            return Err(GovernanceError::TimelockNotElapsed {
                eta: batch.eta,
                now: ctx.timestamp,
            });
        }
        Ok((id, batch))
    }

    pub fn mark_executed(&mut self, index: Index, id: &Hash) -> GovernanceResult<()> {
        self.proposal_mut(index, id)?.executed = true;
        info!(index, id = %id.short(), "proposal executed");
        Ok(())
    }

    pub fn proposal_snapshot(&self, index: Index, id: &Hash) -> GovernanceResult<u64> {
        Ok(self.proposal(index, id)?.snapshot)
    }

    pub fn proposal_deadline(&self, index: Index, id: &Hash) -> GovernanceResult<u64> {
        Ok(self.proposal(index, id)?.deadline)
    }

    /// Eta of a queued proposal, `None` before queueing.
    pub fn proposal_eta(&self, index: Index, id: &Hash) -> GovernanceResult<Option<u64>> {
        Ok(self.proposal(index, id)?.queued.as_ref().map(|b| b.eta))
    }

    pub fn proposal_votes(&self, index: Index, id: &Hash) -> GovernanceResult<Tally> {
        Ok(self.proposal(index, id)?.tally)
    }

    pub fn has_voted(&self, index: Index, id: &Hash, voter: &Address) -> GovernanceResult<bool> {
        Ok(self.proposal(index, id)?.has_voted(voter))
    }

    pub fn get_votes(
        &self,
        ctx: &BlockContext,
        votes: &VotingLedger,
        account: &Address,
        index: Index,
        height: u64,
    ) -> GovernanceResult<Amount> {
        votes.get_votes(ctx, account, index, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn at(height: u64) -> BlockContext {
        BlockContext::new(height, 1_000 + height * 12)
    }

    fn setup() -> (Governor, VotingLedger) {
        let mut votes = VotingLedger::new(addr("ledger"), addr("owner"));
        let ctx = at(1);
        votes.mint(&ctx, &addr("owner"), addr("alice"), 0, 600).unwrap();
        votes.mint(&ctx, &addr("owner"), addr("bob"), 0, 400).unwrap();
        votes.delegate(&ctx, addr("alice"), 0, addr("alice")).unwrap();
        votes.delegate(&ctx, addr("bob"), 0, addr("bob")).unwrap();
        let gov = Governor::new(addr("governor"), addr("ledger"), addr("registry"), GovernorConfig::default());
        (gov, votes)
    }

    fn calls() -> ProposalCalls {
        ProposalCalls::single(addr("store"), vec![7])
    }

    #[test]
    fn test_propose_sets_window() {
        let (mut gov, votes) = setup();
        let id = gov.propose_default(&at(2), &votes, addr("alice"), 0, calls(), "p").unwrap();
        assert_eq!(gov.proposal_snapshot(0, &id).unwrap(), 3);
        assert_eq!(gov.proposal_deadline(0, &id).unwrap(), 8);
        assert_eq!(gov.state(&at(3), &votes, 0, &id).unwrap(), ProposalState::Pending);
        assert_eq!(gov.state(&at(4), &votes, 0, &id).unwrap(), ProposalState::Active);
    }

    #[test]
    fn test_empty_proposal_creates_nothing() {
        let (mut gov, votes) = setup();
        let err = gov
            .propose_default(&at(2), &votes, addr("alice"), 0, ProposalCalls::default(), "p")
            .unwrap_err();
        assert_eq!(err, GovernanceError::EmptyProposal(0));
        assert_eq!(gov.proposals(0).count(), 0);
    }

    #[test]
    fn test_duplicate_proposal() {
        let (mut gov, votes) = setup();
        gov.propose_default(&at(2), &votes, addr("alice"), 0, calls(), "p").unwrap();
        assert!(matches!(
            gov.propose_default(&at(2), &votes, addr("bob"), 0, calls(), "p"),
            Err(GovernanceError::ProposalExists { .. })
        ));
        // same calls at another index are a different proposal
        gov.propose_default(&at(2), &votes, addr("bob"), 1, calls(), "p").unwrap();
    }

    #[test]
    fn test_vote_window_enforced() {
        let (mut gov, votes) = setup();
        let id = gov.propose_default(&at(2), &votes, addr("alice"), 0, calls(), "p").unwrap();
        assert_eq!(
            gov.cast_vote(&at(3), &votes, addr("alice"), 0, &id, 1),
            Err(GovernanceError::VotingClosed { index: 0, id })
        );
        assert_eq!(gov.cast_vote(&at(4), &votes, addr("alice"), 0, &id, 1).unwrap(), 600);
        assert_eq!(
            gov.cast_vote(&at(9), &votes, addr("bob"), 0, &id, 0),
            Err(GovernanceError::VotingClosed { index: 0, id })
        );
    }

    #[test]
    fn test_outcome_and_quorum() {
        let (mut gov, votes) = setup();
        let id = gov.propose_default(&at(2), &votes, addr("alice"), 0, calls(), "p").unwrap();
        assert_eq!(gov.quorum(&at(4), &votes, 0, 3).unwrap(), 40);

        gov.cast_vote_with_reason(&at(4), &votes, addr("alice"), 0, &id, 1, "yes").unwrap();
        gov.cast_vote(&at(4), &votes, addr("bob"), 0, &id, 0).unwrap();
        let tally = gov.proposal_votes(0, &id).unwrap();
        assert_eq!((tally.for_votes, tally.against), (600, 400));
        assert_eq!(gov.state(&at(9), &votes, 0, &id).unwrap(), ProposalState::Succeeded);
        let receipt = &gov.proposal(0, &id).unwrap().receipts[&addr("alice")];
        assert_eq!(receipt.reason.as_deref(), Some("yes"));
    }

    #[test]
    fn test_queue_requires_success() {
        let (mut gov, votes) = setup();
        let id = gov.propose_default(&at(2), &votes, addr("alice"), 0, calls(), "p").unwrap();
        gov.cast_vote(&at(4), &votes, addr("bob"), 0, &id, 0).unwrap();
        let dh = description_hash("p");
        assert_eq!(
            gov.ensure_queueable(&at(9), &votes, 0, &calls(), &dh),
            Err(GovernanceError::ProposalNotSuccessful { index: 0, id })
        );
    }

    #[test]
    fn test_execute_waits_for_eta() {
        let (mut gov, votes) = setup();
        let id = gov.propose_default(&at(2), &votes, addr("alice"), 0, calls(), "p").unwrap();
        gov.cast_vote(&at(4), &votes, addr("alice"), 0, &id, 1).unwrap();
        let dh = description_hash("p");
        gov.ensure_queueable(&at(9), &votes, 0, &calls(), &dh).unwrap();
        let eta = at(9).timestamp + 3_600;
        gov.mark_queued(
            0,
            &id,
            QueuedBatch { treasury: addr("valve"), eta, operation_ids: vec![] },
        )
        .unwrap();

        assert_eq!(
            gov.ensure_queueable(&at(10), &votes, 0, &calls(), &dh),
            Err(GovernanceError::AlreadyQueued { index: 0, id })
        );
        assert!(matches!(
            gov.ensure_executable(&at(10), 0, &calls(), &dh),
            Err(GovernanceError::TimelockNotElapsed { .. })
        ));
        let later = BlockContext::new(11, eta);
        assert_eq!(gov.ensure_executable(&later, 0, &calls(), &dh).unwrap().0, id);
        gov.mark_executed(0, &id).unwrap();
        assert_eq!(gov.state(&later, &votes, 0, &id).unwrap(), ProposalState::Executed);
        assert_eq!(
            gov.ensure_executable(&later, 0, &calls(), &dh),
            Err(GovernanceError::AlreadyExecuted(id))
        );
    }

    #[test]
    fn test_proposal_threshold() {
        let (_, votes) = setup();
        let config = GovernorConfig {
            proposal_threshold: 500,
            ..GovernorConfig::default()
        };
        let mut gov = Governor::new(addr("governor"), addr("ledger"), addr("registry"), config);
        assert!(matches!(
            gov.propose_default(&at(2), &votes, addr("bob"), 0, calls(), "p"),
            Err(GovernanceError::BelowProposalThreshold { votes: 400, threshold: 500 })
        ));
        gov.propose_default(&at(2), &votes, addr("alice"), 0, calls(), "p").unwrap();
    }

    #[test]
    fn test_config_validation() {
        assert!(GovernorConfig::default().validate().is_ok());
        let bad = GovernorConfig {
            quorum_percentage: 101,
            ..GovernorConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
