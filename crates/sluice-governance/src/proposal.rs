//! Proposal lifecycle.
//!
//! Proposals go through states: Pending -> Active -> Succeeded/Defeated,
//! then Succeeded -> Queued -> Executed. Pending, Active, Succeeded and
//! Defeated are derived from the block height and the tallies; Queued and
//! Executed are recorded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sluice_types::{Address, Amount, Hash, HashDomain, Index, TaggedHasher};

use crate::error::{GovernanceError, GovernanceResult};

/// Proposal status in its lifecycle.
///
/// Discriminants match the numeric codes governance clients already know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProposalState {
    /// Created, voting has not opened
    Pending = 0,
    /// Voting is open
    Active = 1,
    /// Voting closed without majority or quorum
    Defeated = 3,
    /// Voting closed with majority and quorum
    Succeeded = 4,
    /// Scheduled on a treasury timelock
    Queued = 5,
    /// Every call ran
    Executed = 7,
}

impl ProposalState {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProposalState::Pending => "Pending",
            ProposalState::Active => "Active",
            ProposalState::Defeated => "Defeated",
            ProposalState::Succeeded => "Succeeded",
            ProposalState::Queued => "Queued",
            ProposalState::Executed => "Executed",
        }
    }
}

impl std::fmt::Display for ProposalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Vote support options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoteSupport {
    Against = 0,
    For = 1,
    /// Counts toward quorum only
    Abstain = 2,
}

impl TryFrom<u8> for VoteSupport {
    type Error = GovernanceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VoteSupport::Against),
            1 => Ok(VoteSupport::For),
            2 => Ok(VoteSupport::Abstain),
            other => Err(GovernanceError::InvalidVoteType(other)),
        }
    }
}

/// The calls a proposal executes, as three parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCalls {
    pub targets: Vec<Address>,
    pub values: Vec<Amount>,
    pub payloads: Vec<Vec<u8>>,
}

impl ProposalCalls {
    pub fn new(targets: Vec<Address>, values: Vec<Amount>, payloads: Vec<Vec<u8>>) -> Self {
        Self {
            targets,
            values,
            payloads,
        }
    }

    /// A single call with no attached value.
    pub fn single(target: Address, payload: Vec<u8>) -> Self {
        Self::new(vec![target], vec![0], vec![payload])
    }

    /// Reject empty and ragged batches.
    pub fn validate(&self, index: Index) -> GovernanceResult<()> {
        if self.targets.is_empty() {
            return Err(GovernanceError::EmptyProposal(index));
        }
        if self.targets.len() != self.values.len() || self.targets.len() != self.payloads.len() {
            return Err(GovernanceError::LengthMismatch {
                targets: self.targets.len(),
                values: self.values.len(),
                payloads: self.payloads.len(),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// `(target, value, payload)` in array order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, Amount, &[u8])> {
        self.targets
            .iter()
            .zip(self.values.iter().copied())
            .zip(self.payloads.iter())
            .map(|((t, v), p)| (t, v, p.as_slice()))
    }
}

/// Hash of a free-form proposal description.
pub fn description_hash(description: &str) -> Hash {
    Hash::description(description)
}

/// Deterministic proposal id over index, calls and description hash.
pub fn hash_proposal(index: Index, calls: &ProposalCalls, description_hash: &Hash) -> Hash {
    let mut hasher = TaggedHasher::new(HashDomain::Proposal);
    hasher
        .part(&index.to_be_bytes())
        .part(&(calls.len() as u64).to_be_bytes());
    for (target, value, payload) in calls.iter() {
        hasher
            .part(target.as_bytes())
            .part(&value.to_be_bytes())
            .part(payload);
    }
    hasher.part(description_hash.as_bytes()).finish()
}

/// Weighted vote counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub against: Amount,
    pub for_votes: Amount,
    pub abstain: Amount,
}

impl Tally {
    /// Votes counted toward quorum, abstentions included.
    pub fn participation(&self) -> Amount {
        self.against
            .saturating_add(self.for_votes)
            .saturating_add(self.abstain)
    }
}

/// One voter's recorded ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub support: VoteSupport,
    pub weight: Amount,
    pub reason: Option<String>,
}

/// Where and when a queued proposal runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedBatch {
    pub treasury: Address,
    pub eta: u64,
    pub operation_ids: Vec<Hash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Hash,
    pub index: Index,
    pub proposer: Address,
    pub calls: ProposalCalls,
    pub description: String,
    pub description_hash: Hash,
    /// Voting weights are read at this height; voting opens after it
    pub snapshot: u64,
    /// Last height at which votes are accepted
    pub deadline: u64,
    pub tally: Tally,
    pub receipts: BTreeMap<Address, Receipt>,
    pub queued: Option<QueuedBatch>,
    pub executed: bool,
}

impl Proposal {
    /// State at `height` given the quorum in force at the snapshot.
    pub fn state(&self, height: u64, quorum: Amount) -> ProposalState {
        if self.executed {
            ProposalState::Executed
        } else if self.queued.is_some() {
            ProposalState::Queued
        } else if height <= self.snapshot {
            ProposalState::Pending
        } else if height <= self.deadline {
            ProposalState::Active
        } else if self.vote_succeeded() && self.quorum_reached(quorum) {
            ProposalState::Succeeded
        } else {
            ProposalState::Defeated
        }
    }

    /// Strict majority of For over Against.
    pub fn vote_succeeded(&self) -> bool {
        self.tally.for_votes > self.tally.against
    }

    pub fn quorum_reached(&self, quorum: Amount) -> bool {
        self.tally.participation() >= quorum
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.receipts.contains_key(voter)
    }

    /// Record a ballot. Zero-weight ballots are recorded like any other.
    pub fn record_vote(
        &mut self,
        voter: Address,
        support: VoteSupport,
        weight: Amount,
        reason: Option<String>,
    ) -> GovernanceResult<()> {
        if self.has_voted(&voter) {
            return Err(GovernanceError::AlreadyVoted { id: self.id, voter });
        }
        let bucket = match support {
            VoteSupport::Against => &mut self.tally.against,
            VoteSupport::For => &mut self.tally.for_votes,
            VoteSupport::Abstain => &mut self.tally.abstain,
        };
        *bucket = bucket
            .checked_add(weight)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        self.receipts.insert(
            voter,
            Receipt {
                support,
                weight,
                reason,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn proposal() -> Proposal {
        let calls = ProposalCalls::single(addr("store"), vec![1]);
        let dh = description_hash("store 77");
        Proposal {
            id: hash_proposal(0, &calls, &dh),
            index: 0,
            proposer: addr("alice"),
            calls,
            description: "store 77".to_string(),
            description_hash: dh,
            snapshot: 10,
            deadline: 15,
            tally: Tally::default(),
            receipts: BTreeMap::new(),
            queued: None,
            executed: false,
        }
    }

    #[test]
    fn test_state_follows_height() {
        let p = proposal();
        assert_eq!(p.state(9, 0), ProposalState::Pending);
        assert_eq!(p.state(10, 0), ProposalState::Pending);
        assert_eq!(p.state(11, 0), ProposalState::Active);
        assert_eq!(p.state(15, 0), ProposalState::Active);
        // no votes: For does not beat Against
        assert_eq!(p.state(16, 0), ProposalState::Defeated);
    }

    #[test]
    fn test_succeeded_needs_majority_and_quorum() {
        let mut p = proposal();
        p.record_vote(addr("alice"), VoteSupport::For, 30, None).unwrap();
        p.record_vote(addr("bob"), VoteSupport::Abstain, 20, None).unwrap();
        assert_eq!(p.state(16, 50), ProposalState::Succeeded);
        assert_eq!(p.state(16, 51), ProposalState::Defeated);

        p.record_vote(addr("carol"), VoteSupport::Against, 30, None).unwrap();
        // tie is not a majority
        assert_eq!(p.state(16, 0), ProposalState::Defeated);
    }

    #[test]
    fn test_recorded_states_take_precedence() {
        let mut p = proposal();
        p.queued = Some(QueuedBatch {
            treasury: addr("valve"),
            eta: 100,
            operation_ids: vec![],
        });
        assert_eq!(p.state(5, 0), ProposalState::Queued);
        p.executed = true;
        assert_eq!(p.state(5, 0), ProposalState::Executed);
    }

    #[test]
    fn test_double_vote_rejected() {
        let mut p = proposal();
        p.record_vote(addr("alice"), VoteSupport::For, 0, None).unwrap();
        assert!(p.has_voted(&addr("alice")));
        assert!(matches!(
            p.record_vote(addr("alice"), VoteSupport::Against, 5, None),
            Err(GovernanceError::AlreadyVoted { .. })
        ));
        assert_eq!(p.tally.against, 0);
    }

    #[test]
    fn test_vote_support_codes() {
        assert_eq!(VoteSupport::try_from(1).unwrap(), VoteSupport::For);
        assert_eq!(VoteSupport::try_from(3), Err(GovernanceError::InvalidVoteType(3)));
        assert_eq!(ProposalState::Active.code(), 1);
        assert_eq!(ProposalState::Executed.code(), 7);
    }

    #[test]
    fn test_calls_validation() {
        assert_eq!(
            ProposalCalls::default().validate(4),
            Err(GovernanceError::EmptyProposal(4))
        );
        let ragged = ProposalCalls::new(vec![addr("a")], vec![], vec![vec![]]);
        assert!(matches!(
            ragged.validate(0),
            Err(GovernanceError::LengthMismatch { targets: 1, values: 0, payloads: 1 })
        ));
    }

    #[test]
    fn test_proposal_id_depends_on_index() {
        let calls = ProposalCalls::single(addr("store"), vec![1]);
        let dh = description_hash("same text");
        assert_ne!(hash_proposal(0, &calls, &dh), hash_proposal(1, &calls, &dh));
        assert_eq!(hash_proposal(0, &calls, &dh), hash_proposal(0, &calls, &dh));
    }
}
