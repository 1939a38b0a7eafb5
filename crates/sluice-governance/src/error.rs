use sluice_types::{Address, Amount, Hash, Index};
use thiserror::Error;

use crate::access::Role;

/// Errors that can occur in governance operations.
///
/// Every error aborts the transaction it was raised in; the substrate restores
/// the pre-call state, so none of these describe a partially applied change.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Insufficient balance at index {index}: required {required}, have {available}")]
    InsufficientBalance {
        index: Index,
        required: Amount,
        available: Amount,
    },

    #[error("Unauthorized: {account} lacks role {role:?} on {component}")]
    Unauthorized {
        account: Address,
        role: Role,
        component: Address,
    },

    #[error("Unauthorized: {0}")]
    NotPermitted(String),

    #[error("Empty proposal for index {0}")]
    EmptyProposal(Index),

    #[error("Proposal arrays have mismatched lengths: {targets} targets, {values} values, {payloads} payloads")]
    LengthMismatch {
        targets: usize,
        values: usize,
        payloads: usize,
    },

    #[error("Proposal {id} at index {index} already exists")]
    ProposalExists { index: Index, id: Hash },

    #[error("Proposal {id} not found at index {index}")]
    ProposalNotFound { index: Index, id: Hash },

    #[error("Voting is closed for proposal {id} at index {index}")]
    VotingClosed { index: Index, id: Hash },

    #[error("{voter} already voted on proposal {id}")]
    AlreadyVoted { id: Hash, voter: Address },

    #[error("Invalid vote type: {0}")]
    InvalidVoteType(u8),

    #[error("Proposal {id} at index {index} is not successful")]
    ProposalNotSuccessful { index: Index, id: Hash },

    #[error("Proposal {id} at index {index} is already queued")]
    AlreadyQueued { index: Index, id: Hash },

    #[error("Already executed: {0}")]
    AlreadyExecuted(Hash),

    #[error("Timelock not elapsed: eta {eta}, now {now}")]
    TimelockNotElapsed { eta: u64, now: u64 },

    #[error("Delay {requested} is below the minimum delay {minimum}")]
    DelayTooShort { requested: u64, minimum: u64 },

    #[error("Operation not found: {0}")]
    OperationNotFound(Hash),

    #[error("Operation already scheduled: {0}")]
    OperationExists(Hash),

    #[error("Index {0} has no treasury configured")]
    IndexNotConfigured(Index),

    #[error("No shares recorded at index {0}")]
    NoShares(Index),

    #[error("Lookup at height {requested} is not in the past (current height {current})")]
    FutureLookup { requested: u64, current: u64 },

    #[error("Proposer votes {votes} below threshold {threshold}")]
    BelowProposalThreshold { votes: Amount, threshold: Amount },

    #[error("Unknown target: {0}")]
    UnknownTarget(Address),

    #[error("Unsupported call {call} on {target}")]
    UnsupportedCall { target: Address, call: String },

    #[error("Reentrant call into {0}")]
    Reentrancy(Address),

    #[error("Call depth exceeded: {0}")]
    CallDepthExceeded(usize),

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Payload codec error: {0}")]
    Codec(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<bincode::Error> for GovernanceError {
    fn from(e: bincode::Error) -> Self {
        GovernanceError::Codec(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type GovernanceResult<T> = Result<T, GovernanceError>;
