//! Sluice governance: multi-index voting, timelocked treasuries and
//! proportional revenue splits.
//!
//! This crate provides:
//! - A checkpointed voting ledger with delegation, one ledger per index
//! - A proposal state machine with quorum, voting window and timelock
//! - Treasuries that execute governed call batches and split balances
//! - A share ledger recording each index's beneficiaries
//! - An in-memory substrate running all of it atomically

pub mod access;
pub mod call;
pub mod checkpoint;
pub mod deploy;
pub mod error;
pub mod governor;
pub mod proposal;
pub mod registry;
pub mod shares;
pub mod split;
pub mod timelock;
pub mod token;
pub mod treasury;
pub mod votes;
pub mod world;

pub use access::{Role, RoleTable};
pub use call::Call;
pub use checkpoint::{Checkpoint, Checkpoints};
pub use deploy::{Deployment, DeploymentConfig, RevenueTree, TreeHolder, TreeShare};
pub use error::{GovernanceError, GovernanceResult};
pub use governor::{Governor, GovernorConfig};
pub use proposal::{description_hash, hash_proposal, Proposal, ProposalCalls, ProposalState, VoteSupport};
pub use registry::TreasuryRegistry;
pub use shares::{ShareLedger, ShareSnapshot, ShareSource};
pub use split::{Payout, SplitPlan};
pub use timelock::{PendingOperation, Timelock};
pub use token::{FungibleToken, ValueStore};
pub use treasury::{Controller, Treasury};
pub use votes::VotingLedger;
pub use world::{Component, World};
