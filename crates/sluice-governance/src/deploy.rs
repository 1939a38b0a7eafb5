//! Standard deployments and the role handoff.
//!
//! Every setup step goes through [`World::send`] so deployments are subject
//! to the same authorization as any later call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sluice_types::{Address, Amount, Index};
use tracing::info;

use crate::access::Role;
use crate::call::Call;
use crate::error::{GovernanceError, GovernanceResult};
use crate::governor::{Governor, GovernorConfig};
use crate::registry::TreasuryRegistry;
use crate::shares::ShareLedger;
use crate::split::SplitPlan;
use crate::timelock::DEFAULT_MIN_DELAY;
use crate::token::{FungibleToken, ValueStore};
use crate::treasury::Treasury;
use crate::votes::VotingLedger;
use crate::world::{Component, World};

/// Parameters of a standard deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub governor: GovernorConfig,
    /// Timelock delay of every treasury, in seconds
    pub min_delay: u64,
    /// Voting units minted to the deployer at index 0
    pub initial_supply: Amount,
    /// Fungible tokens minted to the deployer
    pub token_supply: Amount,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            governor: GovernorConfig::default(),
            min_delay: DEFAULT_MIN_DELAY,
            initial_supply: 1_000_000,
            token_supply: 1_000_000,
        }
    }
}

/// Addresses of a deployed governance system.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub deployer: Address,
    pub votes: Address,
    pub registry: Address,
    pub governor: Address,
    pub token: Address,
    pub store: Address,
    pub treasuries: BTreeMap<Index, Address>,
    pub config: DeploymentConfig,
    handed_off: bool,
}

impl Deployment {
    /// Deploy every component with the deployer still in control. Index 0
    /// gets a treasury splitting by the voting ledger.
    pub fn deploy(world: &mut World, deployer: Address, config: DeploymentConfig) -> GovernanceResult<Self> {
        config.governor.validate()?;

        let votes = world.deploy(deployer, |at| Component::Votes(VotingLedger::new(at, deployer)));
        let registry = world.deploy(deployer, |at| {
            Component::Registry(TreasuryRegistry::new(at, deployer, config.min_delay))
        });
        let governor = world.deploy(deployer, |at| {
            Component::Governor(Governor::new(at, votes, registry, config.governor))
        });
        let token = world.deploy(deployer, |at| Component::Token(FungibleToken::new(at, "TKN", deployer)));
        let store = world.deploy(deployer, |at| Component::Store(ValueStore::new(at, deployer)));

        world.send(deployer, votes, 0, Call::VotesMint { to: deployer, index: 0, amount: config.initial_supply })?;
        world.send(deployer, votes, 0, Call::Delegate { index: 0, delegatee: deployer })?;
        world.send(deployer, token, 0, Call::TokenMint { to: deployer, amount: config.token_supply })?;

        let mut deployment = Self {
            deployer,
            votes,
            registry,
            governor,
            token,
            store,
            treasuries: BTreeMap::new(),
            config,
            handed_off: false,
        };
        let root = deployment.add_treasury(world, 0, votes)?;
        world.send(deployer, store, 0, Call::TransferOwnership { new_owner: root })?;
        Ok(deployment)
    }

    /// Deploy and hand off in one go.
    pub fn standard(world: &mut World, deployer: Address, config: DeploymentConfig) -> GovernanceResult<Self> {
        let mut deployment = Self::deploy(world, deployer, config)?;
        deployment.handoff(world)?;
        Ok(deployment)
    }

    /// Deploy a treasury for `index` that splits by `book`, wire its roles
    /// and map it in the registry. Only possible before the handoff.
    pub fn add_treasury(&mut self, world: &mut World, index: Index, book: Address) -> GovernanceResult<Address> {
        if self.handed_off {
            return Err(GovernanceError::NotPermitted(
                "treasuries are added by governance after handoff".to_string(),
            ));
        }
        let (deployer, min_delay) = (self.deployer, self.config.min_delay);
        let treasury = world.deploy(deployer, |at| {
            Component::Treasury(Treasury::new(at, index, book, deployer, min_delay))
        });

        world.send(deployer, treasury, 0, Call::GrantRole { role: Role::Proposer, account: self.registry })?;
        world.send(deployer, treasury, 0, Call::GrantRole { role: Role::Proposer, account: self.governor })?;
        world.send(deployer, treasury, 0, Call::GrantRole { role: Role::Executor, account: Address::ZERO })?;
        world.send(deployer, self.registry, 0, Call::SetValve { index, treasury })?;

        self.treasuries.insert(index, treasury);
        info!(index, %treasury, %book, "treasury added");
        Ok(treasury)
    }

    /// Give control to governance and drop the deployer's admin roles.
    ///
    /// The governor becomes proposer on the registry, execution is opened to
    /// everyone, and the index 0 treasury becomes registry admin so
    /// governance can map new indices later.
    pub fn handoff(&mut self, world: &mut World) -> GovernanceResult<()> {
        let deployer = self.deployer;
        let root = self.root_treasury()?;

        world.send(deployer, self.registry, 0, Call::GrantRole { role: Role::Proposer, account: self.governor })?;
        world.send(deployer, self.registry, 0, Call::GrantRole { role: Role::Executor, account: Address::ZERO })?;
        world.send(deployer, self.registry, 0, Call::GrantRole { role: Role::Admin, account: root })?;
        world.send(deployer, self.registry, 0, Call::RevokeRole { role: Role::Admin, account: deployer })?;

        for treasury in self.treasuries.values() {
            world.send(deployer, *treasury, 0, Call::RevokeRole { role: Role::Admin, account: deployer })?;
        }

        self.handed_off = true;
        info!(governor = %self.governor, treasuries = self.treasuries.len(), "governance handoff complete");
        Ok(())
    }

    pub fn is_handed_off(&self) -> bool {
        self.handed_off
    }

    /// The index 0 treasury.
    pub fn root_treasury(&self) -> GovernanceResult<Address> {
        self.treasuries
            .get(&0)
            .copied()
            .ok_or(GovernanceError::IndexNotConfigured(0))
    }
}

/// Recipient of share units in a revenue-share tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeHolder {
    /// Another treasury of the tree, by node number
    Node(usize),
    /// An outside account
    Account(Address),
}

/// Share units for one holder of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeShare {
    pub node: usize,
    pub holder: TreeHolder,
    pub units: Amount,
}

/// A tree of treasuries, node `i` splitting by share-ledger index `i`.
#[derive(Debug, Clone)]
pub struct RevenueTree {
    pub book: Address,
    pub token: Address,
    pub nodes: Vec<Address>,
}

impl RevenueTree {
    /// Deploy `node_count` treasuries, a share ledger and a token, then mint
    /// `shares`.
    pub fn deploy(
        world: &mut World,
        deployer: Address,
        node_count: usize,
        shares: &[TreeShare],
    ) -> GovernanceResult<Self> {
        let book = world.deploy(deployer, |at| Component::Shares(ShareLedger::new(at, deployer)));
        let token = world.deploy(deployer, |at| Component::Token(FungibleToken::new(at, "TKN", deployer)));

        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let index = world.shares_mut(&book)?.allocate_index();
            let node = world.deploy(deployer, |at| {
                Component::Treasury(Treasury::new(at, index, book, deployer, DEFAULT_MIN_DELAY))
            });
            nodes.push(node);
        }

        for share in shares {
            let node = *nodes.get(share.node).ok_or_else(|| {
                GovernanceError::InvalidParameter(format!("node {} out of range", share.node))
            })?;
            let to = match share.holder {
                TreeHolder::Node(n) => *nodes.get(n).ok_or_else(|| {
                    GovernanceError::InvalidParameter(format!("holder node {} out of range", n))
                })?,
                TreeHolder::Account(a) => a,
            };
            let index = world.treasury(&node)?.index();
            world.send(deployer, book, 0, Call::SharesMint { to, index, units: share.units })?;
        }

        Ok(Self { book, token, nodes })
    }

    /// Mint `amount` tokens to the root and cascade the split down the tree.
    pub fn distribute(&self, world: &mut World, deployer: Address, amount: Amount) -> GovernanceResult<Vec<SplitPlan>> {
        let root = *self
            .nodes
            .first()
            .ok_or_else(|| GovernanceError::InvalidParameter("empty tree".to_string()))?;
        world.send(deployer, self.token, 0, Call::TokenMint { to: root, amount })?;
        world.cascade_split(deployer, root, self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treasury::Controller;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn test_handoff_roles() {
        let mut world = World::default();
        let mut d = Deployment::deploy(&mut world, addr("deployer"), DeploymentConfig::default()).unwrap();
        assert!(!d.is_handed_off());
        d.handoff(&mut world).unwrap();
        assert!(d.is_handed_off());
        let root = d.root_treasury().unwrap();

        let treasury = world.treasury(&root).unwrap();
        assert!(treasury.roles().has_role(Role::Proposer, &d.registry));
        assert!(treasury.roles().has_role(Role::Proposer, &d.governor));
        assert!(treasury.roles().has_role(Role::Executor, &addr("anyone")));
        assert!(!treasury.roles().has_role(Role::Admin, &d.deployer));

        let registry = world.registry(&d.registry).unwrap();
        assert!(registry.roles().has_role(Role::Proposer, &d.governor));
        assert!(!registry.roles().has_role(Role::Admin, &d.deployer));
        assert_eq!(registry.get_valve(0), root);

        assert_eq!(world.store(&d.store).unwrap().owner(), root);
        assert_eq!(world.votes(&d.votes).unwrap().current_votes(&d.deployer, 0), 1_000_000);
    }

    #[test]
    fn test_deployer_locked_out_after_handoff() {
        let mut world = World::default();
        let mut d = Deployment::standard(&mut world, addr("deployer"), DeploymentConfig::default()).unwrap();
        assert!(d.add_treasury(&mut world, 1, d.votes).is_err());
        let err = world
            .send(d.deployer, d.registry, 0, Call::SetValve { index: 1, treasury: addr("x") })
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Unauthorized { role: Role::Admin, .. }));
    }

    #[test]
    fn test_tree_deploy() {
        let mut world = World::default();
        let shares = vec![
            TreeShare { node: 0, holder: TreeHolder::Node(1), units: 1 },
            TreeShare { node: 0, holder: TreeHolder::Account(addr("alice")), units: 1 },
        ];
        let tree = RevenueTree::deploy(&mut world, addr("deployer"), 2, &shares).unwrap();
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(world.treasury(&tree.nodes[1]).unwrap().index(), 1);

        let bad = vec![TreeShare { node: 5, holder: TreeHolder::Node(0), units: 1 }];
        assert!(RevenueTree::deploy(&mut world, addr("deployer"), 2, &bad).is_err());
    }
}
