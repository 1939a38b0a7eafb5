//! Index to treasury mapping ("valve multi").
//!
//! The governor queues through the registry: it must hold the proposer role
//! here, and the registry must hold the proposer role on the resolved
//! treasury.

use std::collections::BTreeMap;

use sluice_types::{Address, Index};
use tracing::info;

use crate::access::{Role, RoleTable};
use crate::error::{GovernanceError, GovernanceResult};
use crate::timelock::Timelock;
use crate::treasury::Controller;

#[derive(Debug, Clone)]
pub struct TreasuryRegistry {
    address: Address,
    roles: RoleTable,
    timelock: Timelock,
    valves: BTreeMap<Index, Address>,
}

impl TreasuryRegistry {
    pub fn new(address: Address, admin: Address, min_delay: u64) -> Self {
        Self {
            address,
            roles: RoleTable::with_admin(address, admin),
            timelock: Timelock::new(min_delay),
            valves: BTreeMap::new(),
        }
    }

    /// Map `index` to `treasury`. Requires the admin role, which the registry
    /// always holds on itself.
    pub fn set_valve(&mut self, caller: &Address, index: Index, treasury: Address) -> GovernanceResult<()> {
        self.roles.ensure_role(Role::Admin, caller)?;
        let previous = self.valves.insert(index, treasury);
        info!(index, %treasury, previous = ?previous, "treasury mapped");
        Ok(())
    }

    /// Treasury for `index`, `Address::ZERO` when unset.
    pub fn get_valve(&self, index: Index) -> Address {
        self.valves.get(&index).copied().unwrap_or(Address::ZERO)
    }

    pub fn resolve(&self, index: Index) -> GovernanceResult<Address> {
        match self.valves.get(&index) {
            Some(treasury) if !treasury.is_zero() => Ok(*treasury),
            _ => Err(GovernanceError::IndexNotConfigured(index)),
        }
    }

    pub fn valves(&self) -> impl Iterator<Item = (Index, Address)> + '_ {
        self.valves.iter().map(|(i, a)| (*i, *a))
    }
}

impl Controller for TreasuryRegistry {
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
