//! Role-based authorization shared by every component.
//!
//! Each component owns one `RoleTable` mapping a role to the set of accounts
//! holding it. A component is always an implicit admin of itself, so once the
//! deployer's admin role is revoked only a governed self-call can change the
//! table again.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sluice_types::Address;
use tracing::{info, warn};

use crate::error::{GovernanceError, GovernanceResult};

/// Capabilities that can be granted on a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May grant and revoke roles
    Admin,
    /// May schedule timelocked operations
    Proposer,
    /// May execute ready operations. Granting it to `Address::ZERO` opens
    /// execution to everyone.
    Executor,
    /// May mint ledger units
    Minter,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN_ROLE",
            Role::Proposer => "PROPOSER_ROLE",
            Role::Executor => "EXECUTOR_ROLE",
            Role::Minter => "MINTER_ROLE",
        }
    }
}

/// Role membership for a single component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    component: Address,
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl RoleTable {
    /// Table for `component` with no explicit members.
    pub fn new(component: Address) -> Self {
        Self {
            component,
            members: BTreeMap::new(),
        }
    }

    /// Table for `component` with `admin` holding the admin role.
    pub fn with_admin(component: Address, admin: Address) -> Self {
        let mut table = Self::new(component);
        table.members.entry(Role::Admin).or_default().insert(admin);
        table
    }

    /// Builder-style membership used at construction time.
    pub fn with_member(mut self, role: Role, account: Address) -> Self {
        self.members.entry(role).or_default().insert(account);
        self
    }

    pub fn component(&self) -> Address {
        self.component
    }

    /// Check membership, including the component's implicit admin role and
    /// the open executor sentinel.
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        if role == Role::Admin && *account == self.component {
            return true;
        }
        let Some(set) = self.members.get(&role) else {
            return false;
        };
        set.contains(account) || (role == Role::Executor && set.contains(&Address::ZERO))
    }

    pub fn ensure_role(&self, role: Role, account: &Address) -> GovernanceResult<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            warn!(component = %self.component, %account, role = role.name(), "role check failed");
            Err(GovernanceError::Unauthorized {
                account: *account,
                role,
                component: self.component,
            })
        }
    }

    /// Grant `role` to `account`. Caller must be an admin.
    /// Returns false when the account already held the role.
    pub fn grant_role(&mut self, caller: &Address, role: Role, account: Address) -> GovernanceResult<bool> {
        self.ensure_role(Role::Admin, caller)?;
        let inserted = self.members.entry(role).or_default().insert(account);
        if inserted {
            info!(component = %self.component, %account, role = role.name(), "role granted");
        }
        Ok(inserted)
    }

    /// Revoke `role` from `account`. Caller must be an admin.
    /// Returns false when the account did not hold the role.
    pub fn revoke_role(&mut self, caller: &Address, role: Role, account: Address) -> GovernanceResult<bool> {
        self.ensure_role(Role::Admin, caller)?;
        Ok(self.remove(role, &account))
    }

    /// Drop a role the caller holds itself.
    pub fn renounce_role(&mut self, caller: &Address, role: Role) -> bool {
        self.remove(role, caller)
    }

    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn remove(&mut self, role: Role, account: &Address) -> bool {
        let removed = self
            .members
            .get_mut(&role)
            .map(|set| set.remove(account))
            .unwrap_or(false);
        if removed {
            info!(component = %self.component, %account, role = role.name(), "role revoked");
        }
        removed
    }
}
