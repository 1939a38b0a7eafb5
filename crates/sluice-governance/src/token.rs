//! Plain components that treasuries pay out of and proposals act on.

use std::collections::BTreeMap;

use sluice_types::{Address, Amount};
use tracing::{debug, info};

use crate::access::{Role, RoleTable};
use crate::error::{GovernanceError, GovernanceResult};

/// Single-index fungible token with an owner-only mint.
#[derive(Debug, Clone)]
pub struct FungibleToken {
    address: Address,
    symbol: String,
    roles: RoleTable,
    balances: BTreeMap<Address, Amount>,
    total_supply: Amount,
}

impl FungibleToken {
    pub fn new(address: Address, symbol: impl Into<String>, owner: Address) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            roles: RoleTable::with_admin(address, owner).with_member(Role::Minter, owner),
            balances: BTreeMap::new(),
            total_supply: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn roles_mut(&mut self) -> &mut RoleTable {
        &mut self.roles
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn mint(&mut self, caller: &Address, to: Address, amount: Amount) -> GovernanceResult<()> {
        self.roles.ensure_role(Role::Minter, caller)?;
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        *self.balances.entry(to).or_insert(0) += amount;
        info!(token = %self.symbol, %to, amount, "tokens minted");
        Ok(())
    }

    /// Move `amount` from `caller` to `to`.
    pub fn transfer(&mut self, caller: &Address, to: Address, amount: Amount) -> GovernanceResult<()> {
        let available = self.balance_of(caller);
        if amount > available {
            return Err(GovernanceError::InsufficientBalance {
                index: 0,
                required: amount,
                available,
            });
        }
        self.balances.insert(*caller, available - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        debug!(token = %self.symbol, from = %caller, %to, amount, "tokens transferred");
        Ok(())
    }
}

/// A single governed value ("box"): only its owner may write it.
#[derive(Debug, Clone)]
pub struct ValueStore {
    address: Address,
    owner: Address,
    value: Amount,
}

impl ValueStore {
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            value: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn store(&mut self, caller: &Address, value: Amount) -> GovernanceResult<()> {
        if *caller != self.owner {
            return Err(GovernanceError::NotPermitted(format!(
                "{} is not the owner of {}",
                caller, self.address
            )));
        }
        self.value = value;
        info!(store = %self.address, value, "value changed");
        Ok(())
    }

    pub fn retrieve(&self) -> Amount {
        self.value
    }

    /// Hand the store to a new owner, typically a treasury.
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> GovernanceResult<()> {
        if *caller != self.owner {
            return Err(GovernanceError::NotPermitted(format!(
                "{} is not the owner of {}",
                caller, self.address
            )));
        }
        self.owner = new_owner;
        Ok(())
    }
}
