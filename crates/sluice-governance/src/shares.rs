//! Share ledger ("book") recording each index's beneficiaries.
//!
//! Share units carry no history: percentages are always evaluated against the
//! live balances. Holders are enumerated in the order they first received
//! units at an index.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sluice_types::{Address, Amount, Index};
use tracing::{debug, info};

use crate::access::{Role, RoleTable};
use crate::error::{GovernanceError, GovernanceResult};
use crate::split::mul_div;

/// Parts-per-million denominator used by [`ShareSlice::ppm`].
pub const PPM: Amount = 1_000_000;

#[derive(Debug, Clone, Default)]
struct ShareBook {
    balances: BTreeMap<Address, Amount>,
    holders: Vec<Address>,
    total: Amount,
}

impl ShareBook {
    fn credit(&mut self, to: Address, units: Amount) -> GovernanceResult<()> {
        let balance = self.balances.entry(to).or_insert(0);
        *balance = balance
            .checked_add(units)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        if !self.holders.contains(&to) {
            self.holders.push(to);
        }
        Ok(())
    }
}

/// A holder's claim at one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSlice {
    pub holder: Address,
    pub units: Amount,
    /// Rounded-down share of the total in parts per million
    pub ppm: Amount,
}

/// Live ownership percentages at an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSnapshot {
    pub index: Index,
    pub total_units: Amount,
    /// Holders with non-zero units, in insertion order
    pub slices: Vec<ShareSlice>,
}

impl ShareSnapshot {
    pub fn empty(index: Index) -> Self {
        Self {
            index,
            total_units: 0,
            slices: Vec::new(),
        }
    }

    /// Build a snapshot from `(holder, units)` pairs already in enumeration
    /// order. Zero-unit holders are dropped.
    pub fn from_ordered(
        index: Index,
        total_units: Amount,
        holders: impl IntoIterator<Item = (Address, Amount)>,
    ) -> Self {
        let slices = holders
            .into_iter()
            .filter(|(_, units)| *units > 0)
            .map(|(holder, units)| ShareSlice {
                holder,
                units,
                ppm: mul_div(units, PPM, total_units).unwrap_or(0),
            })
            .collect();
        Self {
            index,
            total_units,
            slices,
        }
    }

    /// Sum of the listed units. Equals `total_units` for a consistent ledger.
    pub fn listed_units(&self) -> Amount {
        self.slices.iter().map(|s| s.units).sum()
    }
}

/// Anything a treasury can read ownership percentages from.
pub trait ShareSource {
    fn return_percents(&self, index: Index) -> ShareSnapshot;
}

/// Multi-index ledger of share units.
#[derive(Debug, Clone)]
pub struct ShareLedger {
    address: Address,
    roles: RoleTable,
    books: BTreeMap<Index, ShareBook>,
    operators: BTreeMap<Address, BTreeSet<Address>>,
    next_index: Index,
}

impl ShareLedger {
    /// Create a ledger at `address`; `owner` becomes admin and minter.
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            roles: RoleTable::with_admin(address, owner).with_member(Role::Minter, owner),
            books: BTreeMap::new(),
            operators: BTreeMap::new(),
            next_index: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    pub fn roles_mut(&mut self) -> &mut RoleTable {
        &mut self.roles
    }

    /// Next index a new treasury would receive.
    pub fn next_index(&self) -> Index {
        self.next_index
    }

    /// Reserve a fresh index for a new treasury.
    pub fn allocate_index(&mut self) -> Index {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    pub fn balance_of(&self, account: &Address, index: Index) -> Amount {
        self.books
            .get(&index)
            .and_then(|b| b.balances.get(account).copied())
            .unwrap_or(0)
    }

    pub fn total_units(&self, index: Index) -> Amount {
        self.books.get(&index).map(|b| b.total).unwrap_or(0)
    }

    /// Every account that ever held units at `index`, in insertion order.
    pub fn holders(&self, index: Index) -> Vec<Address> {
        self.books
            .get(&index)
            .map(|b| b.holders.clone())
            .unwrap_or_default()
    }

    /// Mint `units` for `to` at `index`. Caller must hold the minter role.
    pub fn mint(
        &mut self,
        caller: &Address,
        to: Address,
        index: Index,
        units: Amount,
    ) -> GovernanceResult<()> {
        self.roles.ensure_role(Role::Minter, caller)?;
        if to.is_zero() {
            return Err(GovernanceError::InvalidParameter("mint to zero address".to_string()));
        }
        let book = self.books.entry(index).or_default();
        book.total = book
            .total
            .checked_add(units)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        book.credit(to, units)?;
        if index >= self.next_index {
            self.next_index = index + 1;
        }
        info!(index, %to, units, "share units minted");
        Ok(())
    }

    /// Move `units` from `from` to `to` at `index`.
    pub fn transfer(
        &mut self,
        caller: &Address,
        from: Address,
        to: Address,
        index: Index,
        units: Amount,
    ) -> GovernanceResult<()> {
        if *caller != from && !self.is_approved_for_all(&from, caller) {
            return Err(GovernanceError::NotPermitted(format!(
                "{} is neither owner nor approved operator of {}",
                caller, from
            )));
        }
        if to.is_zero() {
            return Err(GovernanceError::InvalidParameter(
                "transfer to zero address".to_string(),
            ));
        }
        let available = self.balance_of(&from, index);
        if units > available {
            return Err(GovernanceError::InsufficientBalance {
                index,
                required: units,
                available,
            });
        }

        let book = self.books.entry(index).or_default();
        book.balances.insert(from, available - units);
        book.credit(to, units)?;
        debug!(index, %from, %to, units, "share units transferred");
        Ok(())
    }

    pub fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool) {
        let set = self.operators.entry(owner).or_default();
        if approved {
            set.insert(operator);
        } else {
            set.remove(&operator);
        }
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operators
            .get(owner)
            .map(|s| s.contains(operator))
            .unwrap_or(false)
    }
}

impl ShareSource for ShareLedger {
    /// Ownership percentages at `index` derived from current balances.
    fn return_percents(&self, index: Index) -> ShareSnapshot {
        match self.books.get(&index) {
            Some(book) => ShareSnapshot::from_ordered(
                index,
                book.total,
                book.holders
                    .iter()
                    .map(|h| (*h, book.balances.get(h).copied().unwrap_or(0))),
            ),
            None => ShareSnapshot::empty(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn book() -> ShareLedger {
        ShareLedger::new(addr("book"), addr("owner"))
    }

    #[test]
    fn test_percents_in_insertion_order() {
        let mut b = book();
        b.mint(&addr("owner"), addr("carol"), 0, 200_000).unwrap();
        b.mint(&addr("owner"), addr("alice"), 0, 500_000).unwrap();
        b.mint(&addr("owner"), addr("bob"), 0, 300_000).unwrap();

        let snap = b.return_percents(0);
        assert_eq!(snap.total_units, 1_000_000);
        assert_eq!(snap.listed_units(), 1_000_000);
        let holders: Vec<Address> = snap.slices.iter().map(|s| s.holder).collect();
        assert_eq!(holders, vec![addr("carol"), addr("alice"), addr("bob")]);
        let ppm: Vec<Amount> = snap.slices.iter().map(|s| s.ppm).collect();
        assert_eq!(ppm, vec![200_000, 500_000, 300_000]);
    }

    #[test]
    fn test_emptied_holder_is_skipped_but_keeps_position() {
        let mut b = book();
        b.mint(&addr("owner"), addr("alice"), 0, 10).unwrap();
        b.mint(&addr("owner"), addr("bob"), 0, 10).unwrap();
        b.transfer(&addr("alice"), addr("alice"), addr("bob"), 0, 10).unwrap();

        let snap = b.return_percents(0);
        assert_eq!(snap.slices.len(), 1);
        assert_eq!(snap.slices[0].holder, addr("bob"));
        assert_eq!(snap.listed_units(), snap.total_units);

        b.transfer(&addr("bob"), addr("bob"), addr("alice"), 0, 5).unwrap();
        let holders: Vec<Address> = b.return_percents(0).slices.iter().map(|s| s.holder).collect();
        assert_eq!(holders, vec![addr("alice"), addr("bob")]);
    }

    #[test]
    fn test_transfer_checks() {
        let mut b = book();
        b.mint(&addr("owner"), addr("alice"), 0, 10).unwrap();
        assert!(matches!(
            b.transfer(&addr("alice"), addr("alice"), addr("bob"), 0, 11),
            Err(GovernanceError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            b.transfer(&addr("bob"), addr("alice"), addr("bob"), 0, 1),
            Err(GovernanceError::NotPermitted(_))
        ));
        assert_eq!(b.total_units(0), 10);
    }

    #[test]
    fn test_mint_requires_minter() {
        let mut b = book();
        assert!(b.mint(&addr("alice"), addr("alice"), 0, 1).is_err());
    }

    #[test]
    fn test_index_allocation_tracks_mints() {
        let mut b = book();
        assert_eq!(b.allocate_index(), 0);
        assert_eq!(b.allocate_index(), 1);
        b.mint(&addr("owner"), addr("alice"), 5, 1).unwrap();
        assert_eq!(b.next_index(), 6);
    }

    #[test]
    fn test_unknown_index_is_empty() {
        let snap = book().return_percents(42);
        assert_eq!(snap.total_units, 0);
        assert!(snap.slices.is_empty());
    }
}
