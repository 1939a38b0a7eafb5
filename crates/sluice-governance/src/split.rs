//! Proportional payout planning.
//!
//! A split is planned in full from a single balance snapshot before any
//! transfer is issued. Each holder receives `floor(balance * units / total)`;
//! the integer remainder goes to the last enumerated holder, so the payouts
//! always add up to the balance exactly.

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use sluice_types::{Address, Amount, Index};

use crate::error::{GovernanceError, GovernanceResult};
use crate::shares::ShareSnapshot;

/// `floor(a * b / c)` without intermediate overflow.
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> GovernanceResult<Amount> {
    if c == 0 {
        return Err(GovernanceError::InvalidParameter("division by zero".to_string()));
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / c);
    }
    let wide = BigUint::from(a) * BigUint::from(b) / BigUint::from(c);
    wide.to_u128().ok_or(GovernanceError::ArithmeticOverflow)
}

/// One transfer in a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub recipient: Address,
    pub amount: Amount,
}

/// Complete payout plan for one split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub index: Index,
    /// Balance the plan was computed from
    pub balance: Amount,
    /// Payouts in holder order, remainder already folded in
    pub payouts: Vec<Payout>,
    /// Round-off assigned to the last holder
    pub remainder: Amount,
}

impl SplitPlan {
    /// Plan the distribution of `balance` over `shares`.
    ///
    /// Fails with `NoShares` when the snapshot has no units. A zero balance
    /// yields a plan of zero payouts.
    pub fn compute(shares: &ShareSnapshot, balance: Amount) -> GovernanceResult<Self> {
        if shares.total_units == 0 || shares.slices.is_empty() {
            return Err(GovernanceError::NoShares(shares.index));
        }

        let mut payouts = Vec::with_capacity(shares.slices.len());
        let mut distributed: Amount = 0;
        for slice in &shares.slices {
            let amount = mul_div(balance, slice.units, shares.total_units)?;
            distributed = distributed
                .checked_add(amount)
                .ok_or(GovernanceError::ArithmeticOverflow)?;
            payouts.push(Payout {
                recipient: slice.holder,
                amount,
            });
        }

        let remainder = balance
            .checked_sub(distributed)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        if let Some(last) = payouts.last_mut() {
            last.amount += remainder;
        }

        Ok(Self {
            index: shares.index,
            balance,
            payouts,
            remainder,
        })
    }

    pub fn total(&self) -> Amount {
        self.payouts.iter().map(|p| p.amount).sum()
    }

    pub fn amount_for(&self, recipient: &Address) -> Amount {
        self.payouts
            .iter()
            .filter(|p| p.recipient == *recipient)
            .map(|p| p.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::ShareSlice;
    use proptest::prelude::*;

    fn snapshot(units: &[Amount]) -> ShareSnapshot {
        let total_units: Amount = units.iter().sum();
        ShareSnapshot {
            index: 0,
            total_units,
            slices: units
                .iter()
                .enumerate()
                .filter(|(_, u)| **u > 0)
                .map(|(i, u)| ShareSlice {
                    holder: Address::from_label(&format!("holder-{i}")),
                    units: *u,
                    ppm: mul_div(*u, 1_000_000, total_units).unwrap(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_three_holder_split() {
        let plan = SplitPlan::compute(&snapshot(&[500_000, 300_000, 200_000]), 1_000_000).unwrap();
        let amounts: Vec<Amount> = plan.payouts.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![500_000, 300_000, 200_000]);
        assert_eq!(plan.remainder, 0);
    }

    #[test]
    fn test_remainder_goes_to_last_holder() {
        let plan = SplitPlan::compute(&snapshot(&[1, 1, 1]), 100).unwrap();
        let amounts: Vec<Amount> = plan.payouts.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![33, 33, 34]);
        assert_eq!(plan.remainder, 1);
        assert_eq!(plan.total(), 100);
    }

    #[test]
    fn test_zero_balance_is_noop_plan() {
        let plan = SplitPlan::compute(&snapshot(&[3, 7]), 0).unwrap();
        assert!(plan.payouts.iter().all(|p| p.amount == 0));
    }

    #[test]
    fn test_no_shares() {
        let err = SplitPlan::compute(&snapshot(&[]), 10).unwrap_err();
        assert_eq!(err, GovernanceError::NoShares(0));
    }

    #[test]
    fn test_mul_div_wide() {
        assert_eq!(mul_div(u128::MAX, 2, 4).unwrap(), u128::MAX / 2);
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX).unwrap(), u128::MAX);
        assert!(mul_div(u128::MAX, 2, 1).is_err());
        assert!(mul_div(1, 1, 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_split_is_exact(
            units in proptest::collection::vec(0u128..1_000_000_000, 1..12),
            balance in any::<u64>(),
        ) {
            let shares = snapshot(&units);
            prop_assume!(shares.total_units > 0);
            let plan = SplitPlan::compute(&shares, balance as Amount).unwrap();
            prop_assert_eq!(plan.total(), balance as Amount);
            // nobody but the last holder gets more than its exact share
            for (p, slice) in plan.payouts.iter().zip(&shares.slices).rev().skip(1) {
                prop_assert_eq!(p.amount, mul_div(balance as Amount, slice.units, shares.total_units).unwrap());
            }
        }
    }
}
