use crate::error::TypesError;
use crate::hash::{Hash, HashDomain};
use std::fmt;
use std::str::FromStr;

/// 20-byte account identifier.
///
/// Accounts are opaque to the governance engine: they are only ever compared
/// for equality and used as map keys. Display format is lowercase hex with a
/// `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Sentinel for "unset" mappings and for the open executor role.
    pub const ZERO: Self = Self([0u8; 20]);
    pub const LEN: usize = 20;

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Create from a byte slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != Self::LEN {
            return Err(TypesError::InvalidAddressLength(slice.len()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Derive an address from arbitrary seed bytes.
    /// `address = blake3(seed)[0..20]`
    pub fn derive(seed: &[u8]) -> Self {
        Self::truncate(&Hash::compute(seed))
    }

    /// Human-friendly account derived from a label ("alice", "deployer").
    pub fn from_label(label: &str) -> Self {
        Self::derive(label.as_bytes())
    }

    /// Address of the `nonce`-th component deployed by `deployer`.
    pub fn contract(deployer: &Address, nonce: u64) -> Self {
        Self::truncate(&Hash::tagged(
            HashDomain::Contract,
            &[deployer.as_bytes(), &nonce.to_be_bytes()],
        ))
    }

    fn truncate(hash: &Hash) -> Self {
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash.as_bytes()[..20]);
        Self(addr)
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Convert to hex string without 0x prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| TypesError::InvalidAddressFormat(s.to_string()))?;
        let bytes = hex::decode(digits)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
