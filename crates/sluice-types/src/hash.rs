use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// What a digest identifies.
///
/// Each domain hashes under its own blake3 key-derivation context, so a
/// proposal id can never equal an operation id built from the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashDomain {
    /// Free-form proposal description
    Description,
    /// Proposal id over index, calls and description hash
    Proposal,
    /// Timelock operation id
    Operation,
    /// Component address derivation
    Contract,
}

impl HashDomain {
    pub const fn context(self) -> &'static str {
        match self {
            HashDomain::Description => "sluice 2025-01 proposal description",
            HashDomain::Proposal => "sluice 2025-01 proposal id",
            HashDomain::Operation => "sluice 2025-01 timelock operation id",
            HashDomain::Contract => "sluice 2025-01 component address",
        }
    }
}

/// 32-byte blake3 digest identifying proposals, operations and descriptions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Self = Self([0u8; 32]);
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Plain, untagged digest. Used for salts and seeds.
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest of `parts` under `domain`. Every part is length-prefixed, so
    /// `["ab", "c"]` and `["a", "bc"]` hash differently.
    pub fn tagged(domain: HashDomain, parts: &[&[u8]]) -> Self {
        let mut hasher = TaggedHasher::new(domain);
        for part in parts {
            hasher.part(part);
        }
        hasher.finish()
    }

    /// Id of a proposal description.
    pub fn description(text: &str) -> Self {
        Self::tagged(HashDomain::Description, &[text.as_bytes()])
    }

    /// First eight bytes, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

/// Incremental form of [`Hash::tagged`] for inputs with a variable number of
/// parts.
pub struct TaggedHasher(blake3::Hasher);

impl TaggedHasher {
    pub fn new(domain: HashDomain) -> Self {
        Self(blake3::Hasher::new_derive_key(domain.context()))
    }

    pub fn part(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(&(bytes.len() as u64).to_be_bytes());
        self.0.update(bytes);
        self
    }

    pub fn finish(&self) -> Hash {
        Hash(*self.0.finalize().as_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}..)", self.short())
    }
}

impl FromStr for Hash {
    type Err = TypesError;

    /// Accepts 64 hex digits with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypesError::InvalidHashLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
