//! Sluice Types - Core type definitions shared by the governance engine.
//!
//! This crate provides:
//! - Addresses (20-byte account identifiers)
//! - Hashes (32-byte blake3 digests, domain-separated by what they identify)
//! - Block context (height and timestamp oracle)

pub mod address;
pub mod context;
pub mod error;
pub mod hash;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use context::{Amount, BlockContext, Index};
pub use error::TypesError;
pub use hash::{Hash, HashDomain, TaggedHasher};
