//! Block context supplied by the executing ledger.

/// Partition key for independent governance/treasury domains.
pub type Index = u64;

/// Token and share amounts.
pub type Amount = u128;

/// Height and timestamp of the block a transaction executes in.
///
/// Both values only ever move forward; nothing in the engine assumes a fixed
/// relation between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockContext {
    /// Current block height
    pub height: u64,
    /// Current block timestamp (seconds)
    pub timestamp: u64,
}

impl BlockContext {
    pub const fn new(height: u64, timestamp: u64) -> Self {
        Self { height, timestamp }
    }

    /// Context after `blocks` more blocks, each `block_time` seconds apart.
    pub fn advanced(&self, blocks: u64, block_time: u64) -> Self {
        Self {
            height: self.height.saturating_add(blocks),
            timestamp: self
                .timestamp
                .saturating_add(blocks.saturating_mul(block_time)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advanced_moves_both_clocks() {
        let ctx = BlockContext::new(10, 1_000);
        let next = ctx.advanced(3, 12);
        assert_eq!(next.height, 13);
        assert_eq!(next.timestamp, 1_036);
    }

    #[test]
    fn test_advanced_saturates() {
        let ctx = BlockContext::new(u64::MAX - 1, u64::MAX - 1);
        let next = ctx.advanced(5, 5);
        assert_eq!(next.height, u64::MAX);
        assert_eq!(next.timestamp, u64::MAX);
    }
}
