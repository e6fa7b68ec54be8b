//! Chain-selector registry.
//!
//! Channels address their destination chain by selector, a stable 64-bit
//! identifier that is independent of the chain's own numbering scheme. A
//! channel whose selector is unknown here is not reportable.

/// Selector used by tests and local wiring. Never assigned to a real chain.
pub const TEST_CHAIN_SELECTOR: u64 = 17_903_773_265_040_444_395;

/// Chain id reported for [`TEST_CHAIN_SELECTOR`].
pub const TEST_CHAIN_ID: u64 = 90_000_001;

// Selector table, ascending by selector. Extend as destinations launch.
const CHAIN_SELECTORS: &[(u64, u64)] = &[
    (3_734_403_246_176_062_136, 10),          // OP Mainnet
    (4_051_577_828_743_386_545, 137),         // Polygon
    (4_949_039_107_694_359_620, 42_161),      // Arbitrum One
    (5_009_297_550_715_157_269, 1),           // Ethereum
    (6_433_500_567_565_415_381, 43_114),      // Avalanche
    (11_344_663_589_394_136_015, 56),         // BNB Chain
    (14_767_482_510_784_806_043, 43_113),     // Avalanche Fuji
    (15_971_525_489_660_198_786, 8_453),      // Base
    (16_015_286_601_757_825_753, 11_155_111), // Ethereum Sepolia
    (TEST_CHAIN_SELECTOR, TEST_CHAIN_ID),
];

/// Resolves a chain selector to the destination chain's own id.
///
/// Returns `None` for unknown selectors.
pub fn chain_id_from_selector(selector: u64) -> Option<u64> {
    CHAIN_SELECTORS
        .binary_search_by_key(&selector, |(sel, _)| *sel)
        .ok()
        .map(|idx| CHAIN_SELECTORS[idx].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors_resolve() {
        assert_eq!(chain_id_from_selector(5_009_297_550_715_157_269), Some(1));
        assert_eq!(
            chain_id_from_selector(16_015_286_601_757_825_753),
            Some(11_155_111)
        );
        assert_eq!(chain_id_from_selector(TEST_CHAIN_SELECTOR), Some(TEST_CHAIN_ID));
    }

    #[test]
    fn test_unknown_selector_is_none() {
        assert_eq!(chain_id_from_selector(0), None);
        assert_eq!(chain_id_from_selector(u64::MAX), None);
    }

    #[test]
    fn test_table_is_sorted_for_binary_search() {
        for pair in CHAIN_SELECTORS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }
}
