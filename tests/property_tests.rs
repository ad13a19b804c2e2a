//! Property-based tests
//!
//! These tests verify:
//! - The boot command-line rewrite keeps existing tokens intact
//! - Module name matching treats '-' and '_' alike and nothing else

use haos_agent::boot_cmdline::{append_token, WIPE_DIRECTIVE};
use haos_agent::kernel_module::{listing_contains, same_module_name};
use proptest::prelude::*;

/// Strategy for space-separated kernel command lines with optional trailing whitespace
fn cmdline_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z][a-z0-9_.]{0,10}(=[a-zA-Z0-9/,._-]{1,12})?", 0..8),
        "[ \t\n]{0,3}",
    )
        .prop_map(|(tokens, trailing)| format!("{}{}", tokens.join(" "), trailing))
}

proptest! {
    /// Existing tokens survive as a prefix and exactly one directive is added
    #[test]
    fn append_preserves_existing_tokens(cmdline in cmdline_strategy()) {
        let updated = String::from_utf8(append_token(cmdline.as_bytes(), WIPE_DIRECTIVE))
            .expect("ASCII in, ASCII out");
        let before: Vec<&str> = cmdline.split_whitespace().collect();
        let after: Vec<&str> = updated.split_whitespace().collect();

        prop_assert_eq!(after.len(), before.len() + 1);
        prop_assert_eq!(&after[..before.len()], &before[..]);
        prop_assert_eq!(after[before.len()], WIPE_DIRECTIVE);
        prop_assert!(updated.ends_with(WIPE_DIRECTIVE));
        prop_assert!(updated.starts_with(cmdline.trim_end()));
    }

    /// Repeated appends never dedup
    #[test]
    fn append_is_not_deduplicated(cmdline in cmdline_strategy(), times in 1usize..4) {
        let mut updated = cmdline.clone();
        for _ in 0..times {
            updated = String::from_utf8(append_token(updated.as_bytes(), WIPE_DIRECTIVE))
                .expect("ASCII in, ASCII out");
        }
        let count = updated.split_whitespace().filter(|t| *t == WIPE_DIRECTIVE).count();
        let existing = cmdline.split_whitespace().filter(|t| *t == WIPE_DIRECTIVE).count();
        prop_assert_eq!(count, existing + times);
    }

    /// Arbitrary bytes before the trailing whitespace are kept unchanged
    #[test]
    fn append_keeps_arbitrary_bytes(
        body in prop::collection::vec(any::<u8>(), 0..64),
        trailing in "[ \t\n]{0,3}",
    ) {
        let mut cmdline = body.clone();
        cmdline.extend_from_slice(trailing.as_bytes());
        let updated = append_token(&cmdline, WIPE_DIRECTIVE);

        let kept = body.trim_ascii_end();
        prop_assert!(updated.starts_with(kept));
        prop_assert!(updated.ends_with(WIPE_DIRECTIVE.as_bytes()));
    }

    /// Swapping '-' and '_' never changes whether names match
    #[test]
    fn module_name_separator_insensitive(name in "[a-z][a-z0-9_-]{0,15}") {
        let dashed = name.replace('_', "-");
        let underscored = name.replace('-', "_");
        prop_assert!(same_module_name(&dashed, &underscored));
        prop_assert!(same_module_name(&name, &name));
    }

    /// A listing line is found by its first field only
    #[test]
    fn listing_matches_first_field(name in "[a-z][a-z0-9_]{0,15}", size in 1u32..1_000_000) {
        let listing = format!("{name} {size} 0 - Live 0x0000000000000000\n");
        prop_assert!(listing_contains(&listing, &name));
        let other = format!("{name}x");
        prop_assert!(!listing_contains(&listing, &other));
    }
}
