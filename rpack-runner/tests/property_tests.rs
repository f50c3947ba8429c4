//! Property tests for retry timing and artifact addressing.
//!
//! 1. Backoff doubles per retry and adds at most 10% jitter
//! 2. Artifact paths ignore ticker case
//! 3. Missing artifacts always produce the rebuild hint

use std::time::Duration;

use proptest::prelude::*;
use rpack_runner::{display, ArtifactStore, RetryPolicy};

fn arb_ticker() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,5}"
}

proptest! {
    #[test]
    fn backoff_stays_within_jitter_band(base_ms in 1u64..2_000, retry in 1u32..6) {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(base_ms),
        };
        let exp = Duration::from_millis(base_ms) * 2u32.pow(retry - 1);
        let jitter_cap = Duration::from_millis((exp.as_millis() as u64 / 10).max(1));

        let delay = policy.backoff(retry);
        prop_assert!(delay >= exp);
        prop_assert!(delay < exp + jitter_cap);
    }

    #[test]
    fn artifact_path_is_case_insensitive(ticker in arb_ticker()) {
        let store = ArtifactStore::new("packs");
        let lower = store.path_for(&ticker.to_ascii_lowercase()).unwrap();
        let upper = store.path_for(&ticker.to_ascii_uppercase()).unwrap();
        prop_assert_eq!(&lower, &upper);
        let expected = format!("{}.json", ticker.to_ascii_uppercase());
        prop_assert!(lower.ends_with(expected));
    }

    #[test]
    fn missing_artifact_suggests_build(ticker in arb_ticker()) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let message = display::show(&store, &ticker).unwrap_err();
        prop_assert_eq!(message, display::not_found_message(&ticker));
        let expected_suffix = format!("rpack build {}", ticker.to_ascii_uppercase());
        prop_assert!(display::not_found_message(&ticker).ends_with(&expected_suffix));
    }
}
