//! Property tests for checkpoint movement under failures.

use proptest::prelude::*;

use cti_catalog::core::{chunk_ranges, ConsumerKey, ContentType};
use cti_catalog::store::{DocumentStore, Query};
use cti_catalog::sync::SyncConfig;
use cti_catalog_testkit::generators::{change_log, chunk_size};
use cti_catalog_testkit::{content_profile, TestFixture};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Checkpoints never move backwards, only land on chunk ends, and a
    /// failed chunk leaves the checkpoint at the previous chunk end.
    #[test]
    fn checkpoint_is_monotonic(
        log in change_log(6, 60),
        size in chunk_size(),
        fail_at in any::<prop::sample::Index>(),
    ) {
        let key = ConsumerKey::new("ctx", "rules");
        let last = log.last().map(|o| o.offset).unwrap_or(0);
        let ranges = chunk_ranges(0, last, size);
        let failing = ranges[fail_at.index(ranges.len())];

        let (first, second) = runtime().block_on(async {
            let fx = TestFixture::with_config(SyncConfig { max_changes: size, ..SyncConfig::default() });
            fx.catalog.push_offsets(&key, log.clone()).await;
            fx.catalog.fail_changes_from(&key, failing.0).await;

            let sync = fx.synchronizer(content_profile("rules", key.clone(), &[ContentType::Rule]));
            let failed = sync.sync().await.is_err();
            (failed, fx.offsets.offsets(&key))
        });

        prop_assert!(first);
        let ends: Vec<u64> = ranges.iter().map(|r| r.1).collect();
        for pair in second.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        for offset in &second {
            prop_assert!(ends.contains(offset));
        }
        prop_assert_eq!(second.last().copied().unwrap_or(0), failing.0);
    }

    /// Applying a log in one cycle or chunk by chunk ends in the same state.
    #[test]
    fn chunking_does_not_change_result(log in change_log(5, 40), size in chunk_size()) {
        let key = ConsumerKey::new("ctx", "rules");
        let index = key.index_name(ContentType::Rule);

        let run = |max_changes: u64| {
            let log = log.clone();
            let key = key.clone();
            let index = index.clone();
            runtime().block_on(async move {
                let fx = TestFixture::with_config(SyncConfig { max_changes, ..SyncConfig::default() });
                fx.catalog.push_offsets(&key, log).await;
                let sync = fx.synchronizer(content_profile("rules", key, &[ContentType::Rule]));
                let outcome = sync.sync().await.unwrap();
                let hits = fx.store.search(&index, &Query::MatchAll, 1000).await.unwrap();
                (outcome.new_offset, hits)
            })
        };

        prop_assert_eq!(run(size), run(10_000));
    }
}
