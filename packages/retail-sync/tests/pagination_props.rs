//! Property tests for pagination termination and extraction uniqueness.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use retail_sync::testing::{page, page_bounds, records, MockGateway, RecordingSink};
use retail_sync::{Endpoint, ExtractionConfig, Extractor, OffsetCursor, PageSource, ResourceDescriptor, StopReason};
use serde_json::{json, Value};
use std::collections::HashSet;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Serves `size` records; the reported total drifts by `drift` per page.
fn drifting_backend(size: usize, first_total: u64, drift: i64) -> MockGateway {
    let items = records("P", 0, size);
    MockGateway::new().with_responder(move |request| {
        let (offset, limit) = page_bounds(&request.path)?;
        let batch: Vec<Value> = items
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        let pages_seen = (offset / limit.max(1)) as i64;
        let total = (first_total as i64 + drift * pages_seen).max(0) as u64;
        Some(page(batch, Some(total)))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn offset_cursor_terminates(
        size in 0usize..400,
        limit in 1u64..60,
        first_total in 0u64..800,
        drift in -50i64..50,
    ) {
        let gateway = drifting_backend(size, first_total, drift);
        let cursor = OffsetCursor::new(limit);

        let run = block_on(cursor.run(&gateway, PageSource::Data { tenant: "t", path: "catalog" }));

        let bound = size as u64 / limit + 1;
        prop_assert!(run.calls as u64 <= bound, "{} calls for {} items at limit {}", run.calls, size, limit);
        prop_assert!(run.items.len() <= size);
        if first_total == 0 || first_total as usize >= size {
            prop_assert_eq!(run.items.len(), size);
        } else {
            prop_assert!(run.items.len() >= first_total as usize);
            prop_assert!(matches!(run.stop, StopReason::ReachedTotal | StopReason::ShortPage));
        }
    }

    #[test]
    fn searchable_extraction_is_duplicate_free(
        ids in prop::collection::vec(0u8..30, 0..80),
        page_size in 1u64..12,
        months in 1u32..6,
    ) {
        let items: Vec<Value> = ids.iter().map(|n| json!({"_id": format!("D{}", n)})).collect();
        let gateway = MockGateway::new().with_dataset("/search/docs/", items, None);

        let mut config = ExtractionConfig::default().without_delays();
        config.page_size = page_size;
        config.search_start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2024, months, 15, 0, 0, 0).unwrap();
        let descriptor = ResourceDescriptor::new("documents", Endpoint::Searchable { path: "docs" }, 2);
        let sink = RecordingSink::new();

        let extraction = block_on(
            Extractor::new(&gateway, "t", &config).at(now).extract(&descriptor, &sink),
        );

        let keys: Vec<String> = extraction
            .records
            .iter()
            .filter_map(|r| r.primary_key("_id"))
            .collect();
        let unique: HashSet<&String> = keys.iter().collect();
        prop_assert_eq!(unique.len(), keys.len());

        let mut expected = Vec::new();
        let mut seen = HashSet::new();
        for n in &ids {
            let key = format!("D{}", n);
            if seen.insert(key.clone()) {
                expected.push(key);
            }
        }
        prop_assert_eq!(keys, expected);
        prop_assert_eq!(extraction.stats.windows, months);
    }
}
