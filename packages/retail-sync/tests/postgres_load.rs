//! Postgres load engine integration tests.
//!
//! Require Docker for the shared testcontainers Postgres.

mod common;

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use common::{TestHarness, TENANT};
use retail_sync::testing::{ok, MockGateway, RecordingSink};
use retail_sync::{
    Catalog, LoadConfig, LoadError, Loader, Orchestrator, PostgresLoader, Record,
    ResourceDescriptor, SyncConfig, SyncError,
};
use serde_json::{json, Value};
use test_context::test_context;

fn descriptor(name: &str) -> ResourceDescriptor {
    *Catalog::standard().get(name).unwrap()
}

fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect()
}

#[test_context(TestHarness)]
#[tokio::test]
async fn replay_only_advances_mutable_columns(ctx: &TestHarness) {
    let stores = descriptor("stores");
    let mut loader = ctx.loader();

    loader.begin_run(&[stores.table.unwrap()]).await.unwrap();
    loader
        .load(
            &stores,
            &records(vec![json!({
                "_id": "S1", "name": "Main", "shortname": "M",
                "balance": {"cash": 10}, "updated": 1
            })]),
        )
        .await
        .unwrap();
    loader.commit_run().await.unwrap();

    loader.begin_run(&[stores.table.unwrap()]).await.unwrap();
    let result = loader
        .load(
            &stores,
            &records(vec![json!({
                "_id": "S1", "name": "Main St", "shortname": "X",
                "balance": {"cash": 25}, "updated": 2
            })]),
        )
        .await
        .unwrap();
    loader.commit_run().await.unwrap();

    assert_eq!(result.inserted_or_updated_count, 1);
    assert_eq!(ctx.count("stores").await, 1);

    let (name, shortname, updated, balance, client): (String, String, i64, Value, String) =
        sqlx::query_as(&format!(
            "SELECT name, shortname, updated, balance, _client FROM {} WHERE _id = $1",
            ctx.table("stores")
        ))
        .bind("S1")
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();

    assert_eq!(name, "Main St");
    assert_eq!(shortname, "M");
    assert_eq!(updated, 2);
    assert_eq!(balance, json!({"cash": 25}));
    assert_eq!(client, TENANT);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn rollback_leaves_no_trace(ctx: &TestHarness) {
    let stores = descriptor("stores");
    let mut loader = ctx.loader();

    loader.begin_run(&[stores.table.unwrap()]).await.unwrap();
    loader
        .load(&stores, &records(vec![json!({"_id": "S1"}), json!({"_id": "S2"})]))
        .await
        .unwrap();
    loader.rollback_run().await.unwrap();

    // Schema preparation shares the run transaction
    assert!(!ctx.table_exists("stores").await);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn dangling_reference_is_reported(ctx: &TestHarness) {
    let stores = descriptor("stores");
    let documents = descriptor("documents");
    let mut loader = ctx.loader();

    loader
        .begin_run(&[stores.table.unwrap(), documents.table.unwrap()])
        .await
        .unwrap();
    loader
        .load(&stores, &records(vec![json!({"_id": "S1"})]))
        .await
        .unwrap();

    let err = loader
        .load(
            &documents,
            &records(vec![
                json!({"_id": "D1", "store": "S1"}),
                json!({"_id": "D2", "store": "S404"}),
            ]),
        )
        .await
        .unwrap_err();
    loader.rollback_run().await.unwrap();

    match err {
        LoadError::DanglingReference { column, missing, .. } => {
            assert_eq!(column, "store");
            assert_eq!(missing, vec!["S404".to_string()]);
        }
        other => panic!("expected dangling reference, got {:?}", other),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn chunk_boundaries_do_not_change_the_outcome(ctx: &TestHarness) {
    let products = descriptor("products");
    let config = LoadConfig {
        chunk_size: 2,
        ..ctx.load_config()
    };
    let mut loader = PostgresLoader::new(ctx.db_pool.clone(), config, TENANT);

    let batch: Vec<Value> = (0..5)
        .map(|n| json!({"_id": format!("P{}", n), "name": format!("Product {}", n), "price": n * 10}))
        .collect();

    loader.begin_run(&[products.table.unwrap()]).await.unwrap();
    let first = loader.load(&products, &records(batch.clone())).await.unwrap();
    let second = loader.load(&products, &records(batch)).await.unwrap();
    loader.commit_run().await.unwrap();

    assert_eq!(first.inserted_or_updated_count, 5);
    assert_eq!(second.inserted_or_updated_count, 5);
    assert_eq!(ctx.count("products").await, 5);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn structured_and_numeric_fields_survive(ctx: &TestHarness) {
    let documents = descriptor("documents");
    let stores = descriptor("stores");
    let mut loader = ctx.loader();

    loader
        .begin_run(&[stores.table.unwrap(), documents.table.unwrap()])
        .await
        .unwrap();
    loader
        .load(&stores, &records(vec![json!({"_id": "S1"})]))
        .await
        .unwrap();
    loader
        .load(
            &documents,
            &records(vec![json!({
                "_id": "D1",
                "store": "S1",
                "sum": "20.50",
                "status": 1,
                "products": [{"_id": "P1", "qty": 2, "nested": {"deep": [1, 2]}}]
            })]),
        )
        .await
        .unwrap();
    loader.commit_run().await.unwrap();

    let (sum, status, products): (String, bool, Value) = sqlx::query_as(&format!(
        "SELECT sum::text, status, products FROM {} WHERE _id = 'D1'",
        ctx.table("documents")
    ))
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();

    assert_eq!(sum, "20.50");
    assert!(status);
    assert_eq!(products, json!([{"_id": "P1", "qty": 2, "nested": {"deep": [1, 2]}}]));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn full_run_loads_documents_after_stores(ctx: &TestHarness) {
    let mut config = SyncConfig::for_tenant("t");
    config.extraction = config.extraction.without_delays();
    config.extraction.search_start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    let gateway = MockGateway::new()
        .with_fixed(
            "/data/t/stores",
            ok(json!([{"_id": "S1"}, {"_id": "S2"}, {"_id": "S3"}])),
        )
        .with_dataset(
            "/search/docs/",
            vec![
                json!({"_id": "D1", "store": "S1"}),
                json!({"_id": "D2", "store": "S2"}),
            ],
            Some(2),
        );
    let catalog = Catalog::standard().select(&["stores", "documents"]).unwrap();
    let sink = RecordingSink::new();
    let orchestrator = Orchestrator::new(config, catalog, gateway, Arc::new(sink))
        .at(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());

    let mut loader = ctx.loader();
    let report = orchestrator.run(&mut loader).await.unwrap();

    assert!(report.committed);
    assert_eq!(ctx.count("stores").await, 3);
    assert_eq!(ctx.count("documents").await, 2);

    let orphans: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} d WHERE NOT EXISTS (SELECT 1 FROM {} s WHERE s._id = d.store)",
        ctx.table("documents"),
        ctx.table("stores")
    ))
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(orphans, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failed_run_keeps_previous_state(ctx: &TestHarness) {
    let stores = descriptor("stores");
    let mut loader = ctx.loader();
    loader.begin_run(&[stores.table.unwrap()]).await.unwrap();
    loader
        .load(&stores, &records(vec![json!({"_id": "S1", "name": "Before"})]))
        .await
        .unwrap();
    loader.commit_run().await.unwrap();

    let mut config = SyncConfig::for_tenant("t");
    config.extraction = config.extraction.without_delays();
    let gateway = MockGateway::new()
        .with_fixed("/data/t/stores", ok(json!([{"_id": "S1", "name": "After"}])))
        .with_fixed("/data/t/accounts", ok(json!([{"_id": "A1"}])))
        .with_dataset(
            "/search/money/",
            vec![json!({"_id": "M1", "account": "A404"})],
            None,
        );
    let catalog = Catalog::standard()
        .select(&["stores", "accounts", "money_movements"])
        .unwrap();
    let orchestrator = Orchestrator::new(config, catalog, gateway, Arc::new(RecordingSink::new()))
        .at(Utc.with_ymd_and_hms(2017, 1, 20, 0, 0, 0).unwrap());

    let err = orchestrator.run(&mut loader).await.unwrap_err();
    assert!(matches!(err, SyncError::Load { ref resource, .. } if resource == "money_movements"));

    let name: String = sqlx::query_scalar(&format!(
        "SELECT name FROM {} WHERE _id = 'S1'",
        ctx.table("stores")
    ))
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    assert_eq!(name, "Before");
    assert!(!ctx.table_exists("accounts").await);
}
