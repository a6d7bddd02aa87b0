use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use store_locator::enrich::EnrichmentPipeline;
use store_locator::error::Result as LocatorResult;
use store_locator::export;
use store_locator::geocode::{Candidate, GeocodeProvider};
use store_locator::ingest::run_ingest;
use store_locator::storage::{InMemoryStore, StoreGateway};

struct FixedGeocoder;

#[async_trait]
impl GeocodeProvider for FixedGeocoder {
    async fn geocode(&self, _address: &str) -> LocatorResult<Vec<Candidate>> {
        Ok(vec![Candidate {
            latitude: 47.6062,
            longitude: -122.3321,
        }])
    }
}

fn write_source(dir: &std::path::Path, name: &str, body: &serde_json::Value) -> Result<()> {
    std::fs::write(dir.join(format!("{name}.json")), body.to_string())?;
    Ok(())
}

#[tokio::test]
async fn ingestion_dedupes_and_reruns_are_idempotent() -> Result<()> {
    let temp = tempdir()?;
    // Three raw rows, two of which normalize to the same store
    write_source(
        temp.path(),
        "acme",
        &json!([
            { "brand": "Acme", "name": "Downtown", "address": "1  Main   St", "city": "Seattle", "state": "WA" },
            { "BRAND": "Acme", "Name": "Downtown", "ADDRESS": " 1 Main St ", "City": "Seattle", "STATE": "WA" },
            { "brand": "Acme", "name": "Uptown", "address": "9 Pine St", "city": "Seattle", "state": "WA" }
        ]),
    )?;

    let gateway: Arc<dyn StoreGateway> = Arc::new(InMemoryStore::new());
    let sources = vec!["acme".to_string()];
    let source_dir = temp.path().to_str().unwrap();

    let first = run_ingest(gateway.clone(), source_dir, &sources).await?;
    assert_eq!(first.records, 2);
    assert_eq!(first.deduped, 1);
    assert_eq!(gateway.find_all().await?.len(), 2);

    // Re-running over unchanged source data mints no new identities and
    // leaves the existing records alone
    let second = run_ingest(gateway.clone(), source_dir, &sources).await?;
    assert_eq!(second.records, 0);
    assert_eq!(second.deduped, 3);
    assert_eq!(gateway.find_all().await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn full_pipeline_seeds_enriches_and_exports() -> Result<()> {
    let temp = tempdir()?;
    write_source(
        temp.path(),
        "acme",
        &json!([
            { "brand": "Acme", "name": "Downtown", "address": "1 Main St", "city": "Seattle", "state": "WA", "zip": 98101 },
            { "brand": "Acme", "name": "Uptown", "address": "9 Pine St", "city": "Seattle", "state": "WA", "zip": 98101 }
        ]),
    )?;

    let gateway: Arc<dyn StoreGateway> = Arc::new(InMemoryStore::new());
    run_ingest(
        gateway.clone(),
        temp.path().to_str().unwrap(),
        &["acme".to_string()],
    )
    .await?;

    let pipeline = EnrichmentPipeline::new(
        gateway.clone(),
        Arc::new(FixedGeocoder),
        Duration::from_millis(1),
    );
    let summary = pipeline.run().await?;
    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.located, 2);

    // A second run finds nothing left to geocode
    let summary = pipeline.run().await?;
    assert_eq!(summary.submitted, 0);

    let exported = export::assemble(gateway.clone()).await?;
    assert_eq!(exported.len(), 2);
    assert!(exported[0].identity < exported[1].identity);
    for store in &exported {
        assert_eq!(store.location.latitude, 47.6062);
        assert_eq!(store.zip.as_deref(), Some("98101"));
    }

    let output_dir = temp.path().join("results");
    let path = export::to_file(gateway, output_dir.to_str().unwrap()).await?;
    let text = std::fs::read_to_string(path)?;
    assert!(text.contains("\"_key_\""));
    assert!(text.contains("-122.3321"));

    Ok(())
}
