use crate::error::{LocatorError, Result};
use crate::identity::assign_identity;
use crate::normalize::normalize_map;
use crate::storage::StoreGateway;
use crate::store::StoreRecord;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Outcome counts for one ingestion run.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub sources: usize,
    pub failed_sources: usize,
    /// Records newly saved this run.
    pub records: usize,
    /// Records whose identity already existed; left untouched.
    pub deduped: usize,
}

/// Maps a normalized source mapping onto the canonical store fields. The
/// transcription layer upstream guarantees the well-known upper-cased keys;
/// anything else in the mapping is ignored here.
pub fn record_from_fields(fields: &HashMap<String, String>) -> StoreRecord {
    let field = |key: &str| fields.get(key).and_then(|v| crate::normalize::clean_field(v));
    let mut record = StoreRecord::new();
    record.brand = field("BRAND");
    record.name = field("NAME");
    record.address = field("ADDRESS");
    record.city = field("CITY");
    record.state = field("STATE");
    record.zip = field("ZIP");
    record.phone = field("PHONE");
    record.website = field("WEBSITE");
    record
}

/// Parses one source file into identity-assigned records.
pub fn transcribe_source(path: &Path) -> Result<Vec<StoreRecord>> {
    let bytes = std::fs::read(path)?;
    let raw: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(&bytes)?;

    let mut records = Vec::with_capacity(raw.len());
    for dirty in &raw {
        let mut record = record_from_fields(&normalize_map(dirty));
        assign_identity(&mut record);
        records.push(record);
    }
    Ok(records)
}

/// Ingests every configured source: normalize, assign identity, upsert.
/// A malformed or missing source file fails that source alone; the other
/// sources still run.
#[instrument(skip(gateway, source_names))]
pub async fn run_ingest(
    gateway: Arc<dyn StoreGateway>,
    source_dir: &str,
    source_names: &[String],
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for name in source_names {
        summary.sources += 1;
        let path = Path::new(source_dir).join(format!("{name}.json"));
        let records = match transcribe_source(&path) {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to transcribe source {}: {}", name, e);
                summary.failed_sources += 1;
                continue;
            }
        };

        info!("Loading {} records from source {}...", records.len(), name);
        for record in &records {
            match gateway.find_by_identity(&record.identity).await {
                Ok(_) => {
                    // Identical identity implies identical core fields; the
                    // stored record keeps its error and enrichment state.
                    summary.deduped += 1;
                    continue;
                }
                Err(LocatorError::NotFound(_)) => {}
                Err(e) => {
                    warn!("Lookup failed for {}: {}", record.identity, e);
                }
            }
            if let Err(e) = gateway.upsert(record).await {
                error!("Error saving store {}: {}", record.identity, e);
                continue;
            }
            summary.records += 1;
        }
    }

    info!(
        "Ingested {} records from {} sources ({} merged, {} sources failed)",
        summary.records, summary.sources, summary.deduped, summary.failed_sources
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use serde_json::json;
    use std::io::Write;

    fn write_source(dir: &Path, name: &str, body: &Value) {
        let mut file = std::fs::File::create(dir.join(format!("{name}.json"))).unwrap();
        file.write_all(body.to_string().as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn bad_source_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_source(
            dir.path(),
            "good",
            &json!([{ "brand": "B", "name": "N", "zip": 98103 }]),
        );
        std::fs::write(dir.path().join("bad.json"), b"not json").unwrap();

        let gateway = Arc::new(InMemoryStore::new());
        let summary = run_ingest(
            gateway.clone(),
            dir.path().to_str().unwrap(),
            &["bad".to_string(), "good".to_string(), "missing".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(summary.sources, 3);
        assert_eq!(summary.failed_sources, 2);
        assert_eq!(summary.records, 1);
        assert_eq!(gateway.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn key_case_does_not_affect_transcription() {
        let dir = tempfile::tempdir().unwrap();
        write_source(
            dir.path(),
            "mixed",
            &json!([
                { "Brand": "B", "NAME": "N", "city": "Seattle" },
                { "brand": "B", "name": "N", "CITY": "Seattle" }
            ]),
        );

        let gateway = Arc::new(InMemoryStore::new());
        let summary = run_ingest(
            gateway.clone(),
            dir.path().to_str().unwrap(),
            &["mixed".to_string()],
        )
        .await
        .unwrap();

        // Both rows normalize to the same identity and merge into one record
        assert_eq!(summary.records, 1);
        assert_eq!(summary.deduped, 1);
        assert_eq!(gateway.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reseeding_leaves_existing_records_untouched() {
        let dir = tempfile::tempdir().unwrap();
        write_source(
            dir.path(),
            "acme",
            &json!([{ "brand": "Acme", "name": "Downtown", "city": "Seattle" }]),
        );

        let gateway = Arc::new(InMemoryStore::new());
        let sources = vec!["acme".to_string()];
        run_ingest(gateway.clone(), dir.path().to_str().unwrap(), &sources)
            .await
            .unwrap();

        // Flag the stored record the way transcription or enrichment would
        let mut flagged = gateway.find_all().await.unwrap().remove(0);
        let identity = flagged.identity.clone();
        flagged.error = Some(crate::store::RecordError::Other("store is closed".to_string()));
        gateway.upsert(&flagged).await.unwrap();

        let summary = run_ingest(gateway.clone(), dir.path().to_str().unwrap(), &sources)
            .await
            .unwrap();
        assert_eq!(summary.records, 0);
        assert_eq!(summary.deduped, 1);

        let after = gateway.find_by_identity(&identity).await.unwrap();
        assert_eq!(after.created_at, flagged.created_at);
        assert_eq!(
            after.error,
            Some(crate::store::RecordError::Other("store is closed".to_string()))
        );
    }
}
