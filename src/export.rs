use crate::error::Result;
use crate::storage::StoreGateway;
use crate::store::StoreRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Wire shape for one exported store. Absent fields are omitted rather than
/// rendered as empty strings; the location object is always present.
#[derive(Debug, Serialize)]
pub struct ExportedStore {
    #[serde(rename = "_key_")]
    pub identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub location: ExportedLocation,
}

#[derive(Debug, Default, Serialize)]
pub struct ExportedLocation {
    pub latitude: f64,
    pub longitude: f64,
}

fn project(record: StoreRecord, location: ExportedLocation) -> ExportedStore {
    ExportedStore {
        identity: record.identity,
        brand: record.brand,
        name: record.name,
        address: record.address,
        city: record.city,
        state: record.state,
        zip: record.zip,
        phone: record.phone,
        website: record.website,
        location,
    }
}

/// Assembles the exportable subset: error-free records, joined with their
/// locations, in lexicographic identity order.
#[instrument(skip(gateway))]
pub async fn assemble(gateway: Arc<dyn StoreGateway>) -> Result<Vec<ExportedStore>> {
    let mut records: Vec<StoreRecord> = gateway
        .find_all()
        .await?
        .into_iter()
        .filter(|record| record.error.is_none())
        .collect();
    records.sort_by(|a, b| a.identity.cmp(&b.identity));

    let mut exported = Vec::with_capacity(records.len());
    for record in records {
        let location = match gateway.find_location(&record.identity).await {
            Ok(Some(location)) => ExportedLocation {
                latitude: location.latitude,
                longitude: location.longitude,
            },
            Ok(None) => ExportedLocation::default(),
            Err(e) => {
                warn!("Error fetching location for {}: {}", record.identity, e);
                continue;
            }
        };
        exported.push(project(record, location));
    }
    Ok(exported)
}

/// Serializes the exportable subset as pretty-printed JSON. serde_json keeps
/// punctuation and URLs literal, so nothing needs unescaping downstream.
pub async fn to_json(gateway: Arc<dyn StoreGateway>) -> Result<Vec<u8>> {
    let exported = assemble(gateway).await?;
    info!("Rendering {} stores in JSON format...", exported.len());
    Ok(serde_json::to_vec_pretty(&exported)?)
}

/// Writes the export to `<output_dir>/stores.json`, creating the directory
/// when absent. Returns the written path.
pub async fn to_file(gateway: Arc<dyn StoreGateway>, output_dir: &str) -> Result<PathBuf> {
    let bytes = to_json(gateway).await?;
    let dir = Path::new(output_dir);
    std::fs::create_dir_all(dir)?;
    let path = dir.join("stores.json");
    std::fs::write(&path, bytes)?;
    info!("Exported JSON to file: {}", path.display());
    Ok(path)
}
