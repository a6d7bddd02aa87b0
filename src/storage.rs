use crate::error::{LocatorError, Result};
use crate::store::{Location, StoreRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Keyed record store consumed by the pipeline. Stores and locations live in
/// separate keyspaces joined by the record identity; `find_all` never
/// performs the join, callers go through `find_location` when they need it.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    async fn find_all(&self) -> Result<Vec<StoreRecord>>;
    async fn find_by_identity(&self, identity: &str) -> Result<StoreRecord>;
    /// Inserts or replaces the record under its identity. When the record
    /// carries a location, the location row is written through as well.
    async fn upsert(&self, record: &StoreRecord) -> Result<()>;
    async fn find_location(&self, identity: &str) -> Result<Option<Location>>;
}

/// In-memory gateway for tests and ephemeral runs.
pub struct InMemoryStore {
    stores: Arc<Mutex<HashMap<String, StoreRecord>>>,
    locations: Arc<Mutex<HashMap<String, Location>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            stores: Arc::new(Mutex::new(HashMap::new())),
            locations: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreGateway for InMemoryStore {
    async fn find_all(&self) -> Result<Vec<StoreRecord>> {
        let stores = self.stores.lock().unwrap();
        Ok(stores
            .values()
            .map(|record| {
                let mut record = record.clone();
                record.location = None;
                record
            })
            .collect())
    }

    async fn find_by_identity(&self, identity: &str) -> Result<StoreRecord> {
        let stores = self.stores.lock().unwrap();
        stores
            .get(identity)
            .cloned()
            .ok_or_else(|| LocatorError::NotFound(identity.to_string()))
    }

    async fn upsert(&self, record: &StoreRecord) -> Result<()> {
        if let Some(location) = &record.location {
            let mut locations = self.locations.lock().unwrap();
            locations.insert(record.identity.clone(), location.clone());
        }

        let mut stored = record.clone();
        stored.location = None;
        let mut stores = self.stores.lock().unwrap();
        stores.insert(record.identity.clone(), stored);

        debug!("Upserted store {}", record.identity);
        Ok(())
    }

    async fn find_location(&self, identity: &str) -> Result<Option<Location>> {
        let locations = self.locations.lock().unwrap();
        Ok(locations.get(identity).cloned())
    }
}

/// Durable gateway backed by two JSON documents under a data directory,
/// loaded once at open and written through on every upsert.
pub struct JsonFileStore {
    dir: PathBuf,
    stores: Mutex<HashMap<String, StoreRecord>>,
    locations: Mutex<HashMap<String, Location>>,
}

impl JsonFileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let stores = Self::load(&dir.join("stores.json"))?;
        let locations = Self::load(&dir.join("locations.json"))?;
        debug!(
            "Opened JSON store at {} with {} records",
            dir.display(),
            stores.len()
        );
        Ok(Self {
            dir,
            stores: Mutex::new(stores),
            locations: Mutex::new(locations),
        })
    }

    fn load<T: serde::de::DeserializeOwned>(path: &Path) -> Result<HashMap<String, T>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save<T: serde::Serialize>(&self, name: &str, map: &HashMap<String, T>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        fs::write(self.dir.join(name), bytes)?;
        Ok(())
    }
}

#[async_trait]
impl StoreGateway for JsonFileStore {
    async fn find_all(&self) -> Result<Vec<StoreRecord>> {
        let stores = self.stores.lock().unwrap();
        Ok(stores.values().cloned().collect())
    }

    async fn find_by_identity(&self, identity: &str) -> Result<StoreRecord> {
        let stores = self.stores.lock().unwrap();
        stores
            .get(identity)
            .cloned()
            .ok_or_else(|| LocatorError::NotFound(identity.to_string()))
    }

    async fn upsert(&self, record: &StoreRecord) -> Result<()> {
        if let Some(location) = &record.location {
            let mut locations = self.locations.lock().unwrap();
            locations.insert(record.identity.clone(), location.clone());
            self.save("locations.json", &*locations)?;
        }

        let mut stored = record.clone();
        stored.location = None;
        let mut stores = self.stores.lock().unwrap();
        stores.insert(record.identity.clone(), stored);
        self.save("stores.json", &*stores)?;
        Ok(())
    }

    async fn find_location(&self, identity: &str) -> Result<Option<Location>> {
        let locations = self.locations.lock().unwrap();
        Ok(locations.get(identity).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordError;

    fn record(identity: &str) -> StoreRecord {
        let mut record = StoreRecord::new();
        record.identity = identity.to_string();
        record.name = Some("Store".to_string());
        record
    }

    #[tokio::test]
    async fn upsert_replaces_by_identity() {
        let store = InMemoryStore::new();
        store.upsert(&record("abc")).await.unwrap();

        let mut updated = record("abc");
        updated.error = Some(RecordError::Other("store is closed".to_string()));
        store.upsert(&updated).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].error.is_some());
    }

    #[tokio::test]
    async fn location_lives_in_its_own_keyspace() {
        let store = InMemoryStore::new();
        let mut with_location = record("abc");
        with_location.location = Some(Location {
            store_identity: "abc".to_string(),
            query_address: "1 Main St, Seattle, WA".to_string(),
            latitude: 47.6,
            longitude: -122.3,
        });
        store.upsert(&with_location).await.unwrap();

        // find_all never joins the location back in
        let all = store.find_all().await.unwrap();
        assert!(all[0].location.is_none());

        let location = store.find_location("abc").await.unwrap().unwrap();
        assert_eq!(location.latitude, 47.6);
        assert_eq!(store.find_location("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_by_identity_reports_missing_records() {
        let store = InMemoryStore::new();
        let err = store.find_by_identity("nope").await.unwrap_err();
        assert!(matches!(err, LocatorError::NotFound(_)));
    }

    #[tokio::test]
    async fn json_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            let mut with_location = record("abc");
            with_location.location = Some(Location {
                store_identity: "abc".to_string(),
                query_address: "1 Main St".to_string(),
                latitude: 1.0,
                longitude: 2.0,
            });
            store.upsert(&with_location).await.unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let found = reopened.find_by_identity("abc").await.unwrap();
        assert_eq!(found.name.as_deref(), Some("Store"));
        let location = reopened.find_location("abc").await.unwrap().unwrap();
        assert_eq!(location.longitude, 2.0);
    }
}
