use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Failure annotation carried by a store record.
///
/// Only `Location` failures are eligible for reprocessing on the next
/// enrichment run; any other failure sticks until edited away. Both kinds
/// exclude the record from export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordError {
    /// Geocoding failed (provider error or zero candidates).
    Location(String),
    /// Any other per-record problem, e.g. flagged during transcription.
    Other(String),
}

impl RecordError {
    pub fn is_location(&self) -> bool {
        matches!(self, RecordError::Location(_))
    }
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::Location(msg) => write!(f, "location error: {msg}"),
            RecordError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// Geographic coordinate owned 1:1 by a store record. Persisted as a
/// separate entity keyed by the owning record's identity; the pipeline
/// joins it back through `StoreGateway::find_location`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub store_identity: String,
    /// The address string sent to the geocode provider.
    pub query_address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Canonical store entity keyed by a content-hash identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Content-hash primary key; empty until assigned, immutable after.
    #[serde(default)]
    pub identity: String,
    pub brand: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// Join result, populated on demand; storage keeps locations separately.
    #[serde(skip)]
    pub location: Option<Location>,
    pub error: Option<RecordError>,
    pub created_at: DateTime<Utc>,
}

impl StoreRecord {
    pub fn new() -> Self {
        Self {
            identity: String::new(),
            brand: None,
            name: None,
            address: None,
            city: None,
            state: None,
            zip: None,
            phone: None,
            website: None,
            location: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Builds the provider query string from the present address parts,
    /// joined with ", " in address, city, state order.
    pub fn query_address(&self) -> String {
        let parts: Vec<&str> = [&self.address, &self.city, &self.state]
            .iter()
            .filter_map(|part| part.as_deref())
            .collect();
        parts.join(", ")
    }
}

impl Default for StoreRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StoreRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn synopsis(input: &Option<String>) -> &str {
            input.as_deref().unwrap_or("-")
        }
        write!(
            f,
            "<{}: {} | {} | {}>",
            self.identity,
            synopsis(&self.brand),
            synopsis(&self.name),
            synopsis(&self.address),
        )
    }
}
