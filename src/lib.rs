pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod geocode;
pub mod identity;
pub mod ingest;
pub mod logging;
pub mod normalize;
pub mod storage;
pub mod store;
