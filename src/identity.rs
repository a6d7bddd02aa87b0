use crate::normalize::clean_field;
use crate::store::StoreRecord;
use sha2::{Digest, Sha256};

/// Assigns the content-hash identity to a record that does not yet carry one.
///
/// Re-running ingestion over unchanged source data must never mint a new
/// identity for an already-known store, so a record arriving with an identity
/// keeps it untouched. Otherwise the eight core fields are re-cleaned and
/// digested in fixed order; absent fields contribute nothing, which makes
/// absence part of the identity.
pub fn assign_identity(record: &mut StoreRecord) {
    if !record.identity.is_empty() {
        return;
    }

    for field in [
        &mut record.brand,
        &mut record.name,
        &mut record.address,
        &mut record.city,
        &mut record.state,
        &mut record.zip,
        &mut record.phone,
        &mut record.website,
    ] {
        *field = field.as_deref().and_then(clean_field);
    }

    let mut hasher = Sha256::new();
    for field in [
        &record.brand,
        &record.name,
        &record.address,
        &record.city,
        &record.state,
        &record.zip,
        &record.phone,
        &record.website,
    ] {
        hasher.update(field.as_deref().unwrap_or("").as_bytes());
    }
    record.identity = hex::encode(hasher.finalize());
}
