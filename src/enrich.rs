use crate::error::Result;
use crate::geocode::GeocodeProvider;
use crate::storage::StoreGateway;
use crate::store::{Location, RecordError, StoreRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

/// Depth of the producer/worker hand-off queue. Small on purpose so record
/// selection blocks instead of buffering the whole table in memory.
const QUEUE_DEPTH: usize = 10;

/// Cooperative stop signal for a running pipeline. Cancelling stops further
/// dequeuing; the in-flight geocode call still completes and persists so a
/// result already paid for against the provider quota is never dropped.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome counts for one enrichment run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub scanned: usize,
    pub submitted: usize,
    pub located: usize,
    pub failed: usize,
}

/// Scans persisted records and geocodes the ones still missing a valid
/// location. One producer selects and enqueues, one worker calls the
/// provider, persists each outcome and honors the inter-call delay.
pub struct EnrichmentPipeline {
    gateway: Arc<dyn StoreGateway>,
    geocoder: Arc<dyn GeocodeProvider>,
    delay: Duration,
}

impl EnrichmentPipeline {
    pub fn new(
        gateway: Arc<dyn StoreGateway>,
        geocoder: Arc<dyn GeocodeProvider>,
        delay: Duration,
    ) -> Self {
        Self {
            gateway,
            geocoder,
            delay,
        }
    }

    /// A record is eligible exactly when it is Unlocated: either a prior
    /// run left a location failure on it, or it carries no error and no
    /// persisted location (a failed location fetch counts as missing).
    /// Records flagged with a non-location error are never retried here.
    async fn needs_geocoding(&self, record: &StoreRecord) -> bool {
        match &record.error {
            Some(RecordError::Location(_)) => true,
            Some(RecordError::Other(_)) => false,
            None => !matches!(
                self.gateway.find_location(&record.identity).await,
                Ok(Some(_))
            ),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<EnrichmentSummary> {
        self.run_with_cancel(CancelToken::new()).await
    }

    /// Runs the pipeline to completion, returning only after the worker has
    /// drained the queue and persisted its last outcome.
    pub async fn run_with_cancel(&self, cancel: CancelToken) -> Result<EnrichmentSummary> {
        // Only a failure to read the initial record set is fatal.
        let records = self.gateway.find_all().await?;
        let scanned = records.len();

        let (tx, rx) = mpsc::channel::<StoreRecord>(QUEUE_DEPTH);
        let worker = tokio::spawn(geocode_worker(
            self.gateway.clone(),
            self.geocoder.clone(),
            rx,
            self.delay,
            cancel.clone(),
        ));

        let mut submitted = 0usize;
        for record in records {
            if cancel.is_cancelled() {
                break;
            }
            if self.needs_geocoding(&record).await {
                // Blocks when the worker falls behind (backpressure).
                if tx.send(record).await.is_err() {
                    break;
                }
                submitted += 1;
            }
        }
        drop(tx);

        let (located, failed) = worker.await?;
        let summary = EnrichmentSummary {
            scanned,
            submitted,
            located,
            failed,
        };
        info!(
            "Enrichment complete: {} scanned, {} submitted, {} located, {} failed",
            summary.scanned, summary.submitted, summary.located, summary.failed
        );
        Ok(summary)
    }
}

async fn geocode_worker(
    gateway: Arc<dyn StoreGateway>,
    geocoder: Arc<dyn GeocodeProvider>,
    mut rx: mpsc::Receiver<StoreRecord>,
    delay: Duration,
    cancel: CancelToken,
) -> (usize, usize) {
    let mut located = 0usize;
    let mut failed = 0usize;

    while !cancel.is_cancelled() {
        let Some(mut record) = rx.recv().await else {
            break;
        };

        let address = record.query_address();
        match geocoder.geocode(&address).await {
            Ok(candidates) => match candidates.first() {
                Some(candidate) => {
                    info!(
                        "Location received for {}: {}, {}",
                        record.identity, candidate.latitude, candidate.longitude
                    );
                    record.location = Some(Location {
                        store_identity: record.identity.clone(),
                        query_address: address,
                        latitude: candidate.latitude,
                        longitude: candidate.longitude,
                    });
                    record.error = None;
                    located += 1;
                }
                None => {
                    warn!("Geocode for {} returned no results", record.identity);
                    record.error = Some(RecordError::Location("returned no results".to_string()));
                    failed += 1;
                }
            },
            Err(e) => {
                warn!("Error geocoding store {}: {}", record.identity, e);
                record.error = Some(RecordError::Location(e.to_string()));
                failed += 1;
            }
        }

        // A persistence failure never rolls back the provider call; the
        // record stays stale until the next run.
        if let Err(e) = gateway.upsert(&record).await {
            error!("Error saving store {}: {}", record.identity, e);
        }

        // Unconditional inter-call delay, success or failure alike.
        tokio::time::sleep(delay).await;
    }

    info!("All store locations handled");
    (located, failed)
}
