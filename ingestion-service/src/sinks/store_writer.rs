use seismic_client::domain::SeismicRecord;

use crate::{
    pipeline::{Envelope, PipelineError, Sink, WriteSummary},
    sinks::{PutOutcome, RecordStore},
};

/// Writes records one at a time with first-write-wins semantics.
///
/// A failed write is logged and counted; the rest of the batch still runs.
pub struct StoreSink<C> {
    store: C,
}

impl<C: RecordStore> StoreSink<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn into_store(self) -> C {
        self.store
    }
}

#[async_trait::async_trait]
impl<C: RecordStore> Sink<SeismicRecord> for StoreSink<C> {
    async fn write(&self, batch: &[Envelope<SeismicRecord>]) -> Result<WriteSummary, PipelineError> {
        let mut summary = WriteSummary::default();

        for env in batch {
            let record = &env.payload;
            summary.attempted += 1;

            match self.store.put_if_absent(record).await {
                Ok(PutOutcome::Written) => {
                    summary.written += 1;
                    metrics::counter!("store_written_total").increment(1);
                    tracing::info!(id = %record.id, magnitude = %record.magnitude, "record saved");
                }
                Ok(PutOutcome::AlreadyExists) => {
                    summary.already_exists += 1;
                    metrics::counter!("store_already_exists_total").increment(1);
                    tracing::info!(id = %record.id, "record already stored");
                }
                Err(e) => {
                    summary.failed += 1;
                    metrics::counter!("store_write_errors_total").increment(1);
                    tracing::error!(error = %e, id = %record.id, "record write failed, skipping");
                }
            }
        }

        tracing::info!(
            table = self.store.table(),
            attempted = summary.attempted,
            written = summary.written,
            already_exists = summary.already_exists,
            failed = summary.failed,
            "saved {}/{}",
            summary.written,
            summary.attempted
        );

        Ok(summary)
    }
}
