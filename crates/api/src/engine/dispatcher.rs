//! Job dispatch and usage billing.
//!
//! Submits an admitted job to the compute backend and, only when it
//! succeeds, debits the estimated output volume at the session price. A
//! failed job is not charged and the ticket value already credited during
//! admission is not refunded; it stays on the sender's session balance.

use std::sync::Arc;
use std::time::Instant;

use orch_compute::{ComputeBackend, ImageResponse};
use orch_core::error::CoreError;
use orch_core::job::JobRequest;
use orch_core::ledger::Ledger;

use crate::engine::admission::Admission;

/// Runs admitted jobs and settles their fees exactly once.
pub struct JobDispatcher {
    ledger: Arc<dyn Ledger>,
    compute: Arc<dyn ComputeBackend>,
}

impl JobDispatcher {
    pub fn new(ledger: Arc<dyn Ledger>, compute: Arc<dyn ComputeBackend>) -> Self {
        Self { ledger, compute }
    }

    /// Execute `job` and debit its fees on success.
    pub async fn dispatch(
        &self,
        admission: &Admission,
        job: &JobRequest,
    ) -> Result<ImageResponse, CoreError> {
        let start = Instant::now();
        let response = self
            .compute
            .submit(job)
            .await
            .map_err(|e| CoreError::ComputeFailed(e.to_string()))?;
        let took = start.elapsed();

        tracing::info!(took_ms = took.as_millis() as u64, "Processed request");

        // Billed volume is height * width * frames. If inference steps or
        // other cost drivers become caller-configurable this formula needs
        // to account for them.
        let fee = self
            .ledger
            .debit_fees(
                &admission.sender,
                &admission.manifest_id,
                admission.price,
                admission.units,
            )
            .await;

        tracing::info!(
            sender = %admission.sender,
            manifest_id = %admission.manifest_id,
            units = admission.units.get(),
            price = %admission.price,
            fee = %fee,
            "Debited fees",
        );

        Ok(response)
    }
}
