//! Admission control: payment, credentials, price lock and solvency.
//!
//! Every step is a hard gate. A failure returns immediately and nothing after
//! it runs, so a request without a payment never reaches the verifier, and a
//! request with bad credentials never touches the ledger. No fees are charged
//! here; the dispatcher debits only after the job succeeds.

use std::sync::Arc;

use axum::http::HeaderMap;
use orch_core::credentials::{CredentialVerifier, CREDENTIALS_HEADER};
use orch_core::error::CoreError;
use orch_core::estimation::OutputUnits;
use orch_core::job::JobRequest;
use orch_core::ledger::Ledger;
use orch_core::payment::{PaymentTicketBatch, Sender, PAYMENT_HEADER};
use orch_core::price::Price;
use orch_core::session::ManifestId;

/// The outcome of a successful admission.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    /// Billing principal for this request.
    pub sender: Sender,
    /// Pricing session of the job's (capability, model).
    pub manifest_id: ManifestId,
    /// The session's established price, not necessarily the one the caller
    /// declared.
    pub price: Price,
    /// Estimated billable output of the job.
    pub units: OutputUnits,
}

/// Gates jobs on payment validity and solvency before any compute is spent.
pub struct AdmissionController {
    ledger: Arc<dyn Ledger>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AdmissionController {
    pub fn new(ledger: Arc<dyn Ledger>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { ledger, verifier }
    }

    /// Run the admission gates for `job` using the request `headers`.
    pub async fn admit(&self, headers: &HeaderMap, job: &JobRequest) -> Result<Admission, CoreError> {
        let payment = PaymentTicketBatch::from_header(header_str(headers, PAYMENT_HEADER))?;
        let sender = payment.sender()?;

        self.verifier
            .verify(header_str(headers, CREDENTIALS_HEADER), &sender)
            .await?;

        let units = job.output_units()?;
        let manifest_id = ManifestId::for_job(job.capability(), job.model_id());

        // All jobs for one (capability, model) share a session, so the first
        // processed payment fixes the price for every later caller until the
        // process restarts.
        let price = self.ledger.process_payment(&payment, &manifest_id).await?;

        if price.is_positive() && !self.ledger.sufficient_balance(&sender, &manifest_id).await {
            return Err(CoreError::InsufficientBalance);
        }

        tracing::debug!(
            sender = %sender,
            manifest_id = %manifest_id,
            price = %price,
            units = units.get(),
            "Request admitted",
        );

        Ok(Admission {
            sender,
            manifest_id,
            price,
            units,
        })
    }
}

/// A header value as text; non-UTF-8 values count as absent.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
