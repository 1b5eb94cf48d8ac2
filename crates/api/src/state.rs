use std::sync::Arc;

use orch_compute::ComputeBackend;
use orch_core::credentials::CredentialVerifier;
use orch_core::ledger::Ledger;

use crate::config::ServerConfig;
use crate::engine::admission::AdmissionController;
use crate::engine::dispatcher::JobDispatcher;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Payment, credential and solvency gate.
    pub admission: Arc<AdmissionController>,
    /// Runs admitted jobs and settles their fees.
    pub dispatcher: Arc<JobDispatcher>,
}

impl AppState {
    /// Wire the pipeline around its external collaborators.
    ///
    /// The same `ledger` is shared by admission and billing.
    pub fn new(
        config: ServerConfig,
        ledger: Arc<dyn Ledger>,
        verifier: Arc<dyn CredentialVerifier>,
        compute: Arc<dyn ComputeBackend>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            admission: Arc::new(AdmissionController::new(Arc::clone(&ledger), verifier)),
            dispatcher: Arc::new(JobDispatcher::new(ledger, compute)),
        }
    }
}
