//! Shared test harness: recording collaborators and request helpers.
//!
//! The app under test is built with [`build_app_router`] so integration tests
//! exercise the same middleware stack production uses. The ledger, verifier
//! and compute backend are wrapped to record every call the pipeline makes.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use orch_api::config::{ServerConfig, DEFAULT_MAX_BODY_BYTES};
use orch_api::router::build_app_router;
use orch_api::state::AppState;
use orch_compute::{ComputeBackend, ComputeError, ImageResponse};
use orch_core::capability::Capability;
use orch_core::credentials::{CredentialVerifier, HmacCredentialVerifier, CREDENTIALS_HEADER};
use orch_core::error::CoreError;
use orch_core::estimation::OutputUnits;
use orch_core::job::{
    ImageToImageParams, ImageToVideoParams, JobRequest, TextToImageParams, TextToVideoParams,
};
use orch_core::ledger::{InMemoryLedger, Ledger, LedgerConfig};
use orch_core::payment::{
    PaymentTicketBatch, Sender, TicketParams, TicketSenderParams, PAYMENT_HEADER,
};
use orch_core::price::Price;
use orch_core::session::ManifestId;
use tower::ServiceExt;

pub const SENDER: &str = "0x00000000000000000000000000000000000000aa";
pub const AUTH_SECRET: &str = "test-secret";
pub const BOUNDARY: &str = "orch-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        worker_url: "http://127.0.0.1:1".to_string(),
        auth_secret: AUTH_SECRET.to_string(),
        orch_address: None,
        min_price: None,
    }
}

// ---------------------------------------------------------------------------
// Recording ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCall {
    LockOrGetPrice(ManifestId),
    ProcessPayment(ManifestId),
    SufficientBalance(ManifestId),
    Debit {
        manifest_id: ManifestId,
        price: Price,
        units: OutputUnits,
    },
}

/// [`InMemoryLedger`] that records every call made to it.
pub struct RecordingLedger {
    pub inner: InMemoryLedger,
    calls: Mutex<Vec<LedgerCall>>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self {
            inner: InMemoryLedger::new(LedgerConfig::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn debits(&self) -> Vec<LedgerCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, LedgerCall::Debit { .. }))
            .collect()
    }

    fn record(&self, call: LedgerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Ledger for RecordingLedger {
    async fn lock_or_get_price(&self, manifest_id: &ManifestId, declared: Price) -> Price {
        self.record(LedgerCall::LockOrGetPrice(manifest_id.clone()));
        self.inner.lock_or_get_price(manifest_id, declared).await
    }

    async fn process_payment(
        &self,
        payment: &PaymentTicketBatch,
        manifest_id: &ManifestId,
    ) -> Result<Price, CoreError> {
        self.record(LedgerCall::ProcessPayment(manifest_id.clone()));
        self.inner.process_payment(payment, manifest_id).await
    }

    async fn sufficient_balance(&self, sender: &Sender, manifest_id: &ManifestId) -> bool {
        self.record(LedgerCall::SufficientBalance(manifest_id.clone()));
        self.inner.sufficient_balance(sender, manifest_id).await
    }

    async fn debit_fees(
        &self,
        sender: &Sender,
        manifest_id: &ManifestId,
        price: Price,
        units: OutputUnits,
    ) -> i128 {
        self.record(LedgerCall::Debit {
            manifest_id: manifest_id.clone(),
            price,
            units,
        });
        self.inner.debit_fees(sender, manifest_id, price, units).await
    }

    async fn balance(&self, sender: &Sender, manifest_id: &ManifestId) -> Option<i128> {
        self.inner.balance(sender, manifest_id).await
    }
}

// ---------------------------------------------------------------------------
// Counting verifier
// ---------------------------------------------------------------------------

/// [`HmacCredentialVerifier`] that counts verification attempts.
pub struct CountingVerifier {
    pub inner: HmacCredentialVerifier,
    calls: AtomicUsize,
}

impl CountingVerifier {
    pub fn new() -> Self {
        Self {
            inner: HmacCredentialVerifier::new(AUTH_SECRET),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialVerifier for CountingVerifier {
    async fn verify(&self, header: Option<&str>, sender: &Sender) -> Result<(), CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(header, sender).await
    }
}

// ---------------------------------------------------------------------------
// Mock compute backend
// ---------------------------------------------------------------------------

/// Compute backend returning a canned result and recording submitted jobs.
pub struct MockCompute {
    result: Result<ImageResponse, String>,
    jobs: Mutex<Vec<Capability>>,
}

impl MockCompute {
    pub fn succeeding(response: ImageResponse) -> Self {
        Self {
            result: Ok(response),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<Capability> {
        self.jobs.lock().unwrap().clone()
    }

    fn run(&self, job: JobRequest) -> Result<ImageResponse, ComputeError> {
        self.jobs.lock().unwrap().push(job.capability());
        self.result.clone().map_err(ComputeError::Backend)
    }
}

#[async_trait]
impl ComputeBackend for MockCompute {
    async fn text_to_image(&self, p: &TextToImageParams) -> Result<ImageResponse, ComputeError> {
        self.run(JobRequest::TextToImage(p.clone()))
    }

    async fn image_to_image(&self, p: &ImageToImageParams) -> Result<ImageResponse, ComputeError> {
        self.run(JobRequest::ImageToImage(p.clone()))
    }

    async fn image_to_video(&self, p: &ImageToVideoParams) -> Result<ImageResponse, ComputeError> {
        self.run(JobRequest::ImageToVideo(p.clone()))
    }

    async fn text_to_video(&self, p: &TextToVideoParams) -> Result<ImageResponse, ComputeError> {
        self.run(JobRequest::TextToVideo(p.clone()))
    }
}

/// A typical worker result, with fields this gateway does not model at both
/// the top level and per image.
pub fn sample_response_json() -> serde_json::Value {
    serde_json::json!({
        "images": [
            {
                "url": "https://worker.example/out/0.png",
                "seed": 1234,
                "nsfw": false,
                "content_type": "image/png"
            },
            { "url": "https://worker.example/out/1.png" }
        ],
        "worker": "gpu-0"
    })
}

pub fn sample_response() -> ImageResponse {
    serde_json::from_value(sample_response_json()).unwrap()
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// The app plus handles on its recording collaborators.
pub struct TestApp {
    pub app: Router,
    pub ledger: Arc<RecordingLedger>,
    pub verifier: Arc<CountingVerifier>,
    pub compute: Arc<MockCompute>,
}

impl TestApp {
    pub fn new(compute: MockCompute) -> Self {
        let ledger = Arc::new(RecordingLedger::new());
        let verifier = Arc::new(CountingVerifier::new());
        let compute = Arc::new(compute);

        let state = AppState::new(
            test_config(),
            ledger.clone(),
            verifier.clone(),
            compute.clone(),
        );

        Self {
            app: build_app_router(state),
            ledger,
            verifier,
            compute,
        }
    }

    pub fn succeeding() -> Self {
        Self::new(MockCompute::succeeding(sample_response()))
    }

    /// Valid credential header for [`SENDER`].
    pub fn credentials(&self) -> String {
        self.verifier
            .inner
            .issue(&Sender::parse(SENDER).unwrap(), "test-session", 300)
    }

    /// Send a request through a clone of the app.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// POST a JSON job with valid credentials and the given payment.
    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
        payment: Option<String>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .header(CREDENTIALS_HEADER, self.credentials());
        if let Some(payment) = payment {
            builder = builder.header(PAYMENT_HEADER, payment);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// POST a multipart job with valid credentials and the given payment.
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        image: Option<&[u8]>,
        payment: Option<String>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(CREDENTIALS_HEADER, self.credentials());
        if let Some(payment) = payment {
            builder = builder.header(PAYMENT_HEADER, payment);
        }
        let body = multipart_body(fields, image);
        self.send(builder.body(Body::from(body)).unwrap()).await
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A single-ticket batch from [`SENDER`] worth 1_000_000 wei.
pub fn payment(price: Price, nonce: u32) -> PaymentTicketBatch {
    PaymentTicketBatch {
        sender: SENDER.into(),
        recipient: "0x00000000000000000000000000000000000000ff".into(),
        expected_price: price,
        ticket_params: TicketParams {
            face_value: 1_000_000,
            win_prob_ppm: 1_000_000,
            recipient_rand_hash: "c0ffee".into(),
            expiration_unix: i64::MAX,
        },
        tickets: vec![TicketSenderParams {
            sender_nonce: nonce,
            signature: "0xsig".into(),
        }],
    }
}

pub fn payment_header(price: Price, nonce: u32) -> Option<String> {
    Some(payment(price, nonce).encode_header())
}

/// Encode a blank PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::new_luma8(width, height)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Hand-assemble a `multipart/form-data` body.
pub fn multipart_body(fields: &[(&str, &str)], image: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(image) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"input.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's events here until the guard drops.
    ///
    /// `#[tokio::test]` runs on a current-thread runtime, so every handler
    /// polled by the test logs through this subscriber.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn line_containing(&self, needle: &str) -> Option<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .find(|line| line.contains(needle))
            .map(str::to_string)
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Assert a status and return the plain-text body.
pub async fn expect_error(response: Response<Body>, status: StatusCode) -> String {
    assert_eq!(response.status(), status);
    body_text(response).await
}

pub async fn get(app: &TestApp, path: &str) -> Response<Body> {
    app.send(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
}
