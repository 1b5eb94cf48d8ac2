use orch_core::ledger::LedgerConfig;
use orch_core::payment::Sender;
use orch_core::price::Price;

/// Default maximum request body size (32 MiB), large enough for input images.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Server configuration loaded from environment variables.
///
/// All fields except the auth secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8935`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `600`). Inference jobs,
    /// video ones in particular, can take minutes.
    pub request_timeout_secs: u64,
    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
    /// Base URL of the AI worker that runs inference.
    pub worker_url: String,
    /// Secret used to verify request credentials.
    pub auth_secret: String,
    /// This orchestrator's ticket recipient address, if tickets should be
    /// checked against it.
    pub orch_address: Option<Sender>,
    /// Lowest price a caller may declare for a new session.
    pub min_price: Option<Price>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8935`                     |
    /// | `REQUEST_TIMEOUT_SECS` | `600`                      |
    /// | `MAX_BODY_BYTES`       | `33554432`                 |
    /// | `WORKER_URL`           | `http://127.0.0.1:8000`    |
    /// | `AUTH_SECRET`          | required                   |
    /// | `ORCH_ADDRESS`         | unset                      |
    /// | `MIN_PRICE_PER_UNIT`   | unset                      |
    /// | `PIXELS_PER_UNIT`      | `1`                        |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Panics on unparsable values, like [`ServerConfig::from_env`].
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let port: u16 = var("PORT")
            .unwrap_or_else(|| "8935".into())
            .parse()
            .expect("PORT must be a valid u16");

        let request_timeout_secs: u64 = var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_body_bytes: usize = var("MAX_BODY_BYTES")
            .map(|v| v.parse().expect("MAX_BODY_BYTES must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let worker_url = var("WORKER_URL").unwrap_or_else(|| "http://127.0.0.1:8000".into());

        let auth_secret = var("AUTH_SECRET").expect("AUTH_SECRET must be set in the environment");
        assert!(!auth_secret.is_empty(), "AUTH_SECRET must not be empty");

        let orch_address = var("ORCH_ADDRESS").map(|addr| {
            Sender::parse(&addr).unwrap_or_else(|e| panic!("Invalid ORCH_ADDRESS '{addr}': {e}"))
        });

        let pixels_per_unit: i64 = var("PIXELS_PER_UNIT")
            .unwrap_or_else(|| "1".into())
            .parse()
            .expect("PIXELS_PER_UNIT must be a valid i64");

        let min_price = var("MIN_PRICE_PER_UNIT").map(|v| {
            let price_per_unit: i64 = v.parse().expect("MIN_PRICE_PER_UNIT must be a valid i64");
            let price = Price::new(price_per_unit, pixels_per_unit);
            assert!(price.is_valid(), "Invalid minimum price {price}");
            price
        });

        Self {
            host,
            port,
            request_timeout_secs,
            max_body_bytes,
            worker_url,
            auth_secret,
            orch_address,
            min_price,
        }
    }

    /// Ticket acceptance rules for the ledger.
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            recipient: self.orch_address.clone(),
            min_price: self.min_price,
        }
    }
}
