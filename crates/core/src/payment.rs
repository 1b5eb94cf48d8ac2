//! Payment ticket batches carried in the payment request header.
//!
//! The header value is standard base64 of a JSON [`PaymentTicketBatch`].
//! Ticket signatures are checked by the ledger, not here; this module only
//! decodes the batch and derives the paying [`Sender`].

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::price::Price;

/// Request header carrying the encoded ticket batch.
pub const PAYMENT_HEADER: &str = "Livepeer-Payment";

/// Denominator of [`TicketParams::win_prob_ppm`].
pub const WIN_PROB_SCALE: u128 = 1_000_000;

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Billing identity: a 20-byte address in lowercase `0x` hex form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Sender(String);

impl Sender {
    /// Parse and normalise an address.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let hex = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::PaymentInvalid(format!(
                "invalid sender address '{raw}'"
            )));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Ticket batch
// ---------------------------------------------------------------------------

/// Parameters shared by every ticket in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketParams {
    /// Face value in wei paid out by a winning ticket.
    pub face_value: u64,
    /// Winning probability in parts per million.
    pub win_prob_ppm: u32,
    /// Hex commitment to the recipient's random number; scopes nonces.
    pub recipient_rand_hash: String,
    /// Unix timestamp after which these parameters are no longer accepted.
    pub expiration_unix: i64,
}

/// The per-ticket part of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSenderParams {
    pub sender_nonce: u32,
    pub signature: String,
}

/// A caller's claim of payment for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTicketBatch {
    pub sender: String,
    pub recipient: String,
    pub expected_price: Price,
    pub ticket_params: TicketParams,
    #[serde(default)]
    pub tickets: Vec<TicketSenderParams>,
}

impl PaymentTicketBatch {
    /// Decode the payment header value.
    ///
    /// A missing header, bad base64 or bad JSON all yield
    /// [`CoreError::PaymentInvalid`].
    pub fn from_header(value: Option<&str>) -> Result<Self, CoreError> {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CoreError::PaymentInvalid("missing payment".into()))?;

        let bytes = STANDARD
            .decode(value)
            .map_err(|e| CoreError::PaymentInvalid(format!("invalid payment encoding: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::PaymentInvalid(format!("invalid payment: {e}")))
    }

    /// Encode this batch as a header value.
    pub fn encode_header(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// The paying identity.
    pub fn sender(&self) -> Result<Sender, CoreError> {
        Sender::parse(&self.sender)
    }

    /// Expected value of the batch in wei, summed over its tickets.
    pub fn expected_value(&self) -> u128 {
        let per_ticket = u128::from(self.ticket_params.face_value)
            * u128::from(self.ticket_params.win_prob_ppm)
            / WIN_PROB_SCALE;
        per_ticket.saturating_mul(self.tickets.len() as u128)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
