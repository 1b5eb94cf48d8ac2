//! Session pricing and sender balances.
//!
//! The [`Ledger`] trait is the only way the request pipeline touches shared
//! pricing or balance state. It is passed around as `Arc<dyn Ledger>` so that
//! a persistent or remote ledger can replace [`InMemoryLedger`].
//!
//! Solvency checks and debits are separate calls. Two concurrent requests from
//! the same sender can both pass the check before either debits, so a balance
//! may transiently go negative.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::CoreError;
use crate::estimation::OutputUnits;
use crate::payment::{PaymentTicketBatch, Sender, WIN_PROB_SCALE};
use crate::price::Price;
use crate::session::ManifestId;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Return the session's price, fixing it to `declared` if none is set.
    ///
    /// The first caller for a session wins; later calls get that price back
    /// regardless of what they declare.
    async fn lock_or_get_price(&self, manifest_id: &ManifestId, declared: Price) -> Price;

    /// Validate and redeem a ticket batch against a session.
    ///
    /// Establishes the session price on first use and credits the batch's
    /// expected value to the sender's session balance. Returns the session's
    /// established price. A rejected batch leaves all state untouched.
    async fn process_payment(
        &self,
        payment: &PaymentTicketBatch,
        manifest_id: &ManifestId,
    ) -> Result<Price, CoreError>;

    /// Whether `sender` can cover one billable unit at the session price.
    async fn sufficient_balance(&self, sender: &Sender, manifest_id: &ManifestId) -> bool;

    /// Charge `units` at `price` to the sender's session balance.
    ///
    /// Returns the fee charged in wei.
    async fn debit_fees(
        &self,
        sender: &Sender,
        manifest_id: &ManifestId,
        price: Price,
        units: OutputUnits,
    ) -> i128;

    /// Current balance, if the sender has ever paid into this session.
    async fn balance(&self, sender: &Sender, manifest_id: &ManifestId) -> Option<i128>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Acceptance rules applied to incoming ticket batches.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    /// This orchestrator's address. When set, tickets for anyone else are
    /// rejected.
    pub recipient: Option<Sender>,
    /// Lowest declared price accepted for a session.
    pub min_price: Option<Price>,
}

type BalanceKey = (Sender, ManifestId);
type NonceKey = (String, u32);

/// Process-local [`Ledger`] that lives as long as the orchestrator.
pub struct InMemoryLedger {
    config: LedgerConfig,
    prices: RwLock<HashMap<ManifestId, Price>>,
    balances: RwLock<HashMap<BalanceKey, i128>>,
    /// Redeemed (recipient_rand_hash, sender_nonce) pairs with the expiry of
    /// the batch they came in. Also serialises payment processing so a
    /// rejected batch never half-applies.
    redeemed: Mutex<HashMap<NonceKey, i64>>,
}

impl InMemoryLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            prices: RwLock::new(HashMap::new()),
            balances: RwLock::new(HashMap::new()),
            redeemed: Mutex::new(HashMap::new()),
        }
    }

    /// The established price for a session, if any.
    pub async fn price(&self, manifest_id: &ManifestId) -> Option<Price> {
        self.prices.read().await.get(manifest_id).copied()
    }

    /// Stateless checks on a batch as of unix time `now`.
    fn validate(&self, payment: &PaymentTicketBatch, now: i64) -> Result<Sender, CoreError> {
        let sender = payment
            .sender()
            .map_err(|e| CoreError::PaymentRejected(e.to_string()))?;

        if payment.tickets.is_empty() {
            return Err(CoreError::PaymentRejected("payment contains no tickets".into()));
        }
        if payment.tickets.iter().any(|t| t.signature.is_empty()) {
            return Err(CoreError::PaymentRejected("ticket is missing a signature".into()));
        }
        if payment.ticket_params.face_value == 0 {
            return Err(CoreError::PaymentRejected("ticket face value is zero".into()));
        }
        let win_prob = u128::from(payment.ticket_params.win_prob_ppm);
        if win_prob == 0 || win_prob > WIN_PROB_SCALE {
            return Err(CoreError::PaymentRejected(format!(
                "ticket win probability {win_prob} ppm is out of range"
            )));
        }
        if payment.ticket_params.expiration_unix < now {
            return Err(CoreError::PaymentRejected("ticket params expired".into()));
        }

        if let Some(expected) = &self.config.recipient {
            let recipient = Sender::parse(&payment.recipient)
                .map_err(|_| CoreError::PaymentRejected("invalid ticket recipient".into()))?;
            if &recipient != expected {
                return Err(CoreError::PaymentRejected(format!(
                    "ticket recipient {recipient} is not this orchestrator"
                )));
            }
        }

        let declared = payment.expected_price;
        if !declared.is_valid() {
            return Err(CoreError::PaymentRejected(format!(
                "invalid expected price {declared}"
            )));
        }
        if let Some(min) = &self.config.min_price {
            if declared.per_pixel_cmp(min).is_lt() {
                return Err(CoreError::PaymentRejected(format!(
                    "expected price {declared} is below the minimum {min}"
                )));
            }
        }

        Ok(sender)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn lock_or_get_price(&self, manifest_id: &ManifestId, declared: Price) -> Price {
        if let Some(price) = self.prices.read().await.get(manifest_id) {
            return *price;
        }
        match self.prices.write().await.entry(manifest_id.clone()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                tracing::info!(manifest_id = %manifest_id, price = %declared, "Session price fixed");
                *entry.insert(declared)
            }
        }
    }

    async fn process_payment(
        &self,
        payment: &PaymentTicketBatch,
        manifest_id: &ManifestId,
    ) -> Result<Price, CoreError> {
        let now = chrono::Utc::now().timestamp();
        let sender = self.validate(payment, now)?;

        let mut redeemed = self.redeemed.lock().await;
        // An expired nonce can only come back inside an expired batch, which
        // validation already rejects.
        redeemed.retain(|_, expiration| *expiration >= now);
        let nonces: Vec<NonceKey> = payment
            .tickets
            .iter()
            .map(|t| (payment.ticket_params.recipient_rand_hash.clone(), t.sender_nonce))
            .collect();
        let unique: HashSet<&NonceKey> = nonces.iter().collect();
        if unique.len() != nonces.len() || nonces.iter().any(|n| redeemed.contains_key(n)) {
            return Err(CoreError::PaymentRejected("ticket nonce already used".into()));
        }

        let price = self
            .lock_or_get_price(manifest_id, payment.expected_price)
            .await;

        let credit = i128::try_from(payment.expected_value()).unwrap_or(i128::MAX);
        {
            let mut balances = self.balances.write().await;
            let balance = balances.entry((sender.clone(), manifest_id.clone())).or_insert(0);
            *balance = balance.saturating_add(credit);
            tracing::debug!(
                sender = %sender,
                manifest_id = %manifest_id,
                credit,
                balance = *balance,
                "Credited ticket value",
            );
        }

        let expiration = payment.ticket_params.expiration_unix;
        redeemed.extend(nonces.into_iter().map(|n| (n, expiration)));
        Ok(price)
    }

    async fn sufficient_balance(&self, sender: &Sender, manifest_id: &ManifestId) -> bool {
        let Some(price) = self.price(manifest_id).await else {
            return false;
        };
        if !price.is_positive() {
            return true;
        }
        let balance = self
            .balances
            .read()
            .await
            .get(&(sender.clone(), manifest_id.clone()))
            .copied();
        balance.is_some_and(|b| b >= price.unit_fee())
    }

    async fn debit_fees(
        &self,
        sender: &Sender,
        manifest_id: &ManifestId,
        price: Price,
        units: OutputUnits,
    ) -> i128 {
        let fee = price.fee(units.get());
        let mut balances = self.balances.write().await;
        let balance = balances
            .entry((sender.clone(), manifest_id.clone()))
            .or_insert(0);
        *balance = balance.saturating_sub(fee);
        tracing::debug!(
            sender = %sender,
            manifest_id = %manifest_id,
            fee,
            balance = *balance,
            "Debited fees",
        );
        fee
    }

    async fn balance(&self, sender: &Sender, manifest_id: &ManifestId) -> Option<i128> {
        self.balances
            .read()
            .await
            .get(&(sender.clone(), manifest_id.clone()))
            .copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
