//! Session keys.
//!
//! Every job for the same (capability, model) pair belongs to one long-lived
//! pricing session identified by a [`ManifestId`]. The first payment seen for
//! a session fixes its price for the lifetime of the process.

use std::fmt;

use crate::capability::Capability;

/// Identifier of a pricing session, also used for per-request ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ManifestId(String);

/// Length of a random request id in hex characters.
const RANDOM_ID_LEN: usize = 16;

impl ManifestId {
    /// Session key for a (capability, model) pair: `"{ordinal}_{model_id}"`.
    pub fn for_job(capability: Capability, model_id: &str) -> Self {
        Self(format!("{}_{model_id}", capability.ordinal()))
    }

    /// A fresh random id, used to tag individual requests in logs.
    pub fn random() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(RANDOM_ID_LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
