//! Credentials and request signing for the knowledge-base API

mod signer;

pub use signer::{RequestSigner, SignableRequest, SignedRequest, SIGNING_REGION, SIGNING_SERVICE};

use crate::error::{DeepSearchError, Result};
use chrono::{DateTime, Utc};

/// Signing key material, immutable once constructed
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_key: String,
    secret_key: String,
    account_id: String,
}

impl Credential {
    /// Build a credential, failing fast when any field is empty
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Result<Self> {
        let credential = Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            account_id: account_id.into(),
        };
        credential.ensure_complete()?;
        Ok(credential)
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub(crate) fn ensure_complete(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("access key", &self.access_key),
            ("secret key", &self.secret_key),
            ("account id", &self.account_id),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DeepSearchError::AuthConfig(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Source of the signing timestamp
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for reproducible signatures
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
