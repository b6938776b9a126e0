//! Reference set of currently valid food-safety licence keys
//!
//! The set itself is maintained by an external authority; this gate only
//! answers membership queries and lets an administrator grant or revoke
//! keys. Revocation takes effect on the next login attempt.

use crate::error::DomainError;
use sled::Db;
use std::sync::Arc;
use tracing::info;

/// Food-safety licence keys are exactly this long.
pub const LICENCE_KEY_LEN: usize = 14;

fn licence_key(key: &str) -> String {
    format!("licence/{key}")
}

#[derive(Clone)]
pub struct LicenceGate {
    instance: Arc<Db>,
}

impl LicenceGate {
    pub fn new(instance: Arc<Db>) -> Self {
        Self { instance }
    }

    pub fn grant(&self, key: &str) -> Result<(), DomainError> {
        if key.len() != LICENCE_KEY_LEN {
            return Err(DomainError::ValidationFailed(format!(
                "licence key must be {LICENCE_KEY_LEN} characters"
            )));
        }
        self.instance.insert(licence_key(key), Vec::<u8>::new())?;
        info!("granted licence {key}");
        Ok(())
    }

    pub fn revoke(&self, key: &str) -> Result<(), DomainError> {
        self.instance.remove(licence_key(key))?;
        info!("revoked licence {key}");
        Ok(())
    }

    pub fn is_valid(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.instance.get(licence_key(key))?.is_some())
    }
}
