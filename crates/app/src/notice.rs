use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waveportal_core::PortalError;

/// A failed action, shown to the user for a limited time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Stable code from [`PortalError::code`].
    pub code: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notice {
    pub fn from_error(err: &PortalError, now: DateTime<Utc>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            raised_at: now,
            expires_at,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
