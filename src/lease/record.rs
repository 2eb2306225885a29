//! Lease record structure and expiry arithmetic.

use crate::context::owner_string;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Lease record persisted for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Identity of the current grantee.
    pub holder_id: String,

    /// When the lease was granted or last refreshed.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub acquired_at: DateTime<Utc>,

    /// TTL the lease was granted with, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,

    /// Whole-second TTL of records written before `ttl_ms` existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,

    /// Owner string of the granting process (`user@HOST`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Process ID of the granting process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl LeaseRecord {
    /// Create a record for `holder_id` granted at `now`.
    pub fn new(holder_id: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            holder_id: holder_id.to_string(),
            acquired_at: now,
            ttl_ms: Some(ceil_millis(ttl)),
            ttl_secs: None,
            owner: Some(owner_string()),
            pid: Some(std::process::id()),
        }
    }

    /// The TTL this record was granted with, or `fallback` for legacy records.
    pub fn ttl_or(&self, fallback: Duration) -> Duration {
        self.ttl_ms
            .map(Duration::from_millis)
            .or_else(|| self.ttl_secs.map(Duration::from_secs))
            .unwrap_or(fallback)
    }

    /// Time left before the lease expires; `None` once it has expired.
    ///
    /// A record stamped in the future (clock skew between processes) is
    /// treated as freshly acquired, never as longer than its TTL.
    pub fn remaining(&self, ttl: Duration, now: DateTime<Utc>) -> Option<Duration> {
        let age = now
            .signed_duration_since(self.acquired_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        ttl.checked_sub(age).filter(|left| !left.is_zero())
    }

    /// Whether the lease is live at `now`.
    pub fn is_live(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.remaining(ttl, now).is_some()
    }
}

/// Whole milliseconds, rounded up so the stored TTL is never shorter than the
/// granted one.
pub(crate) fn ceil_millis(ttl: Duration) -> u64 {
    let millis = ttl.as_millis() + u128::from(ttl.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Accept RFC3339 strings as well as epoch seconds (integer or float).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Rfc3339(DateTime<Utc>),
        Epoch(f64),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Rfc3339(ts) => Ok(ts),
        Timestamp::Epoch(secs) => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            Utc.timestamp_opt(whole as i64, nanos.min(999_999_999))
                .single()
                .ok_or_else(|| {
                    serde::de::Error::custom(format!("epoch seconds out of range: {}", secs))
                })
        }
    }
}
