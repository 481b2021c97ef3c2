//! Verification of written settings against a read-back snapshot.

use std::fmt;

use serde_json::Value;
use tracing::{error, info};

use crate::{Settings, WRITE_ONLY_KEYS};

/// A single difference between expected and received settings.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// The device returned no settings at all.
    EmptySnapshot,
    /// An expected key is absent from the snapshot.
    Missing {
        /// Settings key.
        key: String,
    },
    /// The device reports a different value.
    Different {
        /// Settings key.
        key: String,
        /// Value that was written.
        expected: Value,
        /// Value the device returned.
        actual: Value,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::EmptySnapshot => write!(f, "device returned no settings"),
            Mismatch::Missing { key } => write!(f, "key '{}' missing in device response", key),
            Mismatch::Different { key, expected, actual } => {
                write!(f, "mismatch for '{}': expected {}, got {}", key, expected, actual)
            }
        }
    }
}

/// Compare `expected` against `received`, collecting every difference.
///
/// Write-only keys (control keys and key material) are skipped because the
/// device never reports them.
pub fn verify_report(expected: &Settings, received: &Settings) -> Vec<Mismatch> {
    if received.is_empty() {
        return vec![Mismatch::EmptySnapshot];
    }

    expected
        .iter()
        .filter(|(key, _)| !WRITE_ONLY_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| match received.get(key) {
            None => Some(Mismatch::Missing { key: key.clone() }),
            Some(actual) => {
                info!("Device returned '{}' = {}", key, actual);
                (actual != value).then(|| Mismatch::Different {
                    key: key.clone(),
                    expected: value.clone(),
                    actual: actual.clone(),
                })
            }
        })
        .collect()
}

/// Check that every verifiable key in `expected` was applied.
///
/// Each mismatch is logged individually.
pub fn verify(expected: &Settings, received: &Settings) -> bool {
    let mismatches = verify_report(expected, received);
    for mismatch in &mismatches {
        error!("{}", mismatch);
    }
    mismatches.is_empty()
}
