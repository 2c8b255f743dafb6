//! Canonical serialization and hashing of sizing calculations

use crate::money;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Fields covered by the verification hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashInput {
    pub equity: Decimal,
    pub risk_pct: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub position_size: Decimal,
}

/// Sorted-key, whitespace-free JSON with fixed 8-digit values
pub fn canonical_payload(input: &HashInput) -> String {
    let fields: BTreeMap<&str, String> = BTreeMap::from([
        ("entry_price", money::canonical(input.entry_price)),
        ("equity", money::canonical(input.equity)),
        ("position_size", money::canonical(input.position_size)),
        ("risk_pct", money::canonical(input.risk_pct)),
        ("stop_loss", money::canonical(input.stop_loss)),
    ]);
    // Serializing a map of strings cannot fail
    serde_json::to_string(&fields).unwrap_or_default()
}

/// Hex SHA-256 of the canonical payload
pub fn calculation_hash(input: &HashInput) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"risk_calculation:");
    hasher.update(canonical_payload(input).as_bytes());
    hex::encode(hasher.finalize())
}
