//! Identifier generation for board items.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix shared by every item identifier.
pub const ID_PREFIX: &str = "kb-";

/// Generate an item ID from content + entropy.
/// Format: "kb-" + 10 hex chars of SHA256(title + timestamp + random)
pub fn generate_id(title: &str, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(created_at.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(rand::rng().random::<[u8; 8]>());
    let hash = hasher.finalize();
    format!(
        "{}{:010x}",
        ID_PREFIX,
        u64::from_be_bytes([hash[0], hash[1], hash[2], hash[3], hash[4], 0, 0, 0]) >> 24
    )
}

/// Generate an ID that does not collide with any ID for which `taken` holds.
pub fn generate_unique_id(title: &str, created_at: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = generate_id(title, created_at);
        if !taken(&id) {
            return id;
        }
        log::debug!("Regenerating colliding id {}", id);
    }
}
