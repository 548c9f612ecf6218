//! Tamper-evident sealing of the activity trail.
//!
//! The activity log is append-only; each persisted entry is sealed on top of
//! its predecessor: versioned, linked by the previous entry's hash, SHA-256
//! hashed over its material, and HMAC-signed with the configured key.
//! `verify_trail` walks the stored chain and reports the first break.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::activity::LogEntry;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEntry {
    pub entry: LogEntry,
    pub version: u32,
    pub content_hash: String,
    pub prev_hash: Option<String>,
    pub entry_hash: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrailVerification {
    pub valid: bool,
    pub verified_entries: usize,
    pub latest_hash: Option<String>,
    pub failure_reason: Option<String>,
}

impl TrailVerification {
    fn broken(verified_entries: usize, latest_hash: Option<String>, reason: String) -> Self {
        Self { valid: false, verified_entries, latest_hash, failure_reason: Some(reason) }
    }
}

#[derive(Clone)]
pub struct ActivitySealer {
    signing_key: Vec<u8>,
}

impl ActivitySealer {
    pub fn new(signing_key: impl AsRef<[u8]>) -> Self {
        Self { signing_key: signing_key.as_ref().to_vec() }
    }

    /// Seals the next entry on top of `prev` (the latest stored sealed entry,
    /// or `None` for an empty trail).
    pub fn seal(&self, entry: LogEntry, prev: Option<&SealedEntry>) -> SealedEntry {
        let version = prev.map(|sealed| sealed.version).unwrap_or(0).saturating_add(1);
        let prev_hash = prev.map(|sealed| sealed.entry_hash.clone());
        let content_hash = content_hash(&entry);
        let entry_hash =
            hash_entry_material(&entry.id.0, version, &content_hash, prev_hash.as_deref());
        let signature = hmac_hex(&self.signing_key, entry_hash.as_bytes());

        SealedEntry { entry, version, content_hash, prev_hash, entry_hash, signature }
    }

    /// Walks a stored trail oldest-first and checks versions, hash links,
    /// recomputed hashes, and signatures.
    pub fn verify_trail(&self, entries: &[SealedEntry]) -> TrailVerification {
        let mut previous_hash: Option<String> = None;

        for (index, sealed) in entries.iter().enumerate() {
            let expected_version = u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1);
            if sealed.version != expected_version {
                return TrailVerification::broken(
                    index,
                    previous_hash,
                    format!(
                        "version mismatch at entry {}: expected {}, found {}",
                        sealed.entry.id, expected_version, sealed.version
                    ),
                );
            }

            if sealed.prev_hash != previous_hash {
                return TrailVerification::broken(
                    index,
                    previous_hash,
                    format!("previous hash mismatch at entry {}", sealed.entry.id),
                );
            }

            if content_hash(&sealed.entry) != sealed.content_hash {
                return TrailVerification::broken(
                    index,
                    previous_hash,
                    format!("content hash mismatch at entry {}", sealed.entry.id),
                );
            }

            let computed_entry_hash = hash_entry_material(
                &sealed.entry.id.0,
                sealed.version,
                &sealed.content_hash,
                sealed.prev_hash.as_deref(),
            );
            if computed_entry_hash != sealed.entry_hash {
                return TrailVerification::broken(
                    index,
                    previous_hash,
                    format!("entry hash mismatch at entry {}", sealed.entry.id),
                );
            }

            if hmac_hex(&self.signing_key, sealed.entry_hash.as_bytes()) != sealed.signature {
                return TrailVerification::broken(
                    index,
                    previous_hash,
                    format!("signature mismatch at entry {}", sealed.entry.id),
                );
            }

            previous_hash = Some(sealed.entry_hash.clone());
        }

        TrailVerification {
            valid: true,
            verified_entries: entries.len(),
            latest_hash: previous_hash,
            failure_reason: None,
        }
    }
}

fn content_hash(entry: &LogEntry) -> String {
    let canonical_payload = match serde_json::to_vec(entry) {
        Ok(payload) => payload,
        Err(_) => entry.id.0.as_bytes().to_vec(),
    };
    sha256_hex(&canonical_payload)
}

fn hash_entry_material(
    entry_id: &str,
    version: u32,
    content_hash: &str,
    prev_hash: Option<&str>,
) -> String {
    let material =
        format!("{}|{}|{}|{}", entry_id, version, content_hash, prev_hash.unwrap_or(""));
    sha256_hex(material.as_bytes())
}

fn hmac_hex(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return sha256_hex(payload),
    };
    mac.update(payload);
    encode_hex(mac.finalize().into_bytes().as_slice())
}

fn sha256_hex(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    encode_hex(digest.as_slice())
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::ActivitySealer;
    use crate::domain::activity::LogEntry;

    fn entry(actor: &str, activity: &str) -> LogEntry {
        LogEntry::new(actor, activity, None)
    }

    fn sealed_trail(sealer: &ActivitySealer, count: usize) -> Vec<super::SealedEntry> {
        let mut trail = Vec::new();
        for index in 0..count {
            let sealed = sealer.seal(
                entry("Site Admin", &format!("Activity number {index}.")),
                trail.last(),
            );
            trail.push(sealed);
        }
        trail
    }

    #[test]
    fn sealing_links_each_entry_to_its_predecessor() {
        let sealer = ActivitySealer::new("trail-key");
        let trail = sealed_trail(&sealer, 3);

        assert_eq!(trail[0].version, 1);
        assert_eq!(trail[0].prev_hash, None);
        assert_eq!(trail[1].prev_hash, Some(trail[0].entry_hash.clone()));
        assert_eq!(trail[2].prev_hash, Some(trail[1].entry_hash.clone()));
    }

    #[test]
    fn verify_accepts_an_untampered_trail() {
        let sealer = ActivitySealer::new("trail-key");
        let trail = sealed_trail(&sealer, 4);

        let result = sealer.verify_trail(&trail);
        assert!(result.valid);
        assert_eq!(result.verified_entries, 4);
        assert_eq!(result.latest_hash.as_deref(), Some(trail[3].entry_hash.as_str()));
    }

    #[test]
    fn verify_detects_rewritten_activity_text() {
        let sealer = ActivitySealer::new("trail-key");
        let mut trail = sealed_trail(&sealer, 3);
        trail[1].entry.activity = "Rewrote history.".to_string();

        let result = sealer.verify_trail(&trail);
        assert!(!result.valid);
        assert_eq!(result.verified_entries, 1);
        assert!(result.failure_reason.unwrap_or_default().contains("content hash mismatch"));
    }

    #[test]
    fn verify_detects_a_forged_signature() {
        let sealer = ActivitySealer::new("trail-key");
        let mut trail = sealed_trail(&sealer, 2);
        trail[1].signature = "forged".to_string();

        let result = sealer.verify_trail(&trail);
        assert!(!result.valid);
        assert!(result.failure_reason.unwrap_or_default().contains("signature mismatch"));
    }

    #[test]
    fn verify_detects_a_dropped_entry() {
        let sealer = ActivitySealer::new("trail-key");
        let mut trail = sealed_trail(&sealer, 3);
        trail.remove(1);

        let result = sealer.verify_trail(&trail);
        assert!(!result.valid);
        assert!(result.failure_reason.unwrap_or_default().contains("version mismatch"));
    }

    #[test]
    fn a_different_key_rejects_the_whole_trail() {
        let sealer = ActivitySealer::new("trail-key");
        let trail = sealed_trail(&sealer, 2);

        let other = ActivitySealer::new("other-key");
        let result = other.verify_trail(&trail);
        assert!(!result.valid);
        assert_eq!(result.verified_entries, 0);
    }
}
