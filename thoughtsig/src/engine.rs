use std::hash::Hasher;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHasher;
use moka::sync::Cache;

use crate::normalize::normalize_text_variants;

const DEFAULT_CAPACITY: u64 = 10_000;
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// A signature recovered from the text-keyed side of the cache, paired with
/// the exact text it was stored under so callers can tell a normalized-variant
/// hit from an exact one.
#[derive(Debug, Clone)]
pub struct CachedSignature {
    pub signature: Arc<str>,
    pub original_text: Arc<str>,
}

/// Holds `thoughtSignature` values the upstream model attaches to reasoning
/// parts so they can be replayed on the next turn of the same conversation.
/// Two independent maps back the two ways a caller looks a signature up:
/// by the tool-call id it rode in on, and by the thinking text it was
/// attached to (tried across a few normalized variants, since models echo
/// text back with cosmetic differences).
pub struct ThoughtSignatureCache {
    by_tool_call_id: Cache<String, Arc<str>>,
    by_text: Cache<u64, CachedSignature>,
}

impl ThoughtSignatureCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_capacity_and_ttl(capacity: u64, ttl: Duration) -> Self {
        Self {
            by_tool_call_id: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            by_text: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn put_for_tool_call(&self, tool_call_id: impl Into<String>, signature: impl Into<Arc<str>>) {
        self.by_tool_call_id.insert(tool_call_id.into(), signature.into());
    }

    pub fn get_for_tool_call(&self, tool_call_id: &str) -> Option<Arc<str>> {
        self.by_tool_call_id.get(tool_call_id)
    }

    /// Stores `signature` under every normalized variant of `text`, so a
    /// later lookup with any of those variants recovers it.
    pub fn put_for_text(&self, text: &str, signature: impl Into<Arc<str>>) {
        let signature: Arc<str> = signature.into();
        let original_text: Arc<str> = Arc::from(text);
        for variant in normalize_text_variants(text) {
            let key = fingerprint(&variant);
            self.by_text.insert(
                key,
                CachedSignature {
                    signature: signature.clone(),
                    original_text: original_text.clone(),
                },
            );
        }
    }

    /// Tries each normalized variant of `text` in turn, returning the first
    /// cache hit.
    pub fn get_for_text(&self, text: &str) -> Option<CachedSignature> {
        for variant in normalize_text_variants(text) {
            if let Some(hit) = self.by_text.get(&fingerprint(&variant)) {
                return Some(hit);
            }
        }
        None
    }
}

impl Default for ThoughtSignatureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Domain-separated ahash fingerprint, so a text key can never collide with
/// a tool-call-id key even if they happened to share a cache.
fn fingerprint(s: &str) -> u64 {
    let mut hasher = AHasher::default();
    hasher.write(b"thoughtsig:text:");
    hasher.write(s.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_round_trip() {
        let cache = ThoughtSignatureCache::new();
        cache.put_for_tool_call("call_1", "sig-abc");
        assert_eq!(cache.get_for_tool_call("call_1").as_deref(), Some("sig-abc"));
        assert!(cache.get_for_tool_call("call_2").is_none());
    }

    #[test]
    fn text_lookup_matches_normalized_variant() {
        let cache = ThoughtSignatureCache::new();
        cache.put_for_text("  **thinking** about it  ", "sig-xyz");

        let hit = cache.get_for_text("thinking about it").expect("normalized hit");
        assert_eq!(&*hit.signature, "sig-xyz");
        assert_eq!(&*hit.original_text, "  **thinking** about it  ");
    }

    #[test]
    fn text_lookup_misses_unrelated_text() {
        let cache = ThoughtSignatureCache::new();
        cache.put_for_text("alpha", "sig-1");
        assert!(cache.get_for_text("beta").is_none());
    }
}
