//! Token verification against an external credential service.
//!
//! The server never issues tokens. It asks a [`CredentialStore`] whether a
//! token is valid and remembers positive answers in a [`TokenCache`] for a
//! limited time so that the service is not hit on every datagram.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The credential service as seen by the game server.
pub trait CredentialStore: Send {
    /// Username the token was issued for, or `None` if the token is invalid.
    fn verify(&self, token: &str) -> Option<String>;

    /// Asks the service to keep `token` alive. Returns false if it was revoked.
    fn refresh(&self, token: &str) -> bool;

    /// Display name of the character owned by `username`, if one exists.
    fn character_name(&self, username: &str) -> Option<String>;
}

/// One entry of the static credential table in the world file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub character_name: Option<String>,
}

/// Credential table loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    by_token: HashMap<String, String>,
    characters: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new(entries: &[Credential]) -> Self {
        let mut store = Self::default();
        for entry in entries {
            store
                .by_token
                .insert(entry.token.clone(), entry.username.clone());
            if let Some(name) = &entry.character_name {
                store
                    .characters
                    .insert(entry.username.clone(), name.clone());
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

impl CredentialStore for StaticCredentials {
    fn verify(&self, token: &str) -> Option<String> {
        self.by_token.get(token).cloned()
    }

    fn refresh(&self, token: &str) -> bool {
        self.by_token.contains_key(token)
    }

    fn character_name(&self, username: &str) -> Option<String> {
        self.characters.get(username).cloned()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    username: String,
    expires_at: Instant,
}

/// Verified tokens with an expiry. A hit extends the expiry.
#[derive(Debug)]
pub struct TokenCache {
    ttl: Duration,
    entries: HashMap<String, CachedToken>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Username for `token`, consulting `store` only on a miss or an expired entry.
    pub fn verify(
        &mut self,
        store: &dyn CredentialStore,
        token: &str,
        now: Instant,
    ) -> Option<String> {
        if token.is_empty() {
            return None;
        }

        if let Some(entry) = self.entries.get_mut(token) {
            if entry.expires_at > now {
                entry.expires_at = now + self.ttl;
                return Some(entry.username.clone());
            }
        }

        match store.verify(token) {
            Some(username) => {
                self.entries.insert(
                    token.to_string(),
                    CachedToken {
                        username: username.clone(),
                        expires_at: now + self.ttl,
                    },
                );
                Some(username)
            }
            None => {
                self.entries.remove(token);
                None
            }
        }
    }

    /// Extends every live token with the service and forgets expired or revoked ones.
    ///
    /// Returns the number of tokens still cached.
    pub fn refresh_all(&mut self, store: &dyn CredentialStore, now: Instant) -> usize {
        let ttl = self.ttl;
        self.entries.retain(|token, entry| {
            if entry.expires_at <= now {
                debug!("Cached token for {} expired", entry.username);
                return false;
            }
            if store.refresh(token) {
                entry.expires_at = now + ttl;
                true
            } else {
                warn!("Token for {} was revoked", entry.username);
                false
            }
        });
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        inner: StaticCredentials,
        verify_calls: AtomicUsize,
        revoked: bool,
    }

    impl CredentialStore for CountingStore {
        fn verify(&self, token: &str) -> Option<String> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(token)
        }

        fn refresh(&self, token: &str) -> bool {
            !self.revoked && self.inner.refresh(token)
        }

        fn character_name(&self, username: &str) -> Option<String> {
            self.inner.character_name(username)
        }
    }

    fn credentials() -> StaticCredentials {
        StaticCredentials::new(&[
            Credential {
                token: "tok-alice".to_string(),
                username: "alice".to_string(),
                character_name: Some("Alyx".to_string()),
            },
            Credential {
                token: "tok-bob".to_string(),
                username: "bob".to_string(),
                character_name: None,
            },
        ])
    }

    fn counting(revoked: bool) -> CountingStore {
        CountingStore {
            inner: credentials(),
            verify_calls: AtomicUsize::new(0),
            revoked,
        }
    }

    #[test]
    fn test_static_credentials() {
        let store = credentials();
        assert_eq!(store.len(), 2);
        assert_eq!(store.verify("tok-alice").as_deref(), Some("alice"));
        assert_eq!(store.verify("nope"), None);
        assert_eq!(store.character_name("alice").as_deref(), Some("Alyx"));
        assert_eq!(store.character_name("bob"), None);
    }

    #[test]
    fn test_cache_hit_skips_store() {
        let store = counting(false);
        let mut cache = TokenCache::new(Duration::from_secs(30));
        let now = Instant::now();

        assert_eq!(cache.verify(&store, "tok-alice", now).as_deref(), Some("alice"));
        assert_eq!(
            cache
                .verify(&store, "tok-alice", now + Duration::from_secs(5))
                .as_deref(),
            Some("alice")
        );
        assert_eq!(store.verify_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expired_entry_goes_back_to_store() {
        let store = counting(false);
        let mut cache = TokenCache::new(Duration::from_secs(30));
        let now = Instant::now();

        cache.verify(&store, "tok-alice", now);
        cache.verify(&store, "tok-alice", now + Duration::from_secs(31));
        assert_eq!(store.verify_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_and_empty_tokens_are_rejected() {
        let store = counting(false);
        let mut cache = TokenCache::new(Duration::from_secs(30));
        let now = Instant::now();

        assert_eq!(cache.verify(&store, "forged", now), None);
        assert_eq!(cache.verify(&store, "", now), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_refresh_drops_expired_and_revoked() {
        let store = counting(false);
        let mut cache = TokenCache::new(Duration::from_secs(30));
        let now = Instant::now();

        cache.verify(&store, "tok-alice", now);
        cache.verify(&store, "tok-bob", now + Duration::from_secs(20));
        assert_eq!(cache.refresh_all(&store, now + Duration::from_secs(40)), 1);

        let revoking = counting(true);
        assert_eq!(cache.refresh_all(&revoking, now + Duration::from_secs(41)), 0);
    }
}
