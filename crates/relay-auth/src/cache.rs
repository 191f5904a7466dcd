//! Validation cache: remembers successful credential validations.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use tracing::debug;

use relay_core::config::AuthConfig;
use relay_core::types::identity::Identity;

use crate::credential::{CacheKey, Credential};

/// A cached successful validation.
#[derive(Debug, Clone)]
pub struct CachedValidation {
    /// The validated identity.
    pub identity: Identity,
    /// When the validation happened.
    pub cached_at: DateTime<Utc>,
    /// SHA-256 of the full credential, so a shared prefix never matches.
    credential_digest: [u8; 32],
    /// Expiry of a structured credential; `None` for opaque ones.
    pub credential_expires_at: Option<DateTime<Utc>>,
}

/// In-memory cache of validated identities keyed by (hint, credential prefix).
#[derive(Debug, Clone)]
pub struct ValidationCache {
    /// The underlying moka cache.
    entries: Cache<CacheKey, Arc<CachedValidation>>,
    /// Lifetime of an entry.
    ttl: Duration,
    /// Entry count above which expired entries are pruned on insert.
    prune_threshold: u64,
}

impl ValidationCache {
    /// Creates a cache from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_settings(config.cache_ttl(), config.cache_prune_threshold)
    }

    /// Creates a cache with an explicit TTL and prune threshold.
    pub fn with_settings(ttl: std::time::Duration, prune_threshold: u64) -> Self {
        let entries = Cache::builder().time_to_live(ttl).build();
        Self {
            entries,
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
            prune_threshold,
        }
    }

    /// Looks up a still-valid cached identity for `credential`.
    pub async fn get(&self, credential: &Credential) -> Option<Identity> {
        self.get_at(credential, Utc::now()).await
    }

    /// Looks up a cached identity as of `now`.
    pub async fn get_at(&self, credential: &Credential, now: DateTime<Utc>) -> Option<Identity> {
        let key = credential.cache_key();
        let entry = self.entries.get(&key).await?;

        if entry.credential_digest != digest(credential) {
            return None;
        }

        let stale = now - entry.cached_at >= self.ttl
            || entry.credential_expires_at.is_some_and(|exp| now >= exp);
        if stale {
            self.entries.invalidate(&key).await;
            return None;
        }

        Some(entry.identity.clone())
    }

    /// Caches a successful validation.
    pub async fn insert(
        &self,
        credential: &Credential,
        identity: Identity,
        credential_expires_at: Option<DateTime<Utc>>,
    ) {
        self.insert_at(credential, identity, credential_expires_at, Utc::now())
            .await;
    }

    /// Caches a successful validation performed at `now`.
    pub async fn insert_at(
        &self,
        credential: &Credential,
        identity: Identity,
        credential_expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        let entry = CachedValidation {
            identity,
            cached_at: now,
            credential_digest: digest(credential),
            credential_expires_at,
        };
        self.entries
            .insert(credential.cache_key(), Arc::new(entry))
            .await;

        if self.entries.entry_count() > self.prune_threshold {
            self.prune_expired(now).await;
        }
    }

    /// Drops the entry for `credential`, if any.
    pub async fn invalidate(&self, credential: &Credential) {
        self.entries.invalidate(&credential.cache_key()).await;
    }

    /// Removes every entry older than the TTL as of `now`. Returns the count removed.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Arc<CacheKey>> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                now - entry.cached_at >= self.ttl
                    || entry.credential_expires_at.is_some_and(|exp| now >= exp)
            })
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.entries.invalidate(key.as_ref()).await;
        }
        self.entries.run_pending_tasks().await;

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Pruned expired validations");
        }
        expired.len()
    }

    /// Approximate number of cached entries.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

fn digest(credential: &Credential) -> [u8; 32] {
    Sha256::digest(credential.raw().as_bytes()).into()
}
