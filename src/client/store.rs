// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::client::persist::{StorePersistence, StoreSnapshot};
use crate::client::transport::{Identity, InteractionTransport, TransportError};
use crate::models::InteractionType;
use crate::tracking::ArticleFlags;

/// Attempts after the initial call.
const MAX_RETRIES: u32 = 3;
/// First retry delay; doubles per attempt (1s, 2s, 4s).
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// A full resync is due after this long when the store is (re)loaded.
const LOAD_RESYNC_AFTER_MINUTES: i64 = 5;
/// A shorter staleness budget when the page regains visibility or network.
const REGAIN_RESYNC_AFTER_MINUTES: i64 = 2;

/// Why the caller is asking whether a resync is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncTrigger {
    Load,
    VisibilityRegained,
    NetworkRegained,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("interaction kind {0} cannot be toggled")]
    NotTogglable(InteractionType),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server rejected the toggle: {0}")]
    Rejected(String),
}

/// Session-scoped cache of the current user's per-article interaction
/// flags. Toggles are optimistic: the local flag flips immediately, then is
/// reconciled with the server's authoritative value or reverted on failure.
pub struct InteractionStore {
    transport: Arc<dyn InteractionTransport>,
    identity: Option<Identity>,
    persistence: Option<Box<dyn StorePersistence>>,
    flags: RwLock<HashMap<String, ArticleFlags>>,
    last_sync: RwLock<Option<chrono::DateTime<Utc>>>,
    retry_base_delay: Duration,
}

impl InteractionStore {
    pub fn new(transport: Arc<dyn InteractionTransport>, identity: Option<Identity>) -> Self {
        Self {
            transport,
            identity,
            persistence: None,
            flags: RwLock::new(HashMap::new()),
            last_sync: RwLock::new(None),
            retry_base_delay: RETRY_BASE_DELAY,
        }
    }

    /// Attach snapshot storage so the cache survives restarts.
    pub fn with_persistence(mut self, persistence: Box<dyn StorePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Shrink the backoff base; used by tests to avoid real sleeps.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Restore the persisted snapshot, if any. Corrupted snapshots are
    /// logged and ignored; the store starts empty.
    pub async fn load(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        match persistence.load() {
            Ok(Some(snapshot)) => {
                debug!(
                    articles = snapshot.flags.len(),
                    "Restored interaction snapshot"
                );
                *self.flags.write().await = snapshot.flags;
                *self.last_sync.write().await = snapshot.last_sync;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load interaction snapshot: {}", e),
        }
    }

    /// Current flags for an article; absent articles read as all-false.
    pub async fn flags(&self, article_id: &str) -> ArticleFlags {
        self.flags
            .read()
            .await
            .get(article_id)
            .copied()
            .unwrap_or_default()
    }

    /// Toggle one interaction flag. Requires an identity; flips the local
    /// flag optimistically, then reconciles with the server's authoritative
    /// boolean or reverts on failure.
    pub async fn toggle(
        &self,
        article_id: &str,
        kind: InteractionType,
    ) -> Result<bool, StoreError> {
        if self.identity.is_none() {
            return Err(StoreError::Unauthenticated);
        }

        let previous = self.flags(article_id).await;
        let optimistic = flip(previous, kind).ok_or(StoreError::NotTogglable(kind))?;
        self.flags
            .write()
            .await
            .insert(article_id.to_string(), optimistic);

        let result = with_retry(self.retry_base_delay, MAX_RETRIES, || {
            self.transport.toggle(article_id, kind)
        })
        .await;

        match result {
            Ok(response) => {
                // The server's flag is canonical whenever it sent one, even
                // on a business rejection (e.g. a raced duplicate).
                let confirmed = match response.flag() {
                    Some(server_state) => {
                        let reconciled = set_flag(previous, kind, server_state);
                        self.flags
                            .write()
                            .await
                            .insert(article_id.to_string(), reconciled);
                        server_state
                    }
                    None => {
                        self.flags
                            .write()
                            .await
                            .insert(article_id.to_string(), previous);
                        flag_of(previous, kind)
                    }
                };
                self.persist().await;
                if response.success {
                    Ok(confirmed)
                } else {
                    Err(StoreError::Rejected(response.message))
                }
            }
            Err(e) => {
                // Revert the optimistic flip; the cache must never disagree
                // with what the server actually confirmed.
                self.flags
                    .write()
                    .await
                    .insert(article_id.to_string(), previous);
                self.persist().await;
                Err(e.into())
            }
        }
    }

    /// Bulk-fetch the server's flags for the given articles and merge them
    /// into the cache. Used on load, reconnect and after long inactivity.
    pub async fn initialize(&self, article_ids: &[String]) -> Result<(), StoreError> {
        if self.identity.is_none() {
            return Err(StoreError::Unauthenticated);
        }

        let fetched = with_retry(self.retry_base_delay, MAX_RETRIES, || {
            self.transport.fetch_flags(article_ids)
        })
        .await?;

        {
            let mut flags = self.flags.write().await;
            for (article_id, article_flags) in fetched {
                flags.insert(article_id, article_flags);
            }
        }
        *self.last_sync.write().await = Some(Utc::now());
        self.persist().await;
        Ok(())
    }

    /// Whether the cache is stale enough to warrant a resync for the given
    /// trigger. A store that has never synced always resyncs.
    pub async fn needs_resync(&self, trigger: ResyncTrigger) -> bool {
        let Some(last_sync) = *self.last_sync.read().await else {
            return true;
        };
        let budget = match trigger {
            ResyncTrigger::Load => ChronoDuration::minutes(LOAD_RESYNC_AFTER_MINUTES),
            ResyncTrigger::VisibilityRegained | ResyncTrigger::NetworkRegained => {
                ChronoDuration::minutes(REGAIN_RESYNC_AFTER_MINUTES)
            }
        };
        Utc::now() - last_sync > budget
    }

    async fn persist(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot = StoreSnapshot {
            flags: self.flags.read().await.clone(),
            last_sync: *self.last_sync.read().await,
        };
        if let Err(e) = persistence.save(&snapshot) {
            warn!("Failed to persist interaction snapshot: {}", e);
        }
    }
}

fn flag_of(flags: ArticleFlags, kind: InteractionType) -> bool {
    match kind {
        InteractionType::Like => flags.liked,
        InteractionType::Save | InteractionType::Bookmark => flags.saved,
        InteractionType::Share => flags.shared,
        _ => false,
    }
}

fn set_flag(mut flags: ArticleFlags, kind: InteractionType, value: bool) -> ArticleFlags {
    match kind {
        InteractionType::Like => flags.liked = value,
        InteractionType::Save | InteractionType::Bookmark => flags.saved = value,
        InteractionType::Share => flags.shared = value,
        _ => {}
    }
    flags
}

fn flip(flags: ArticleFlags, kind: InteractionType) -> Option<ArticleFlags> {
    match kind {
        InteractionType::Like
        | InteractionType::Save
        | InteractionType::Bookmark
        | InteractionType::Share => Some(set_flag(flags, kind, !flag_of(flags, kind))),
        _ => None,
    }
}

/// Run a transport call with exponential backoff. Retryable failures are
/// attempted up to `max_retries` more times with doubling delays; terminal
/// failures return immediately.
async fn with_retry<T, F, Fut>(
    base_delay: Duration,
    max_retries: u32,
    mut call: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = base_delay * 2u32.pow(attempt);
                debug!(attempt, ?delay, "Retrying transport call after {}", e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_targets_the_matching_flag() {
        let flags = ArticleFlags::default();
        let liked = flip(flags, InteractionType::Like).expect("togglable");
        assert!(liked.liked && !liked.saved && !liked.shared);

        let saved = flip(flags, InteractionType::Bookmark).expect("togglable");
        assert!(saved.saved);

        assert!(flip(flags, InteractionType::View).is_none());
        assert!(flip(flags, InteractionType::Comment).is_none());
    }

    #[test]
    fn flip_is_an_involution() {
        let flags = ArticleFlags {
            liked: true,
            saved: false,
            shared: true,
        };
        let flipped = flip(flags, InteractionType::Share).expect("togglable");
        let back = flip(flipped, InteractionType::Share).expect("togglable");
        assert_eq!(back, flags);
    }
}
