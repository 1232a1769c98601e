use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::model::InboxSnapshot;
use crate::scoring::ChannelScore;

pub type ScoreMap = HashMap<String, ChannelScore>;

/// Coarse summary of an inbox: who is looking, which channels exist, how
/// many messages each holds, and what is muted. Message content is not part
/// of it, so an edit that keeps the count unchanged goes unnoticed until the
/// entry expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    user_id: String,
    channels: Vec<(String, usize)>,
    muted: Vec<String>,
}

impl Fingerprint {
    pub fn of(snapshot: &InboxSnapshot) -> Self {
        let mut channels: Vec<(String, usize)> = snapshot
            .channels
            .iter()
            .map(|c| (c.id.clone(), snapshot.messages_for(&c.id).len()))
            .collect();
        channels.sort();

        let mut muted: Vec<String> = snapshot.muted.iter().cloned().collect();
        muted.sort();

        Self {
            user_id: snapshot.user_id.clone(),
            channels,
            muted,
        }
    }
}

struct CacheEntry {
    scores: Arc<ScoreMap>,
    computed_at: DateTime<Utc>,
    fingerprint: Fingerprint,
}

/// Single-entry memo of the last scoring pass. Owned by one inbox session;
/// a new pass replaces the entry wholesale.
pub struct ScoreCache {
    entry: Mutex<Option<CacheEntry>>,
    ttl: Duration,
}

impl ScoreCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: Mutex::new(None),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached map when `fingerprint` matches and the entry is
    /// younger than the TTL, otherwise runs `compute` and stores its result.
    pub fn get_or_compute<F>(
        &self,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
        compute: F,
    ) -> Arc<ScoreMap>
    where
        F: FnOnce() -> ScoreMap,
    {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = entry.as_ref() {
            if cached.fingerprint == fingerprint && self.is_fresh(cached.computed_at, now) {
                debug!("ScoreCache: hit ({} channels)", cached.scores.len());
                return Arc::clone(&cached.scores);
            }
        }

        let scores = Arc::new(compute());
        debug!("ScoreCache: recomputed {} channel scores", scores.len());
        *entry = Some(CacheEntry {
            scores: Arc::clone(&scores),
            computed_at: now,
            fingerprint,
        });
        scores
    }

    pub fn invalidate(&self) {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        *entry = None;
    }

    fn is_fresh(&self, computed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A clock that moved backwards also invalidates.
        let Ok(age) = (now - computed_at).to_std() else {
            return false;
        };
        age < self.ttl
    }
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CACHE_TTL)
    }
}
