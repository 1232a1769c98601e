//! Priority inbox: scores every channel of a snapshot through the cache and
//! hands back either the original channel order or a ranking by urgency.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{Fingerprint, ScoreCache, ScoreMap};
use crate::config::ScoringRules;
use crate::model::{Channel, InboxSnapshot};
use crate::scoring::{self, ChannelScore};

pub struct PriorityInbox {
    cache: ScoreCache,
    rules: ScoringRules,
    priority_mode: bool,
}

impl PriorityInbox {
    pub fn new(cache: ScoreCache, rules: ScoringRules) -> Self {
        Self {
            cache,
            rules,
            priority_mode: false,
        }
    }

    /// Convenience constructor: fresh cache sized by the rules' TTL.
    pub fn from_rules(rules: ScoringRules) -> Self {
        Self::new(ScoreCache::new(rules.cache_ttl), rules)
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn is_priority_mode_on(&self) -> bool {
        self.priority_mode
    }

    /// Flips between the default and the priority view. Scores are untouched.
    pub fn toggle(&mut self) {
        self.priority_mode = !self.priority_mode;
    }

    pub fn set_priority_mode(&mut self, on: bool) {
        self.priority_mode = on;
    }

    pub fn scores_at(&self, snapshot: &InboxSnapshot, now: DateTime<Utc>) -> Arc<ScoreMap> {
        self.cache
            .get_or_compute(Fingerprint::of(snapshot), now, || {
                self.compute_scores(snapshot, now)
            })
    }

    fn compute_scores(&self, snapshot: &InboxSnapshot, now: DateTime<Utc>) -> ScoreMap {
        debug!(
            "Scoring {} channels for user {}",
            snapshot.channels.len(),
            snapshot.user_id
        );
        snapshot
            .channels
            .iter()
            .map(|channel| {
                let score = scoring::score_channel(
                    snapshot.messages_for(&channel.id),
                    &snapshot.user_id,
                    snapshot.is_muted(&channel.id),
                    &self.rules,
                    now,
                );
                (channel.id.clone(), score)
            })
            .collect()
    }

    pub fn view<'a>(&self, snapshot: &'a InboxSnapshot) -> InboxView<'a> {
        self.view_at(snapshot, Utc::now())
    }

    pub fn view_at<'a>(&self, snapshot: &'a InboxSnapshot, now: DateTime<Utc>) -> InboxView<'a> {
        let scores = self.scores_at(snapshot, now);
        let score_of = |id: &str| scores.get(id).map_or(0, |s| s.score);

        // Archived channels stay scored but never show up in the sidebar.
        let mut ranked_channels: Vec<&Channel> =
            snapshot.channels.iter().filter(|c| !c.is_archived).collect();
        if self.priority_mode {
            // `sort_by` is stable: equal scores keep their input order.
            ranked_channels.sort_by(|a, b| score_of(&b.id).cmp(&score_of(&a.id)));
        }

        let urgent_count = ranked_channels
            .iter()
            .filter(|c| score_of(&c.id) >= self.rules.urgent_threshold)
            .count();

        InboxView {
            ranked_channels,
            scores,
            starred: &snapshot.starred,
            urgent_count,
            urgent_threshold: self.rules.urgent_threshold,
            priority_mode: self.priority_mode,
        }
    }
}

/// One rendering of the inbox. Borrowed from the snapshot it was built from.
#[derive(Debug, Clone)]
pub struct InboxView<'a> {
    ranked_channels: Vec<&'a Channel>,
    scores: Arc<ScoreMap>,
    starred: &'a HashSet<String>,
    urgent_count: usize,
    urgent_threshold: u8,
    priority_mode: bool,
}

impl<'a> InboxView<'a> {
    pub fn ranked_channels(&self) -> &[&'a Channel] {
        &self.ranked_channels
    }

    pub fn urgent_count(&self) -> usize {
        self.urgent_count
    }

    pub fn is_priority_mode_on(&self) -> bool {
        self.priority_mode
    }

    /// 0 for channels that were not part of the snapshot.
    pub fn score_of(&self, channel_id: &str) -> u8 {
        self.channel_score(channel_id).score
    }

    pub fn channel_score(&self, channel_id: &str) -> ChannelScore {
        self.scores.get(channel_id).copied().unwrap_or_default()
    }

    pub fn scores(&self) -> &Arc<ScoreMap> {
        &self.scores
    }

    pub fn is_urgent(&self, channel_id: &str) -> bool {
        self.score_of(channel_id) >= self.urgent_threshold
    }

    pub fn is_starred(&self, channel_id: &str) -> bool {
        self.starred.contains(channel_id)
    }

    /// Starred channels of this view, in view order.
    pub fn starred(&self) -> Vec<&'a Channel> {
        self.ranked_channels
            .iter()
            .copied()
            .filter(|c| self.is_starred(&c.id))
            .collect()
    }

    /// Plain-text listing, one channel per line after a header.
    pub fn render(&self) -> String {
        let mode = if self.priority_mode { "priority" } else { "default" };
        let mut lines = vec![format!(
            "{} channels, {} urgent ({} view)",
            self.ranked_channels.len(),
            self.urgent_count,
            mode
        )];

        for channel in &self.ranked_channels {
            let score = self.channel_score(&channel.id);
            let label = if channel.name.trim().is_empty() {
                channel.id.as_str()
            } else {
                channel.name.as_str()
            };
            let mut line = format!("{:>3}  {:>3} unread  {}", score.score, score.unread, label);
            if self.is_urgent(&channel.id) {
                line.push_str("  [urgent]");
            }
            if self.is_starred(&channel.id) {
                line.push_str("  [starred]");
            }
            lines.push(line);
        }

        lines.join("\n")
    }

    /// Case-insensitive name search over the view, keeping the view's order.
    pub fn filter_by_name(&self, term: &str) -> Vec<&'a Channel> {
        let term = term.trim().to_lowercase();
        self.ranked_channels
            .iter()
            .copied()
            .filter(|c| c.name.to_lowercase().contains(&term))
            .collect()
    }
}
