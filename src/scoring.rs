//! Folds channel signals into a single 0..=100 priority score.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ScoringRules;
use crate::model::Message;
use crate::signals::{self, ChannelSignals};

pub const MAX_SCORE: u8 = 100;

const MENTION_WEIGHT: u32 = 10;
const MENTION_CAP: u32 = 30;
const UNREAD_WEIGHT: u32 = 1;
const UNREAD_CAP: u32 = 10;
const VELOCITY_WEIGHT: u32 = 3;
const VELOCITY_CAP: u32 = 15;
const IMPORTANCE_WEIGHT: u32 = 5;
const IMPORTANCE_CAP: u32 = 15;
const KEYWORD_WEIGHT: u32 = 10;
const KEYWORD_CAP: u32 = 20;

/// (upper bound in minutes, points), checked in order.
const RECENCY_STEPS: [(i64, u32); 5] = [(5, 10), (15, 8), (30, 6), (60, 4), (180, 2)];

/// Score plus the counts the sidebar shows next to a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelScore {
    pub score: u8,
    pub unread: u32,
    pub mentions: u32,
}

impl ChannelScore {
    pub fn muted() -> Self {
        Self::default()
    }
}

fn weighted(count: u32, weight: u32, cap: u32) -> u32 {
    count.saturating_mul(weight).min(cap)
}

pub fn recency_points(minutes_since_last: Option<i64>) -> u32 {
    let Some(minutes) = minutes_since_last else {
        return 0;
    };
    RECENCY_STEPS
        .iter()
        .find(|(limit, _)| minutes <= *limit)
        .map_or(0, |(_, points)| *points)
}

pub fn aggregate(signals: &ChannelSignals) -> u8 {
    let total = weighted(signals.mentions, MENTION_WEIGHT, MENTION_CAP)
        + weighted(signals.unread, UNREAD_WEIGHT, UNREAD_CAP)
        + weighted(signals.velocity, VELOCITY_WEIGHT, VELOCITY_CAP)
        + weighted(signals.important, IMPORTANCE_WEIGHT, IMPORTANCE_CAP)
        + weighted(signals.keywords, KEYWORD_WEIGHT, KEYWORD_CAP)
        + recency_points(signals.minutes_since_last);

    total.min(MAX_SCORE as u32) as u8
}

/// Scores one channel. A muted channel is always 0 and its messages are not
/// inspected at all.
pub fn score_channel(
    messages: &[Message],
    user_id: &str,
    muted: bool,
    rules: &ScoringRules,
    now: DateTime<Utc>,
) -> ChannelScore {
    if muted {
        return ChannelScore::muted();
    }

    let signals = signals::extract(messages, user_id, rules, now);
    ChannelScore {
        score: aggregate(&signals),
        unread: signals.unread,
        mentions: signals.mentions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn urgent_admin_mention(id: &str, minutes_ago: i64) -> Message {
        Message::new(id, "ops", "boss", "@u1 urgent: prod is down")
            .with_role("admin")
            .at(now() - Duration::minutes(minutes_ago))
    }

    #[test]
    fn test_urgent_admin_mentions_score_87() {
        let messages: Vec<Message> = (0..3)
            .map(|i| urgent_admin_mention(&i.to_string(), 1))
            .collect();
        let result = score_channel(&messages, "u1", false, &ScoringRules::default(), now());

        // 30 mentions + 3 unread + 9 velocity + 15 importance + 20 keywords + 10 recency
        assert_eq!(result.score, 87);
        assert_eq!(result.unread, 3);
        assert_eq!(result.mentions, 3);
        assert!(result.score >= ScoringRules::default().urgent_threshold);
    }

    #[test]
    fn test_muted_channel_scores_zero() {
        let messages: Vec<Message> = (0..50)
            .map(|i| urgent_admin_mention(&i.to_string(), 0))
            .collect();
        let result = score_channel(&messages, "u1", true, &ScoringRules::default(), now());
        assert_eq!(result, ChannelScore::muted());
    }

    #[test]
    fn test_empty_channel_scores_zero() {
        let result = score_channel(&[], "u1", false, &ScoringRules::default(), now());
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_everything_saturated_stays_in_bounds() {
        let signals = ChannelSignals {
            mentions: u32::MAX,
            unread: u32::MAX,
            velocity: u32::MAX,
            important: u32::MAX,
            keywords: u32::MAX,
            minutes_since_last: Some(0),
        };
        assert_eq!(aggregate(&signals), MAX_SCORE);
    }

    #[test]
    fn test_score_non_decreasing_in_mentions() {
        let mut last = 0;
        for mentions in 0..8 {
            let signals = ChannelSignals {
                mentions,
                unread: 4,
                minutes_since_last: Some(20),
                ..Default::default()
            };
            let score = aggregate(&signals);
            assert!(score >= last, "score dropped at {} mentions", mentions);
            last = score;
        }
        // Cap reached at three mentions.
        let at_cap = aggregate(&ChannelSignals { mentions: 3, ..Default::default() });
        let beyond = aggregate(&ChannelSignals { mentions: 7, ..Default::default() });
        assert_eq!(at_cap, beyond);
    }

    #[test]
    fn test_recency_steps() {
        assert_eq!(recency_points(None), 0);
        assert_eq!(recency_points(Some(0)), 10);
        assert_eq!(recency_points(Some(5)), 10);
        assert_eq!(recency_points(Some(6)), 8);
        assert_eq!(recency_points(Some(15)), 8);
        assert_eq!(recency_points(Some(30)), 6);
        assert_eq!(recency_points(Some(45)), 4);
        assert_eq!(recency_points(Some(120)), 2);
        assert_eq!(recency_points(Some(180)), 2);
        assert_eq!(recency_points(Some(181)), 0);
    }

    #[test]
    fn test_malformed_messages_contribute_nothing() {
        let raw = r#"[{"id": null}, {"content": null, "read_by": null, "created_at": 12}]"#;
        let messages: Vec<Message> = serde_json::from_str(raw).unwrap();
        let result = score_channel(&messages, "u1", false, &ScoringRules::default(), now());
        // Only the unread volume registers: two unread messages, no timestamps.
        assert_eq!(result.score, 2);
    }
}
