//! Raw urgency signals pulled out of a channel's message list.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::ScoringRules;
use crate::model::Message;

const BROADCAST_MENTIONS: [&str; 2] = ["@here", "@channel"];
const VELOCITY_WINDOW_MINUTES: i64 = 60;

/// Counts feeding the score aggregator. All counts are over unread messages
/// except `velocity` and `minutes_since_last`, which look at everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelSignals {
    pub mentions: u32,
    pub unread: u32,
    pub velocity: u32,
    pub important: u32,
    pub keywords: u32,
    /// `None` when no message carries a usable timestamp.
    pub minutes_since_last: Option<i64>,
}

pub fn extract(
    messages: &[Message],
    user_id: &str,
    rules: &ScoringRules,
    now: DateTime<Utc>,
) -> ChannelSignals {
    let mut signals = ChannelSignals::default();
    let direct_mention = format!("@{}", user_id.to_lowercase());
    let keywords: Vec<String> = rules
        .urgent_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    let window_start = now - Duration::minutes(VELOCITY_WINDOW_MINUTES);
    let mut newest: Option<DateTime<Utc>> = None;

    for msg in messages {
        if let Some(created_at) = msg.created_at {
            if created_at >= window_start {
                signals.velocity += 1;
            }
            newest = Some(newest.map_or(created_at, |n| n.max(created_at)));
        }

        if msg.is_read_by(user_id) {
            continue;
        }
        signals.unread += 1;

        let lowered = msg.content.to_lowercase();
        if mentions_user(msg, &lowered, user_id, &direct_mention) {
            signals.mentions += 1;
        }
        if is_privileged(msg, rules) {
            signals.important += 1;
        }
        if keywords.iter().any(|k| lowered.contains(k.as_str())) {
            signals.keywords += 1;
        }
    }

    // Clock skew can put messages slightly in the future; treat those as "now".
    signals.minutes_since_last = newest.map(|n| (now - n).num_minutes().max(0));
    signals
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// `needle` occurs in `haystack` and is not just the prefix of a longer id.
fn contains_mention(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(at, _)| {
        haystack[at + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_id_char(c))
    })
}

fn mentions_user(msg: &Message, lowered: &str, user_id: &str, direct_mention: &str) -> bool {
    if !user_id.is_empty()
        && (msg.mentions.contains(user_id) || contains_mention(lowered, direct_mention))
    {
        return true;
    }
    BROADCAST_MENTIONS.iter().any(|m| contains_mention(lowered, m))
}

fn is_privileged(msg: &Message, rules: &ScoringRules) -> bool {
    let Some(role) = msg.sender_role.as_deref() else {
        return false;
    };
    rules
        .privileged_roles
        .iter()
        .any(|r| r.eq_ignore_ascii_case(role.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn msg(id: &str, content: &str) -> Message {
        Message::new(id, "general", "u2", content)
    }

    #[test]
    fn test_empty_channel_has_no_signals() {
        let signals = extract(&[], "u1", &ScoringRules::default(), now());
        assert_eq!(signals, ChannelSignals::default());
    }

    #[test]
    fn test_mention_variants() {
        let rules = ScoringRules::default();
        let messages = vec![
            msg("1", "hey @U1 can you look"),
            msg("2", "@here standup in 5"),
            msg("3", "ping @channel"),
            msg("4", "no mention").with_mention("u1"),
            msg("5", "@u1, please"),
            msg("6", "@u1 already seen").mark_read_by("u1"),
        ];
        let signals = extract(&messages, "u1", &rules, now());
        assert_eq!(signals.mentions, 5);
        assert_eq!(signals.unread, 5);
    }

    #[test]
    fn test_longer_ids_do_not_count_as_mentions() {
        let rules = ScoringRules::default();
        let messages = vec![
            msg("1", "talking about @u12"),
            msg("2", "cc @u1_bot and @u1-old"),
            msg("3", "the @channels page"),
            msg("4", "ask @u12 then @u1"),
        ];
        let signals = extract(&messages, "u1", &rules, now());
        assert_eq!(signals.mentions, 1);
    }

    #[test]
    fn test_hand_built_keywords_match_case_insensitively() {
        let rules = ScoringRules {
            urgent_keywords: vec!["URGENT".to_string(), "  Fire ".to_string(), String::new()],
            ..ScoringRules::default()
        };
        let messages = vec![
            msg("1", "this is urgent"),
            msg("2", "FIRE in the hole"),
            msg("3", "nothing to see"),
        ];
        let signals = extract(&messages, "u1", &rules, now());
        // The empty keyword must not match every message.
        assert_eq!(signals.keywords, 2);
    }

    #[test]
    fn test_read_messages_only_count_towards_velocity_and_recency() {
        let rules = ScoringRules::default();
        let messages = vec![msg("1", "URGENT @u1")
            .with_role("admin")
            .mark_read_by("u1")
            .at(now() - Duration::minutes(2))];
        let signals = extract(&messages, "u1", &rules, now());
        assert_eq!(signals.unread, 0);
        assert_eq!(signals.mentions, 0);
        assert_eq!(signals.important, 0);
        assert_eq!(signals.keywords, 0);
        assert_eq!(signals.velocity, 1);
        assert_eq!(signals.minutes_since_last, Some(2));
    }

    #[test]
    fn test_velocity_window_and_newest_message() {
        let rules = ScoringRules::default();
        let messages = vec![
            msg("1", "a").at(now() - Duration::minutes(90)),
            msg("2", "b").at(now() - Duration::minutes(59)),
            msg("3", "c").at(now() - Duration::minutes(10)),
            msg("4", "no timestamp"),
        ];
        let signals = extract(&messages, "u1", &rules, now());
        assert_eq!(signals.velocity, 2);
        assert_eq!(signals.minutes_since_last, Some(10));
    }

    #[test]
    fn test_future_timestamps_clamp_to_now() {
        let rules = ScoringRules::default();
        let messages = vec![msg("1", "a").at(now() + Duration::minutes(3))];
        let signals = extract(&messages, "u1", &rules, now());
        assert_eq!(signals.minutes_since_last, Some(0));
    }

    #[test]
    fn test_roles_and_keywords_are_case_insensitive() {
        let rules = ScoringRules::default();
        let messages = vec![
            msg("1", "Need this ASAP").with_role("Admin"),
            msg("2", "fyi").with_role("member"),
            msg("3", "Deadline moved").with_role(" OWNER "),
        ];
        let signals = extract(&messages, "u1", &rules, now());
        assert_eq!(signals.important, 2);
        assert_eq!(signals.keywords, 2);
    }

    #[test]
    fn test_empty_user_id_never_matches_direct_mentions() {
        let rules = ScoringRules::default();
        let messages = vec![msg("1", "email me @ noon")];
        let signals = extract(&messages, "", &rules, now());
        assert_eq!(signals.mentions, 0);
    }
}
