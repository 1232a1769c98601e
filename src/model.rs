//! Channel and message records as they arrive from the chat backend.
//!
//! The backend hands us loosely shaped JSON: arrays may be `null`, ids may be
//! numbers, timestamps may be missing or garbage, fields may carry the wrong
//! type. All of that is normalised here so the scoring code only ever sees
//! fully populated values. Only a document that is not JSON at all is an error.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{InboxError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum ChannelKind {
    #[default]
    Public,
    Private,
    Direct,
}

impl From<Option<String>> for ChannelKind {
    fn from(kind: Option<String>) -> Self {
        match kind.unwrap_or_default().to_lowercase().as_str() {
            "private" => ChannelKind::Private,
            "direct" | "dm" => ChannelKind::Direct,
            _ => ChannelKind::Public,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_kind")]
    pub kind: ChannelKind,
    #[serde(default, deserialize_with = "lenient_id")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_id_set")]
    pub members: HashSet<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_archived: bool,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Public,
            name: name.into(),
            members: HashSet::new(),
            is_archived: false,
        }
    }

    pub fn with_kind(mut self, kind: ChannelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn archived(mut self) -> Self {
        self.is_archived = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub channel_id: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub sender_id: String,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub sender_role: Option<String>,
    #[serde(default, deserialize_with = "lenient_id_set")]
    pub mentions: HashSet<String>,
    #[serde(default, deserialize_with = "lenient_id_set")]
    pub read_by: HashSet<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
            sender_id: sender_id.into(),
            sender_role: None,
            mentions: HashSet::new(),
            read_by: HashSet::new(),
            created_at: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.sender_role = Some(role.into());
        self
    }

    pub fn with_mention(mut self, user_id: impl Into<String>) -> Self {
        self.mentions.insert(user_id.into());
        self
    }

    pub fn mark_read_by(mut self, user_id: impl Into<String>) -> Self {
        self.read_by.insert(user_id.into());
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.contains(user_id)
    }
}

/// Everything the scorer needs for one pass over a user's inbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxSnapshot {
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub channels: Vec<Channel>,
    #[serde(default, deserialize_with = "lenient_message_map")]
    pub messages: HashMap<String, Vec<Message>>,
    #[serde(default, deserialize_with = "lenient_id_set")]
    pub muted: HashSet<String>,
    #[serde(default, deserialize_with = "lenient_id_set")]
    pub starred: HashSet<String>,
}

impl InboxSnapshot {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| InboxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Messages for a channel, empty when the backend sent nothing for it.
    pub fn messages_for(&self, channel_id: &str) -> &[Message] {
        self.messages
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_muted(&self, channel_id: &str) -> bool {
        self.muted.contains(channel_id)
    }

    pub fn is_starred(&self, channel_id: &str) -> bool {
        self.starred.contains(channel_id)
    }
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(id_from_value(&value).unwrap_or_default())
}

/// Accepts `null`, a single id, or an array mixing ids with junk.
fn lenient_id_set<'de, D>(deserializer: D) -> std::result::Result<HashSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(id_from_value).collect(),
        other => id_from_value(&other).into_iter().collect(),
    })
}

fn lenient_optional_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(id_from_value(&value))
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_bool().unwrap_or(false))
}

fn lenient_kind<'de, D>(deserializer: D) -> std::result::Result<ChannelKind, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(ChannelKind::from(value.as_str().map(str::to_string)))
}

/// Records that are not objects, or do not fit the record type, are dropped
/// one by one instead of failing the whole list.
fn records_from_value<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(records_from_value(value))
}

fn lenient_message_map<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, Vec<Message>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(entries) = value else {
        return Ok(HashMap::new());
    };
    Ok(entries
        .into_iter()
        .map(|(channel_id, messages)| (channel_id, records_from_value(messages)))
        .collect())
}

fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::String(raw) = value else {
        return Ok(None);
    };
    Ok(parse_timestamp(&raw))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Postgres text form, e.g. "2024-05-01 12:30:00"
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
