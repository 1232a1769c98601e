use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{InboxError, Result};

/// Channels at or above this score count as urgent.
pub const DEFAULT_URGENT_THRESHOLD: u8 = 80;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

const DEFAULT_URGENT_KEYWORDS: [&str; 8] = [
    "urgent",
    "asap",
    "emergency",
    "critical",
    "important",
    "deadline",
    "immediately",
    "blocker",
];

const DEFAULT_PRIVILEGED_ROLES: [&str; 4] = ["admin", "owner", "super_admin", "manager"];

/// Tunables for the scorer. Weights and caps are fixed; the word lists and
/// the cache lifetime can be overridden from a rules file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRules {
    pub urgent_keywords: Vec<String>,
    pub privileged_roles: Vec<String>,
    pub urgent_threshold: u8,
    pub cache_ttl: Duration,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            urgent_keywords: DEFAULT_URGENT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            privileged_roles: DEFAULT_PRIVILEGED_ROLES.iter().map(|r| r.to_string()).collect(),
            urgent_threshold: DEFAULT_URGENT_THRESHOLD,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RulesFile {
    urgent_keywords: Option<Vec<String>>,
    privileged_roles: Option<Vec<String>>,
    urgent_threshold: Option<u8>,
    /// Humantime string, e.g. "30s" or "1m 30s".
    cache_ttl: Option<String>,
}

impl ScoringRules {
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: RulesFile =
            toml::from_str(content).map_err(|e| InboxError::Rules(e.to_string()))?;
        let defaults = Self::default();

        let cache_ttl = match file.cache_ttl {
            Some(raw) => humantime::parse_duration(raw.trim())
                .map_err(|e| InboxError::Rules(format!("cache_ttl '{}': {}", raw, e)))?,
            None => defaults.cache_ttl,
        };

        let urgent_threshold = file.urgent_threshold.unwrap_or(defaults.urgent_threshold);
        if urgent_threshold > crate::scoring::MAX_SCORE {
            return Err(InboxError::Rules(format!(
                "urgent_threshold {} exceeds {}",
                urgent_threshold,
                crate::scoring::MAX_SCORE
            )));
        }

        Ok(Self {
            urgent_keywords: file
                .urgent_keywords
                .map(normalize_words)
                .unwrap_or(defaults.urgent_keywords),
            privileged_roles: file
                .privileged_roles
                .map(normalize_words)
                .unwrap_or(defaults.privileged_roles),
            urgent_threshold,
            cache_ttl,
        })
    }

    /// Missing file means defaults; a file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(InboxError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

fn normalize_words(words: Vec<String>) -> Vec<String> {
    words
        .into_iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub snapshot_path: PathBuf,
    pub database_url: String,
    pub rules_path: PathBuf,
    /// Overrides the `user_id` carried in the snapshot when set.
    pub user_id: Option<String>,
    pub priority_mode: bool,
    /// 0 scores the snapshot once and exits.
    pub watch_interval_secs: u64,
    pub rules: ScoringRules,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let rules_path = PathBuf::from(
            env::var("INBOX_RULES_PATH").unwrap_or_else(|_| "inbox_rules.toml".to_string()),
        );
        let rules = ScoringRules::load(&rules_path)?;

        Ok(Config {
            snapshot_path: PathBuf::from(
                env::var("INBOX_SNAPSHOT_PATH").unwrap_or_else(|_| "data/inbox.json".to_string()),
            ),
            database_url: env::var("INBOX_DATABASE_URL")
                .unwrap_or_else(|_| "data/inbox.db".to_string()),
            rules_path,
            user_id: env::var("INBOX_USER_ID")
                .ok()
                .filter(|id| !id.trim().is_empty()),
            priority_mode: env::var("INBOX_PRIORITY_MODE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            watch_interval_secs: env::var("INBOX_WATCH_INTERVAL_SECS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            rules,
        })
    }
}
