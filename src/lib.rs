pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod inbox;
pub mod model;
pub mod scoring;
pub mod signals;

pub use cache::{Fingerprint, ScoreCache, ScoreMap};
pub use config::{Config, ScoringRules};
pub use db::PreferenceStore;
pub use error::{InboxError, Result};
pub use inbox::{InboxView, PriorityInbox};
pub use model::{Channel, ChannelKind, InboxSnapshot, Message};
pub use scoring::ChannelScore;
