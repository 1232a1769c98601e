use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::InboxSnapshot;

/// Per-user channel preferences (mute, star). Mutes zero a channel's score;
/// stars mark channels in the inbox view.
#[derive(Clone)]
pub struct PreferenceStore {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Muted,
    Starred,
}

impl Flag {
    fn column(self) -> &'static str {
        match self {
            Flag::Muted => "muted",
            Flag::Starred => "starred",
        }
    }
}

impl PreferenceStore {
    pub fn new(database_url: &str) -> Result<Self> {
        let conn = Connection::open(database_url)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn execute_init(&self) -> Result<()> {
        info!("PreferenceStore: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS channel_preferences (
                user_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                muted BOOLEAN NOT NULL DEFAULT FALSE,
                starred BOOLEAN NOT NULL DEFAULT FALSE,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, channel_id)
            );
        ";
        self.lock().execute_batch(sql)?;
        debug!("PreferenceStore: Schema initialized successfully");
        Ok(())
    }

    fn set_flag(&self, user_id: &str, channel_id: &str, flag: Flag, value: bool) -> Result<()> {
        debug!(
            "PreferenceStore: {} = {} for user {} in channel {}",
            flag.column(),
            value,
            user_id,
            channel_id
        );
        let sql = format!(
            "INSERT INTO channel_preferences (user_id, channel_id, {col}, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(user_id, channel_id) DO UPDATE SET {col} = ?3, updated_at = CURRENT_TIMESTAMP",
            col = flag.column()
        );
        self.lock().execute(&sql, (user_id, channel_id, value))?;
        Ok(())
    }

    /// Flips the flag and returns its new value.
    fn toggle_flag(&self, user_id: &str, channel_id: &str, flag: Flag) -> Result<bool> {
        let conn = self.lock();
        let upsert = format!(
            "INSERT INTO channel_preferences (user_id, channel_id, {col}, updated_at)
             VALUES (?1, ?2, TRUE, CURRENT_TIMESTAMP)
             ON CONFLICT(user_id, channel_id) DO UPDATE SET {col} = NOT {col}, updated_at = CURRENT_TIMESTAMP",
            col = flag.column()
        );
        conn.execute(&upsert, (user_id, channel_id))?;

        let select = format!(
            "SELECT {} FROM channel_preferences WHERE user_id = ?1 AND channel_id = ?2",
            flag.column()
        );
        let value: bool = conn.query_row(&select, (user_id, channel_id), |row| row.get(0))?;
        debug!(
            "PreferenceStore: toggled {} to {} for user {} in channel {}",
            flag.column(),
            value,
            user_id,
            channel_id
        );
        Ok(value)
    }

    fn flag_of(&self, user_id: &str, channel_id: &str, flag: Flag) -> Result<bool> {
        let select = format!(
            "SELECT {} FROM channel_preferences WHERE user_id = ?1 AND channel_id = ?2",
            flag.column()
        );
        let value: Option<bool> = self
            .lock()
            .query_row(&select, (user_id, channel_id), |row| row.get(0))
            .optional()?;
        Ok(value.unwrap_or(false))
    }

    fn flagged_channels(&self, user_id: &str, flag: Flag) -> Result<HashSet<String>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT channel_id FROM channel_preferences WHERE user_id = ?1 AND {} = TRUE",
            flag.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;

        let mut results = HashSet::new();
        for row in rows {
            results.insert(row?);
        }
        Ok(results)
    }

    pub fn set_muted(&self, user_id: &str, channel_id: &str, muted: bool) -> Result<()> {
        self.set_flag(user_id, channel_id, Flag::Muted, muted)
    }

    pub fn toggle_muted(&self, user_id: &str, channel_id: &str) -> Result<bool> {
        self.toggle_flag(user_id, channel_id, Flag::Muted)
    }

    pub fn is_muted(&self, user_id: &str, channel_id: &str) -> Result<bool> {
        self.flag_of(user_id, channel_id, Flag::Muted)
    }

    pub fn muted_channels(&self, user_id: &str) -> Result<HashSet<String>> {
        self.flagged_channels(user_id, Flag::Muted)
    }

    pub fn set_starred(&self, user_id: &str, channel_id: &str, starred: bool) -> Result<()> {
        self.set_flag(user_id, channel_id, Flag::Starred, starred)
    }

    pub fn toggle_starred(&self, user_id: &str, channel_id: &str) -> Result<bool> {
        self.toggle_flag(user_id, channel_id, Flag::Starred)
    }

    pub fn starred_channels(&self, user_id: &str) -> Result<HashSet<String>> {
        self.flagged_channels(user_id, Flag::Starred)
    }

    /// Adds the stored mutes for the snapshot's user to its mute set. Mutes
    /// already carried by the snapshot are kept.
    pub fn apply_mutes(&self, snapshot: &mut InboxSnapshot) -> Result<()> {
        let muted = self.muted_channels(&snapshot.user_id)?;
        snapshot.muted.extend(muted);
        Ok(())
    }

    /// Same as [`apply_mutes`](Self::apply_mutes) for the star list.
    pub fn apply_stars(&self, snapshot: &mut InboxSnapshot) -> Result<()> {
        let starred = self.starred_channels(&snapshot.user_id)?;
        snapshot.starred.extend(starred);
        Ok(())
    }
}
