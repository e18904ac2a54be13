use anyhow::Result;
use chrono::NaiveDate;
use serenity::async_trait;

/// Outcomes the shell renders as embeds and buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    CheckInOpened {
        scrim: String,
        mention_role: Option<i64>,
        closes_at: String,
    },
    CheckInClosed {
        scrim: String,
        total: usize,
    },
    LobbyRoster {
        scrim: String,
        date: NaiveDate,
        lobby: i32,
        /// `(tag, name)` in check-in order.
        teams: Vec<(String, String)>,
    },
}

/// Messaging and role plumbing of the guild the bot serves.
///
/// Roles are addressed by their Discord id, users by their Discord user id.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn announce(&self, announcement: Announcement) -> Result<()>;
    /// Appends a line to the audit channel.
    async fn log(&self, line: String) -> Result<()>;
    /// Allows or denies verified members sending in the check-in channel.
    async fn set_check_in_open(&self, open: bool) -> Result<()>;

    async fn find_role(&self, name: &str) -> Result<Option<u64>>;
    /// Looks a role up by name, creating it if missing.
    async fn ensure_role(&self, name: &str) -> Result<u64>;
    async fn grant_role(&self, user: i64, role: u64) -> Result<()>;
    async fn revoke_role(&self, user: i64, role: u64) -> Result<()>;
    async fn has_role(&self, user: i64, role: u64) -> Result<bool>;
    /// Display tag of a guild member, `None` if they cannot be reached.
    async fn resolve_member(&self, user: i64) -> Result<Option<String>>;

    async fn archive_conversation(&self, conversation: u64) -> Result<()>;
}
