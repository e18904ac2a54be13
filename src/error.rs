use thiserror::Error;

/// Everything the engine can reject or fail with.
///
/// The `Display` text of the user-facing variants is what the shell replies
/// with. Infrastructure variants are logged and replaced by
/// [`GENERIC_FAILURE`] before they reach a user.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("❌ Captcha verification timed out. Please try checking in again.")]
    CaptchaExpired,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("notification failed: {0:#}")]
    Notify(#[from] anyhow::Error),

    #[error(transparent)]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

pub const GENERIC_FAILURE: &str = "❌ An error occurred while processing your request.";

impl BotError {
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            BotError::Store(_) | BotError::Notify(_) | BotError::Scheduler(_)
        )
    }

    /// Text safe to show to the acting user.
    pub fn user_message(&self) -> String {
        if self.is_infrastructure() {
            GENERIC_FAILURE.to_string()
        } else {
            self.to_string()
        }
    }
}

/// Malformed input. The current dialog step is re-prompted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("❌ Team name must be at least 3 characters long. Please try again.")]
    TeamNameTooShort,

    #[error("❌ Invalid team tag. Must be max 6 characters, only letters and numbers (A-Z, 0-9). You can include brackets [ABC] or just type ABC. Please try again.")]
    InvalidTeamTag,

    #[error("❌ Invalid format. Must be: PlayerName#12345678 (8 digits). Please try again.")]
    InvalidPlayerId,

    #[error("❌ You must mention exactly 3 teammates, found {0}. Please try again.")]
    MentionCount(usize),

    #[error("❌ Incorrect captcha. Please try again.")]
    WrongCaptcha,

    #[error("❌ Time must be in HH:MM format (24-hour), got `{0}`")]
    InvalidTime(String),

    #[error("❌ Check-in end time must be after the start time")]
    EmptyWindow,

    #[error("❌ Unknown day `{0}`. Use names like Monday,Wednesday,Friday")]
    InvalidDay(String),

    #[error("❌ At least one day is required")]
    NoDays,
}

/// The request is well formed but the current state forbids it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("❌ You are already part of a team. Use \"Edit Team\" or \"Delete Team\" instead.")]
    AlreadyOnTeam,

    #[error("❌ <@{0}> is already part of another team.")]
    MemberOnOtherTeam(i64),

    #[error("❌ Team name already taken. Please choose another name.")]
    NameTaken,

    #[error("❌ You must be part of a registered team.")]
    NotOnTeam,

    #[error("❌ Only the team captain can do this.")]
    NotCaptain,

    #[error("❌ Your team has already checked in for this scrim.")]
    AlreadyCheckedIn,

    #[error("❌ Check-in for {0} is not open right now.")]
    CheckInClosed(String),

    #[error("❌ You do not have this lobby role to transfer.")]
    LobbyRoleNotHeld,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFound {
    #[error("❌ Team \"{0}\" not found.")]
    Team(String),

    #[error("❌ Scrim \"{0}\" not found.")]
    Scrim(String),

    #[error("❌ Lobby role for lobby {0} not found.")]
    LobbyRole(i32),

    #[error("❌ Could not find any teammate to transfer the role to.")]
    Teammate,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate row")]
    Duplicate,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error("Unknown time zone: {0}")]
    UnknownTimeZone(String),
}

pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_failures_are_masked() {
        let err = BotError::Notify(anyhow::anyhow!("discord is down"));
        assert_eq!(err.user_message(), GENERIC_FAILURE);
        let err = BotError::Store(StoreError::Corrupt("days".into()));
        assert_eq!(err.user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn rejections_keep_their_reason() {
        let err = BotError::from(Conflict::AlreadyCheckedIn);
        assert!(err.user_message().contains("already checked in"));
        let err = BotError::from(ValidationError::MentionCount(2));
        assert!(err.user_message().contains("found 2"));
    }
}
