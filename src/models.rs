use chrono::{DateTime, NaiveDate, Utc, Weekday};
use sqlx::FromRow;

use crate::clock::{format_time_of_day, parse_days, parse_time_of_day, LocalMoment};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Team {
    pub name: String,
    pub tag: String,
    pub captain_id: i64,
    pub captain_name: String,
    pub player2_id: i64,
    pub player2_name: String,
    pub player3_id: i64,
    pub player3_name: String,
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Member identities in slot order: captain, player 2, player 3.
    pub fn members(&self) -> [i64; 3] {
        [self.captain_id, self.player2_id, self.player3_id]
    }

    pub fn has_member(&self, user: i64) -> bool {
        self.members().contains(&user)
    }

    pub fn is_captain(&self, user: i64) -> bool {
        self.captain_id == user
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrim {
    pub name: String,
    pub days: Vec<Weekday>,
    /// Minutes after local midnight.
    pub start_minute: u32,
    pub end_minute: u32,
    pub mention_role: Option<i64>,
}

impl Scrim {
    /// Builds a scrim from admin input such as `Monday,Friday`, `18:00`, `18:30`.
    pub fn parse(
        name: &str,
        days: &str,
        start: &str,
        end: &str,
        mention_role: Option<i64>,
    ) -> Result<Self, ValidationError> {
        let days = parse_days(days)?;
        let start_minute = parse_time_of_day(start)?;
        let end_minute = parse_time_of_day(end)?;
        if end_minute <= start_minute {
            return Err(ValidationError::EmptyWindow);
        }
        Ok(Self {
            name: name.trim().to_string(),
            days,
            start_minute,
            end_minute,
            mention_role,
        })
    }

    pub fn runs_on(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }

    pub fn is_open_at(&self, moment: &LocalMoment) -> bool {
        self.runs_on(moment.weekday)
            && self.start_minute <= moment.minute_of_day
            && moment.minute_of_day < self.end_minute
    }

    pub fn days_label(&self) -> String {
        self.days
            .iter()
            .map(|d| crate::clock::weekday_name(*d))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn start_label(&self) -> String {
        format_time_of_day(self.start_minute)
    }

    pub fn end_label(&self) -> String {
        format_time_of_day(self.end_minute)
    }
}

/// One team's check-in for one scrim on one date.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Registration {
    pub scrim_name: String,
    pub scrim_date: NaiveDate,
    pub team_name: String,
    pub checked_in_by: i64,
    pub checked_in_at: DateTime<Utc>,
    pub lobby_number: i32,
    pub check_in_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub scrim_name: String,
    pub scrim_date: NaiveDate,
    pub team_name: String,
    pub checked_in_by: i64,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LobbyRoleGrant {
    pub scrim_name: String,
    pub scrim_date: NaiveDate,
    pub user_id: i64,
    pub lobby_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CaptchaChallenge {
    pub user_id: i64,
    pub scrim_name: String,
    pub scrim_date: NaiveDate,
    pub captcha_word: String,
    pub verified: bool,
}
