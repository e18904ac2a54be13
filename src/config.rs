use std::env;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::clock::parse_time_zone;
use crate::engine::Settings;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub guild_id: u64,
    pub database_url: String,
    pub time_zone: Tz,
    pub verified_role: String,
    pub captcha_window_secs: i64,
    pub archive_delay_secs: u64,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
        };
        let time_zone = match lookup("TIMEZONE") {
            Some(name) => parse_time_zone(name.trim())?,
            None => chrono_tz::Asia::Kolkata,
        };
        Ok(Self {
            discord_token: required("DISCORD_TOKEN")?,
            guild_id: parse("GUILD_ID", &required("GUILD_ID")?)?,
            database_url: required("DATABASE_URL")?,
            time_zone,
            verified_role: lookup("VERIFIED_ROLE").unwrap_or_else(|| "eSports".to_string()),
            captcha_window_secs: optional(&lookup, "CAPTCHA_WINDOW_SECS", 60)?,
            archive_delay_secs: optional(&lookup, "ARCHIVE_DELAY_SECS", 5)?,
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            verified_role: self.verified_role.clone(),
            captcha_window: chrono::Duration::seconds(self.captcha_window_secs),
            archive_delay: std::time::Duration::from_secs(self.archive_delay_secs),
        }
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn optional<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => parse(name, &value),
        None => Ok(default),
    }
}
