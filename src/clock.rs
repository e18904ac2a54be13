use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::{ConfigError, ValidationError};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock facts derived from a single instant in the configured zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMoment {
    pub instant: DateTime<Utc>,
    pub weekday: Weekday,
    pub minute_of_day: u32,
    pub date: NaiveDate,
}

impl LocalMoment {
    pub fn at(instant: DateTime<Utc>, tz: Tz) -> Self {
        let local = instant.with_timezone(&tz);
        Self {
            instant,
            weekday: local.weekday(),
            minute_of_day: local.hour() * 60 + local.minute(),
            date: local.date_naive(),
        }
    }

    /// `YYYY-MM-DD`
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

#[derive(Clone)]
pub struct Calendar {
    tz: Tz,
    clock: Arc<dyn Clock>,
}

impl Calendar {
    pub fn new(tz: Tz, clock: Arc<dyn Clock>) -> Self {
        Self { tz, clock }
    }

    pub fn system(tz: Tz) -> Self {
        Self::new(tz, Arc::new(SystemClock))
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn sample(&self) -> LocalMoment {
        LocalMoment::at(self.clock.now(), self.tz)
    }

    pub fn current_weekday_name(&self) -> &'static str {
        weekday_name(self.sample().weekday)
    }

    pub fn current_minute_of_day(&self) -> u32 {
        self.sample().minute_of_day
    }

    pub fn today_date_key(&self) -> String {
        self.sample().date_key()
    }

    pub fn today(&self) -> NaiveDate {
        self.sample().date
    }
}

pub fn parse_time_zone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::UnknownTimeZone(name.to_string()))
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parses `HH:MM` (24h, two digits each) into minutes after midnight.
pub fn parse_time_of_day(value: &str) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidTime(value.to_string());
    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

pub fn format_time_of_day(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Parses a comma separated list such as `Monday, wed,Friday`.
pub fn parse_days(value: &str) -> Result<Vec<Weekday>, ValidationError> {
    let mut days = BTreeSet::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day = part
            .parse::<Weekday>()
            .map_err(|_| ValidationError::InvalidDay(part.to_string()))?;
        days.insert(day.num_days_from_monday());
    }
    if days.is_empty() {
        return Err(ValidationError::NoDays);
    }
    Ok(days.into_iter().map(|n| WEEK[n as usize]).collect())
}
