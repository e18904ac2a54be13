//! In-process doubles for the store, the notifier and the clock.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc, Weekday};
use serenity::async_trait;

use crate::clock::{Calendar, Clock};
use crate::engine::{Engine, Settings};
use crate::error::StoreError;
use crate::lobby::{slot_for, LobbyEngine};
use crate::models::{CaptchaChallenge, LobbyRoleGrant, NewRegistration, Registration, Scrim, Team};
use crate::notify::{Announcement, Notifier};
use crate::store::{Store, StoreResult};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Monday 2026-10-12 08:59:00 UTC
pub fn instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 12, 8, 59, 0).unwrap()
}

/// A team whose members are `first`, `first + 1` and `first + 2`.
pub fn team(name: &str, first: i64) -> Team {
    let tag: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect::<String>()
        .to_uppercase();
    Team {
        name: name.to_string(),
        tag,
        captain_id: first,
        captain_name: format!("Captain{first}#00000001"),
        player2_id: first + 1,
        player2_name: format!("Second{first}#00000002"),
        player3_id: first + 2,
        player3_name: format!("Third{first}#00000003"),
        created_at: instant(),
    }
}

pub fn scrim(name: &str, days: &[Weekday], start_minute: u32, end_minute: u32) -> Scrim {
    Scrim {
        name: name.to_string(),
        days: days.to_vec(),
        start_minute,
        end_minute,
        mention_role: None,
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance_secs(&self, secs: i64) {
        *self.now.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
struct Tables {
    teams: Vec<Team>,
    scrims: BTreeMap<String, Scrim>,
    registrations: Vec<Registration>,
    captchas: Vec<CaptchaChallenge>,
    grants: Vec<LobbyRoleGrant>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn put_team(&self, team: Team) {
        self.tables.lock().unwrap().teams.push(team);
    }

    pub fn put_scrim(&self, scrim: Scrim) {
        self.tables
            .lock()
            .unwrap()
            .scrims
            .insert(scrim.name.clone(), scrim);
    }

    pub fn captchas(&self) -> Vec<CaptchaChallenge> {
        self.tables.lock().unwrap().captchas.clone()
    }

    /// Every call fails until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Corrupt("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn team(&self, name: &str) -> StoreResult<Option<Team>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.teams.iter().find(|t| t.name == name).cloned())
    }

    async fn team_by_member(&self, member: i64) -> StoreResult<Option<Team>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.teams.iter().find(|t| t.has_member(member)).cloned())
    }

    async fn insert_team(&self, team: &Team) -> StoreResult<()> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.teams.iter().any(|t| t.name == team.name) {
            return Err(StoreError::Duplicate);
        }
        tables.teams.push(team.clone());
        Ok(())
    }

    async fn update_team(&self, original_name: &str, team: &Team) -> StoreResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if team.name != original_name && tables.teams.iter().any(|t| t.name == team.name) {
            return Err(StoreError::Duplicate);
        }
        let Some(existing) = tables.teams.iter_mut().find(|t| t.name == original_name) else {
            return Ok(false);
        };
        let created_at = existing.created_at;
        *existing = Team {
            created_at,
            ..team.clone()
        };
        Ok(true)
    }

    async fn delete_team(&self, name: &str) -> StoreResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.teams.len();
        tables.teams.retain(|t| t.name != name);
        Ok(tables.teams.len() != before)
    }

    async fn teams(&self) -> StoreResult<Vec<Team>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut teams = tables.teams.clone();
        teams.reverse();
        teams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(teams)
    }

    async fn upsert_scrim(&self, scrim: &Scrim) -> StoreResult<()> {
        self.check()?;
        self.put_scrim(scrim.clone());
        Ok(())
    }

    async fn delete_scrim(&self, name: &str) -> StoreResult<bool> {
        self.check()?;
        Ok(self.tables.lock().unwrap().scrims.remove(name).is_some())
    }

    async fn scrim(&self, name: &str) -> StoreResult<Option<Scrim>> {
        self.check()?;
        Ok(self.tables.lock().unwrap().scrims.get(name).cloned())
    }

    async fn scrims(&self) -> StoreResult<Vec<Scrim>> {
        self.check()?;
        Ok(self.tables.lock().unwrap().scrims.values().cloned().collect())
    }

    async fn count_registrations(&self, scrim: &str, date: NaiveDate) -> StoreResult<i64> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .registrations
            .iter()
            .filter(|r| r.scrim_name == scrim && r.scrim_date == date)
            .count() as i64)
    }

    async fn registration(
        &self,
        scrim: &str,
        date: NaiveDate,
        team: &str,
    ) -> StoreResult<Option<Registration>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .registrations
            .iter()
            .find(|r| r.scrim_name == scrim && r.scrim_date == date && r.team_name == team)
            .cloned())
    }

    async fn append_registration(&self, new: NewRegistration) -> StoreResult<Registration> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let scope = tables
            .registrations
            .iter()
            .filter(|r| r.scrim_name == new.scrim_name && r.scrim_date == new.scrim_date);
        let mut existing = 0;
        for r in scope {
            if r.team_name == new.team_name {
                return Err(StoreError::Duplicate);
            }
            existing += 1;
        }
        let slot = slot_for(existing);
        let registration = Registration {
            scrim_name: new.scrim_name,
            scrim_date: new.scrim_date,
            team_name: new.team_name,
            checked_in_by: new.checked_in_by,
            checked_in_at: new.checked_in_at,
            lobby_number: slot.lobby,
            check_in_order: slot.order,
        };
        tables.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn registrations(&self, scrim: &str, date: NaiveDate) -> StoreResult<Vec<Registration>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Registration> = tables
            .registrations
            .iter()
            .filter(|r| r.scrim_name == scrim && r.scrim_date == date)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.check_in_order);
        Ok(rows)
    }

    async fn registered_scrims(&self, date: NaiveDate) -> StoreResult<Vec<String>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut names: Vec<String> = tables
            .registrations
            .iter()
            .filter(|r| r.scrim_date == date)
            .map(|r| r.scrim_name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn upsert_captcha(&self, challenge: &CaptchaChallenge) -> StoreResult<()> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        tables.captchas.retain(|c| {
            !(c.user_id == challenge.user_id
                && c.scrim_name == challenge.scrim_name
                && c.scrim_date == challenge.scrim_date)
        });
        tables.captchas.push(challenge.clone());
        Ok(())
    }

    async fn mark_captcha_verified(
        &self,
        user: i64,
        scrim: &str,
        date: NaiveDate,
    ) -> StoreResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let mut found = false;
        for c in tables.captchas.iter_mut() {
            if c.user_id == user && c.scrim_name == scrim && c.scrim_date == date {
                c.verified = true;
                found = true;
            }
        }
        Ok(found)
    }

    async fn record_lobby_role_grant(&self, grant: &LobbyRoleGrant) -> StoreResult<()> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        tables.grants.retain(|g| {
            !(g.scrim_name == grant.scrim_name
                && g.scrim_date == grant.scrim_date
                && g.user_id == grant.user_id)
        });
        tables.grants.push(grant.clone());
        Ok(())
    }

    async fn move_lobby_role_grants(
        &self,
        date: NaiveDate,
        lobby: i32,
        from: i64,
        to: i64,
    ) -> StoreResult<u64> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let held_by_recipient: HashSet<String> = tables
            .grants
            .iter()
            .filter(|g| g.scrim_date == date && g.user_id == to)
            .map(|g| g.scrim_name.clone())
            .collect();
        tables.grants.retain(|g| {
            !(g.scrim_date == date
                && g.lobby_number == lobby
                && g.user_id == from
                && held_by_recipient.contains(&g.scrim_name))
        });
        let mut moved = 0;
        for g in tables.grants.iter_mut() {
            if g.scrim_date == date && g.lobby_number == lobby && g.user_id == from {
                g.user_id = to;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn lobby_role_grants(&self, date: NaiveDate, user: i64) -> StoreResult<Vec<LobbyRoleGrant>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .grants
            .iter()
            .filter(|g| g.scrim_date == date && g.user_id == user)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Announce(Announcement),
    Log(String),
    SetCheckInOpen(bool),
    Grant(i64, u64),
    Revoke(i64, u64),
    Archive(u64),
}

#[derive(Default)]
struct Guild {
    roles: BTreeMap<String, u64>,
    holders: HashSet<(i64, u64)>,
    unreachable: HashSet<i64>,
    calls: Vec<NotifierCall>,
    check_in_open: bool,
}

#[derive(Default)]
pub struct RecordingNotifier {
    guild: Mutex<Guild>,
    failing: AtomicBool,
    failing_rosters: AtomicBool,
    failing_revokes: AtomicBool,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.guild.lock().unwrap().calls.clone()
    }

    pub fn announcements(&self) -> Vec<Announcement> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                NotifierCall::Announce(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                NotifierCall::Log(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn role_id(&self, name: &str) -> Option<u64> {
        self.guild.lock().unwrap().roles.get(name).copied()
    }

    pub fn holds(&self, user: i64, role_name: &str) -> bool {
        let guild = self.guild.lock().unwrap();
        guild
            .roles
            .get(role_name)
            .is_some_and(|role| guild.holders.contains(&(user, *role)))
    }

    pub fn check_in_open(&self) -> bool {
        self.guild.lock().unwrap().check_in_open
    }

    pub fn make_unreachable(&self, user: i64) {
        self.guild.lock().unwrap().unreachable.insert(user);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Only lobby roster posts fail.
    pub fn set_rosters_failing(&self, failing: bool) {
        self.failing_rosters.store(failing, Ordering::SeqCst);
    }

    /// Only role removals fail.
    pub fn set_revokes_failing(&self, failing: bool) {
        self.failing_revokes.store(failing, Ordering::SeqCst);
    }

    fn record(&self, call: NotifierCall) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("discord unavailable"));
        }
        self.guild.lock().unwrap().calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn announce(&self, announcement: Announcement) -> Result<()> {
        if matches!(announcement, Announcement::LobbyRoster { .. })
            && self.failing_rosters.load(Ordering::SeqCst)
        {
            return Err(anyhow!("lobby channel unavailable"));
        }
        self.record(NotifierCall::Announce(announcement))
    }

    async fn log(&self, line: String) -> Result<()> {
        self.record(NotifierCall::Log(line))
    }

    async fn set_check_in_open(&self, open: bool) -> Result<()> {
        self.record(NotifierCall::SetCheckInOpen(open))?;
        self.guild.lock().unwrap().check_in_open = open;
        Ok(())
    }

    async fn find_role(&self, name: &str) -> Result<Option<u64>> {
        Ok(self.role_id(name))
    }

    async fn ensure_role(&self, name: &str) -> Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("discord unavailable"));
        }
        let mut guild = self.guild.lock().unwrap();
        let next = 9000 + guild.roles.len() as u64;
        Ok(*guild.roles.entry(name.to_string()).or_insert(next))
    }

    async fn grant_role(&self, user: i64, role: u64) -> Result<()> {
        if self.guild.lock().unwrap().unreachable.contains(&user) {
            return Err(anyhow!("unknown member {user}"));
        }
        self.record(NotifierCall::Grant(user, role))?;
        self.guild.lock().unwrap().holders.insert((user, role));
        Ok(())
    }

    async fn revoke_role(&self, user: i64, role: u64) -> Result<()> {
        if self.failing_revokes.load(Ordering::SeqCst) {
            return Err(anyhow!("missing permissions"));
        }
        if self.guild.lock().unwrap().unreachable.contains(&user) {
            return Err(anyhow!("unknown member {user}"));
        }
        self.record(NotifierCall::Revoke(user, role))?;
        self.guild.lock().unwrap().holders.remove(&(user, role));
        Ok(())
    }

    async fn has_role(&self, user: i64, role: u64) -> Result<bool> {
        Ok(self.guild.lock().unwrap().holders.contains(&(user, role)))
    }

    async fn resolve_member(&self, user: i64) -> Result<Option<String>> {
        let guild = self.guild.lock().unwrap();
        Ok((!guild.unreachable.contains(&user)).then(|| format!("member{user}")))
    }

    async fn archive_conversation(&self, conversation: u64) -> Result<()> {
        self.record(NotifierCall::Archive(conversation))
    }
}

/// The engine wired to in-memory doubles, clock on [`instant`] in UTC.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub calendar: Calendar,
    pub lobbies: Arc<LobbyEngine>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(instant()));
        let calendar = Calendar::new(chrono_tz::UTC, clock.clone());
        let settings = Settings {
            archive_delay: std::time::Duration::ZERO,
            ..Settings::default()
        };
        let engine = Engine::new(store.clone(), notifier.clone(), calendar.clone(), settings);
        let lobbies = engine.lobbies.clone();
        Self {
            store,
            notifier,
            clock,
            calendar,
            lobbies,
            engine,
        }
    }
}
