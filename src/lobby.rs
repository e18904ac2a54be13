use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};

use crate::error::{BotResult, Conflict, NotFound, StoreError};
use crate::models::{NewRegistration, Registration};
use crate::notify::{Announcement, Notifier};
use crate::store::Store;
use crate::utils::lobby_role_name;

/// Teams per lobby.
pub const LOBBY_CAPACITY: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// 1-based check-in order within the (scrim, date) scope.
    pub order: i32,
    pub lobby: i32,
}

/// Slot of the next arrival when `existing` rows are already in the scope.
pub fn slot_for(existing: i64) -> Slot {
    Slot {
        order: (existing + 1) as i32,
        lobby: (existing / LOBBY_CAPACITY + 1) as i32,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyRoster {
    pub lobby: i32,
    pub role: u64,
    /// `(tag, name)` in check-in order.
    pub teams: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub lobby: i32,
    pub recipient: i64,
    pub recipient_tag: String,
}

/// One scrim's check-ins for a day, team names per lobby in check-in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrimSlots {
    pub scrim: String,
    pub lobbies: BTreeMap<i32, Vec<String>>,
}

impl ScrimSlots {
    pub fn describe(&self) -> String {
        if self.lobbies.is_empty() {
            return "No teams yet".to_string();
        }
        self.lobbies
            .iter()
            .map(|(lobby, teams)| format!("**Lobby {}:** {}", lobby, teams.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct LobbyEngine {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl LobbyEngine {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Appends the team to the scope and returns its order and lobby.
    pub async fn assign(
        &self,
        scrim: &str,
        date: NaiveDate,
        team: &str,
        checked_in_by: i64,
        at: DateTime<Utc>,
    ) -> BotResult<Registration> {
        let new = NewRegistration {
            scrim_name: scrim.to_string(),
            scrim_date: date,
            team_name: team.to_string(),
            checked_in_by,
            checked_in_at: at,
        };
        match self.store.append_registration(new).await {
            Ok(registration) => {
                info!(
                    "{} checked in to {} on {}: lobby {} position #{}",
                    team, scrim, date, registration.lobby_number, registration.check_in_order
                );
                Ok(registration)
            }
            Err(StoreError::Duplicate) => Err(Conflict::AlreadyCheckedIn.into()),
            Err(err) => Err(err.into()),
        }
    }

    /// Admin bypass of the captcha; same ordering as a verified check-in.
    pub async fn force_check_in(
        &self,
        team_name: &str,
        scrim_name: &str,
        admin: i64,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> BotResult<Registration> {
        if self.store.team(team_name).await?.is_none() {
            return Err(NotFound::Team(team_name.to_string()).into());
        }
        if self.store.scrim(scrim_name).await?.is_none() {
            return Err(NotFound::Scrim(scrim_name.to_string()).into());
        }
        let registration = self.assign(scrim_name, date, team_name, admin, at).await?;
        self.audit(format!(
            "⚠️ Team \"{}\" force checked-in to {} by <@{}> - Lobby {} (Position #{})",
            team_name,
            scrim_name,
            admin,
            registration.lobby_number,
            registration.check_in_order
        ))
        .await;
        Ok(registration)
    }

    /// Groups the day's check-ins by lobby and posts one roster per lobby.
    ///
    /// Lobby roles are shared by every scrim with the same lobby number and
    /// are created on first use.
    pub async fn publish_rosters(&self, scrim: &str, date: NaiveDate) -> BotResult<Vec<LobbyRoster>> {
        let registrations = self.store.registrations(scrim, date).await?;
        let mut lobbies: BTreeMap<i32, Vec<(String, String)>> = BTreeMap::new();
        for registration in registrations {
            let Some(team) = self.store.team(&registration.team_name).await? else {
                warn!(
                    "Team {} checked in to {} but no longer exists",
                    registration.team_name, scrim
                );
                continue;
            };
            lobbies
                .entry(registration.lobby_number)
                .or_default()
                .push((team.tag, team.name));
        }

        let mut rosters = Vec::with_capacity(lobbies.len());
        for (lobby, teams) in lobbies {
            let role = self.notifier.ensure_role(&lobby_role_name(lobby)).await?;
            self.notifier
                .announce(Announcement::LobbyRoster {
                    scrim: scrim.to_string(),
                    date,
                    lobby,
                    teams: teams.clone(),
                })
                .await?;
            rosters.push(LobbyRoster { lobby, role, teams });
        }
        Ok(rosters)
    }

    /// Every scrim with check-ins on `date`.
    pub async fn slots(&self, date: NaiveDate) -> BotResult<Vec<ScrimSlots>> {
        let mut slots = Vec::new();
        for scrim in self.store.registered_scrims(date).await? {
            let mut lobbies: BTreeMap<i32, Vec<String>> = BTreeMap::new();
            for registration in self.store.registrations(&scrim, date).await? {
                lobbies
                    .entry(registration.lobby_number)
                    .or_default()
                    .push(registration.team_name);
            }
            slots.push(ScrimSlots { scrim, lobbies });
        }
        Ok(slots)
    }

    /// Hands the initiator's lobby role to their first reachable teammate.
    pub async fn transfer_role(&self, user: i64, lobby: i32, date: NaiveDate) -> BotResult<Transfer> {
        let role = self
            .notifier
            .find_role(&lobby_role_name(lobby))
            .await?
            .ok_or(NotFound::LobbyRole(lobby))?;
        if !self.notifier.has_role(user, role).await? {
            return Err(Conflict::LobbyRoleNotHeld.into());
        }
        let team = self
            .store
            .team_by_member(user)
            .await?
            .ok_or(Conflict::NotOnTeam)?;

        let mut recipient = None;
        for mate in team.members().into_iter().filter(|m| *m != user) {
            match self.notifier.resolve_member(mate).await {
                Ok(Some(tag)) => match self.notifier.grant_role(mate, role).await {
                    Ok(()) => {
                        recipient = Some((mate, tag));
                        break;
                    }
                    Err(err) => warn!("Could not transfer lobby role to {}: {:#}", mate, err),
                },
                Ok(None) => {}
                Err(err) => warn!("Could not resolve teammate {}: {:#}", mate, err),
            }
        }
        let (recipient, recipient_tag) = recipient.ok_or(NotFound::Teammate)?;

        // The recipient already holds the role, so the handover stands either way
        if let Err(err) = self.notifier.revoke_role(user, role).await {
            warn!("Could not remove lobby {} role from {}: {:#}", lobby, user, err);
        }
        let moved = self
            .store
            .move_lobby_role_grants(date, lobby, user, recipient)
            .await?;
        info!(
            "Lobby {} role moved from {} to {} ({} grant rows)",
            lobby, user, recipient, moved
        );
        self.audit(format!(
            "🔄 Lobby {} role transferred from <@{}> to <@{}> ({})",
            lobby, user, recipient, team.name
        ))
        .await;
        Ok(Transfer {
            lobby,
            recipient,
            recipient_tag,
        })
    }

    async fn audit(&self, line: String) {
        if let Err(err) = self.notifier.log(line).await {
            warn!("Could not write to scrim log: {:#}", err);
        }
    }
}
