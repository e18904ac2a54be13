use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{error, info, warn};

use crate::clock::Calendar;
use crate::error::{BotError, BotResult, Conflict, NotFound, ValidationError};
use crate::lobby::LobbyEngine;
use crate::models::{CaptchaChallenge, LobbyRoleGrant, Registration};
use crate::notify::Notifier;
use crate::sessions::SessionStore;
use crate::store::Store;
use crate::utils::{captcha_word, lobby_role_name};

/// An outstanding captcha, one per user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaWindow {
    pub scrim_name: String,
    pub team_name: String,
    pub word: String,
    /// Scrim date the window was opened for.
    pub date: NaiveDate,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaPrompt {
    pub scrim_name: String,
    pub team_name: String,
    pub word: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInReceipt {
    pub registration: Registration,
    /// The `Lobby-N` role handed to the verifying user, if granting worked.
    pub lobby_role: Option<u64>,
}

pub struct CheckInDesk {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    calendar: Calendar,
    lobbies: Arc<LobbyEngine>,
    windows: SessionStore<i64, CaptchaWindow>,
    ttl: Duration,
}

impl CheckInDesk {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        calendar: Calendar,
        lobbies: Arc<LobbyEngine>,
        windows: SessionStore<i64, CaptchaWindow>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            calendar,
            lobbies,
            windows,
            ttl,
        }
    }

    pub fn window(&self, user: i64) -> Option<CaptchaWindow> {
        self.windows.get(&user)
    }

    /// Check-in button pressed: issues a captcha for the user's team.
    ///
    /// Pressing again, for this or another scrim, replaces the previous
    /// window.
    pub async fn press(&self, user: i64, scrim_name: &str) -> BotResult<CaptchaPrompt> {
        let scrim = self
            .store
            .scrim(scrim_name)
            .await?
            .ok_or_else(|| NotFound::Scrim(scrim_name.to_string()))?;
        let moment = self.calendar.sample();
        if !scrim.is_open_at(&moment) {
            return Err(Conflict::CheckInClosed(scrim.name).into());
        }
        let team = self
            .store
            .team_by_member(user)
            .await?
            .ok_or(Conflict::NotOnTeam)?;
        if self
            .store
            .registration(&scrim.name, moment.date, &team.name)
            .await?
            .is_some()
        {
            return Err(Conflict::AlreadyCheckedIn.into());
        }

        let word = captcha_word().to_string();
        self.store
            .upsert_captcha(&CaptchaChallenge {
                user_id: user,
                scrim_name: scrim.name.clone(),
                scrim_date: moment.date,
                captcha_word: word.clone(),
                verified: false,
            })
            .await?;
        self.windows.put(
            user,
            CaptchaWindow {
                scrim_name: scrim.name.clone(),
                team_name: team.name.clone(),
                word: word.clone(),
                date: moment.date,
                issued_at: moment.instant,
            },
        );
        Ok(CaptchaPrompt {
            scrim_name: scrim.name,
            team_name: team.name,
            word,
            expires_in: self.ttl,
        })
    }

    /// Free text from a user. `None` when they have no outstanding captcha.
    pub async fn reply(&self, user: i64, text: &str) -> Option<BotResult<CheckInReceipt>> {
        let window = self.windows.get(&user)?;
        Some(self.verify(user, window, text).await)
    }

    async fn verify(&self, user: i64, window: CaptchaWindow, text: &str) -> BotResult<CheckInReceipt> {
        let now = self.calendar.now();
        if now - window.issued_at > self.ttl {
            self.windows.remove(&user);
            return Err(BotError::CaptchaExpired);
        }
        if !text.trim().eq_ignore_ascii_case(&window.word) {
            return Err(ValidationError::WrongCaptcha.into());
        }

        let registration = match self
            .lobbies
            .assign(&window.scrim_name, window.date, &window.team_name, user, now)
            .await
        {
            Ok(registration) => registration,
            // Left open so the same word can be retried
            Err(err) if err.is_infrastructure() => return Err(err),
            Err(err) => {
                self.windows.remove(&user);
                return Err(err);
            }
        };
        self.windows.remove(&user);

        let lobby_role = self.grant_lobby_role(user, &registration).await;
        self.record_verification(user, &registration).await;
        if let Err(err) = self
            .notifier
            .log(format!(
                "✅ Team \"{}\" checked in to {} - Lobby {} (Position #{})",
                registration.team_name,
                registration.scrim_name,
                registration.lobby_number,
                registration.check_in_order
            ))
            .await
        {
            warn!("Could not write to scrim log: {:#}", err);
        }
        Ok(CheckInReceipt {
            registration,
            lobby_role,
        })
    }

    async fn grant_lobby_role(&self, user: i64, registration: &Registration) -> Option<u64> {
        let name = lobby_role_name(registration.lobby_number);
        let role = match self.notifier.ensure_role(&name).await {
            Ok(role) => role,
            Err(err) => {
                error!("Could not provision {}: {:#}", name, err);
                return None;
            }
        };
        match self.notifier.grant_role(user, role).await {
            Ok(()) => Some(role),
            Err(err) => {
                warn!("Could not grant {} to {}: {:#}", name, user, err);
                None
            }
        }
    }

    /// The registration row is committed; bookkeeping failures are only logged.
    async fn record_verification(&self, user: i64, registration: &Registration) {
        if let Err(err) = self
            .store
            .mark_captcha_verified(user, &registration.scrim_name, registration.scrim_date)
            .await
        {
            error!("Could not mark captcha verified for {}: {}", user, err);
        }
        let grant = LobbyRoleGrant {
            scrim_name: registration.scrim_name.clone(),
            scrim_date: registration.scrim_date,
            user_id: user,
            lobby_number: registration.lobby_number,
        };
        if let Err(err) = self.store.record_lobby_role_grant(&grant).await {
            error!("Could not record lobby role grant for {}: {}", user, err);
        }
    }

    /// Drops windows past their acceptance period.
    pub fn evict_expired(&self) -> usize {
        let now = self.calendar.now();
        let ttl = self.ttl;
        let evicted = self.windows.retain(|_, w| now - w.issued_at <= ttl);
        if evicted > 0 {
            info!("Evicted {} expired captcha windows", evicted);
        }
        evicted
    }
}
