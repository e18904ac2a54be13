//! Entry points the Discord shell calls into.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use log::info;
use tokio::sync::Mutex;

use crate::checkin::{CaptchaPrompt, CheckInDesk, CheckInReceipt};
use crate::clock::Calendar;
use crate::error::{BotResult, NotFound};
use crate::lobby::{LobbyEngine, ScrimSlots, Transfer};
use crate::models::{Registration, Scrim};
use crate::notify::Notifier;
use crate::registration::{Registrar, RegistrationReply};
use crate::scheduler::{Ticker, WindowEvent, WindowScheduler};
use crate::sessions::SessionStore;
use crate::store::Store;
use crate::teams::TeamService;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Role every registered player receives.
    pub verified_role: String,
    pub captcha_window: Duration,
    /// Delay before a finished registration thread is archived.
    pub archive_delay: std::time::Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verified_role: "eSports".to_string(),
            captcha_window: Duration::seconds(60),
            archive_delay: std::time::Duration::from_secs(5),
        }
    }
}

/// Which dialog, if any, consumed a free-text message.
#[derive(Debug)]
pub enum TextOutcome {
    Registration(BotResult<RegistrationReply>),
    CheckIn(BotResult<CheckInReceipt>),
    Ignored,
}

pub struct Engine {
    store: Arc<dyn Store>,
    calendar: Calendar,
    pub lobbies: Arc<LobbyEngine>,
    pub checkin: Arc<CheckInDesk>,
    pub registrar: Registrar,
    pub teams: TeamService,
    pub scheduler: Arc<WindowScheduler>,
    ticker: Mutex<Option<Ticker>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        calendar: Calendar,
        settings: Settings,
    ) -> Self {
        let lobbies = Arc::new(LobbyEngine::new(store.clone(), notifier.clone()));
        let checkin = Arc::new(CheckInDesk::new(
            store.clone(),
            notifier.clone(),
            calendar.clone(),
            lobbies.clone(),
            SessionStore::new(),
            settings.captcha_window,
        ));
        let registrar = Registrar::new(
            store.clone(),
            notifier.clone(),
            calendar.clone(),
            SessionStore::new(),
            settings.verified_role.clone(),
            settings.archive_delay,
        );
        let teams = TeamService::new(store.clone(), notifier.clone(), settings.verified_role);
        let scheduler = Arc::new(WindowScheduler::new(
            store.clone(),
            notifier,
            calendar.clone(),
            lobbies.clone(),
            checkin.clone(),
        ));
        Self {
            store,
            calendar,
            lobbies,
            checkin,
            registrar,
            teams,
            scheduler,
            ticker: Mutex::new(None),
        }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Validates admin input, stores the scrim and restarts the ticker.
    pub async fn create_scrim(
        &self,
        name: &str,
        days: &str,
        start: &str,
        end: &str,
        mention_role: Option<i64>,
    ) -> BotResult<Scrim> {
        let scrim = Scrim::parse(name, days, start, end, mention_role)?;
        self.on_scrim_created(&scrim).await?;
        Ok(scrim)
    }

    /// Same name replaces the previous configuration.
    pub async fn on_scrim_created(&self, scrim: &Scrim) -> BotResult<()> {
        self.store.upsert_scrim(scrim).await?;
        info!(
            "Scrim {} on {} checks in {}-{}",
            scrim.name,
            scrim.days_label(),
            scrim.start_label(),
            scrim.end_label()
        );
        self.restart_ticker().await
    }

    pub async fn delete_scrim(&self, name: &str) -> BotResult<()> {
        if !self.store.delete_scrim(name).await? {
            return Err(NotFound::Scrim(name.to_string()).into());
        }
        info!("Scrim {} deleted", name);
        Ok(())
    }

    pub async fn scrims(&self) -> BotResult<Vec<Scrim>> {
        Ok(self.store.scrims().await?)
    }

    /// Stops the running ticker, if any, before starting a new one.
    pub async fn restart_ticker(&self) -> BotResult<()> {
        let mut ticker = self.ticker.lock().await;
        if let Some(previous) = ticker.take() {
            previous.stop().await?;
        }
        *ticker = Some(Ticker::start(self.scheduler.clone()).await?);
        Ok(())
    }

    pub async fn stop_ticker(&self) -> BotResult<()> {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.stop().await?;
        }
        Ok(())
    }

    pub async fn on_tick(&self) -> BotResult<Vec<WindowEvent>> {
        self.scheduler.tick().await
    }

    pub async fn on_check_in_button_pressed(
        &self,
        user: i64,
        scrim: &str,
    ) -> BotResult<CaptchaPrompt> {
        self.checkin.press(user, scrim).await
    }

    /// Registration threads take precedence over a pending captcha.
    pub async fn on_free_text(&self, conversation: u64, author: i64, text: &str) -> TextOutcome {
        if let Some(reply) = self.registrar.reply(conversation, author, text).await {
            return TextOutcome::Registration(reply);
        }
        if let Some(receipt) = self.checkin.reply(author, text).await {
            return TextOutcome::CheckIn(receipt);
        }
        TextOutcome::Ignored
    }

    /// Checks a team in for today without a captcha.
    pub async fn on_force_check_in(
        &self,
        team: &str,
        scrim: &str,
        admin: i64,
    ) -> BotResult<Registration> {
        let moment = self.calendar.sample();
        self.lobbies
            .force_check_in(team, scrim, admin, moment.date, moment.instant)
            .await
    }

    pub async fn on_transfer_lobby_role(
        &self,
        user: i64,
        lobby: i32,
        date: NaiveDate,
    ) -> BotResult<Transfer> {
        self.lobbies.transfer_role(user, lobby, date).await
    }

    pub async fn slots_today(&self) -> BotResult<(NaiveDate, Vec<ScrimSlots>)> {
        let today = self.calendar.today();
        Ok((today, self.lobbies.slots(today).await?))
    }
}
