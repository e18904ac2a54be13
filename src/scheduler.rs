use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use log::{error, info, warn};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::checkin::CheckInDesk;
use crate::clock::{Calendar, LocalMoment};
use crate::error::BotResult;
use crate::lobby::LobbyEngine;
use crate::models::Scrim;
use crate::notify::{Announcement, Notifier};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Opened { scrim: String },
    Closed { scrim: String, total: usize, lobbies: usize },
}

/// The minute is part of the key so a scrim rescheduled the same day fires again.
type FiredKey = (String, NaiveDate, Boundary, u32);

/// Fires each scrim's open and close boundary once per day.
///
/// Boundaries match on the exact minute; a tick missed while the process
/// was down is not caught up. A boundary that fails before anything was
/// announced is retried by the next tick in the same minute.
pub struct WindowScheduler {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    calendar: Calendar,
    lobbies: Arc<LobbyEngine>,
    checkin: Arc<CheckInDesk>,
    fired: Mutex<HashSet<FiredKey>>,
}

impl WindowScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        calendar: Calendar,
        lobbies: Arc<LobbyEngine>,
        checkin: Arc<CheckInDesk>,
    ) -> Self {
        Self {
            store,
            notifier,
            calendar,
            lobbies,
            checkin,
            fired: Mutex::new(HashSet::new()),
        }
    }

    pub async fn tick(&self) -> BotResult<Vec<WindowEvent>> {
        self.checkin.evict_expired();
        let moment = self.calendar.sample();
        let scrims = self.store.scrims().await?;
        self.forget_before(moment.date);

        let mut events = Vec::new();
        for scrim in scrims.iter().filter(|s| s.runs_on(moment.weekday)) {
            let boundary = if moment.minute_of_day == scrim.start_minute {
                Boundary::Open
            } else if moment.minute_of_day == scrim.end_minute {
                Boundary::Close
            } else {
                continue;
            };
            let key = (scrim.name.clone(), moment.date, boundary, moment.minute_of_day);
            if !self.claim(&key) {
                continue;
            }
            let fired = match boundary {
                Boundary::Open => self.open(scrim).await,
                Boundary::Close => self.close(scrim, &moment, &scrims).await,
            };
            match fired {
                Ok(event) => events.push(event),
                Err(err) => {
                    error!("Could not {:?} check-in for {}: {}", boundary, scrim.name, err);
                    self.release(&key);
                }
            }
        }
        Ok(events)
    }

    async fn open(&self, scrim: &Scrim) -> BotResult<WindowEvent> {
        self.notifier.set_check_in_open(true).await?;
        self.notifier
            .announce(Announcement::CheckInOpened {
                scrim: scrim.name.clone(),
                mention_role: scrim.mention_role,
                closes_at: scrim.end_label(),
            })
            .await?;
        info!("Check-in opened for {}", scrim.name);
        self.audit(format!("✅ Check-in opened for {}", scrim.name)).await;
        Ok(WindowEvent::Opened {
            scrim: scrim.name.clone(),
        })
    }

    async fn close(
        &self,
        scrim: &Scrim,
        moment: &LocalMoment,
        scrims: &[Scrim],
    ) -> BotResult<WindowEvent> {
        // The check-in channel is shared; overlapping windows keep it open
        let overlapping = scrims
            .iter()
            .any(|s| s.name != scrim.name && s.is_open_at(moment));
        if !overlapping {
            self.notifier.set_check_in_open(false).await?;
        }

        let total = self
            .store
            .registrations(&scrim.name, moment.date)
            .await?
            .len();
        self.notifier
            .announce(Announcement::CheckInClosed {
                scrim: scrim.name.clone(),
                total,
            })
            .await?;
        // The summary is out; from here on failures are logged, not retried
        let lobbies = match self.lobbies.publish_rosters(&scrim.name, moment.date).await {
            Ok(rosters) => rosters.len(),
            Err(err) => {
                error!("Could not publish lobby rosters for {}: {}", scrim.name, err);
                0
            }
        };
        info!(
            "Check-in closed for {}: {} teams in {} lobbies",
            scrim.name, total, lobbies
        );
        self.audit(format!(
            "🔒 Check-in closed for {} - {} teams checked in",
            scrim.name, total
        ))
        .await;
        Ok(WindowEvent::Closed {
            scrim: scrim.name.clone(),
            total,
            lobbies,
        })
    }

    fn claim(&self, key: &FiredKey) -> bool {
        self.fired.lock().map_or(false, |mut fired| fired.insert(key.clone()))
    }

    fn release(&self, key: &FiredKey) {
        if let Ok(mut fired) = self.fired.lock() {
            fired.remove(key);
        }
    }

    fn forget_before(&self, date: NaiveDate) {
        if let Ok(mut fired) = self.fired.lock() {
            fired.retain(|(_, d, _, _)| *d >= date);
        }
    }

    async fn audit(&self, line: String) {
        if let Err(err) = self.notifier.log(line).await {
            warn!("Could not write to scrim log: {:#}", err);
        }
    }
}

/// Drives [`WindowScheduler::tick`] at the top of every minute.
pub struct Ticker {
    scheduler: JobScheduler,
}

impl Ticker {
    pub async fn start(windows: Arc<WindowScheduler>) -> BotResult<Self> {
        let scheduler = JobScheduler::new().await?;
        let job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
            let windows = windows.clone();
            Box::pin(async move {
                if let Err(err) = windows.tick().await {
                    error!("Scrim tick failed: {}", err);
                }
            })
        })?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        info!("Scrim schedules activated");
        Ok(Self { scheduler })
    }

    pub async fn stop(mut self) -> BotResult<()> {
        self.scheduler.shutdown().await?;
        Ok(())
    }
}
