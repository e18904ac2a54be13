use std::sync::Arc;

use log::{info, warn};

use crate::error::{BotResult, Conflict, NotFound};
use crate::models::Team;
use crate::notify::Notifier;
use crate::store::Store;

/// Team removal and listing outside the registration dialog.
pub struct TeamService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    verified_role: String,
}

impl TeamService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, verified_role: String) -> Self {
        Self {
            store,
            notifier,
            verified_role,
        }
    }

    /// "Delete Team" button: the captain, or an admin on the team, disbands it.
    pub async fn disband_own(&self, user: i64, is_admin: bool) -> BotResult<Team> {
        let team = self
            .store
            .team_by_member(user)
            .await?
            .ok_or(Conflict::NotOnTeam)?;
        if !team.is_captain(user) && !is_admin {
            return Err(Conflict::NotCaptain.into());
        }
        self.remove(team, user).await
    }

    pub async fn remove_by_name(&self, name: &str, admin: i64) -> BotResult<Team> {
        let team = self
            .store
            .team(name)
            .await?
            .ok_or_else(|| NotFound::Team(name.to_string()))?;
        self.remove(team, admin).await
    }

    /// Newest first.
    pub async fn list(&self) -> BotResult<Vec<Team>> {
        Ok(self.store.teams().await?)
    }

    async fn remove(&self, team: Team, actor: i64) -> BotResult<Team> {
        if !self.store.delete_team(&team.name).await? {
            return Err(NotFound::Team(team.name).into());
        }
        info!("Team {} deleted by {}", team.name, actor);

        match self.notifier.find_role(&self.verified_role).await {
            Ok(Some(role)) => {
                for member in team.members() {
                    if let Err(err) = self.notifier.revoke_role(member, role).await {
                        warn!("Could not remove role from member {}: {:#}", member, err);
                    }
                }
            }
            Ok(None) => {}
            Err(err) => warn!("Could not look up {} role: {:#}", self.verified_role, err),
        }
        if let Err(err) = self
            .notifier
            .log(format!("🗑️ Team \"{}\" deleted by <@{}>", team.name, actor))
            .await
        {
            warn!("Could not write to scrim log: {:#}", err);
        }
        Ok(team)
    }
}

pub fn render_team_list(teams: &[Team]) -> String {
    teams
        .iter()
        .enumerate()
        .map(|(i, team)| {
            format!(
                "**{}. [{}] {}**\n   Captain: {}\n   Players: {}, {}\n",
                i + 1,
                team.tag,
                team.name,
                team.captain_name,
                team.player2_name,
                team.player3_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
