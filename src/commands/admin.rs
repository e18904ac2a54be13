use super::super::Context;
use super::rejection;
use anyhow::Result;
use poise::command;
use scrimbot::leaderboard::{parse_standings, rank, render};
use scrimbot::teams::render_team_list;

#[command(
    slash_command,
    guild_only,
    ephemeral,
    default_member_permissions = "ADMINISTRATOR",
    subcommands("teams", "delete_team", "force_checkin", "leaderboard")
)]
pub(crate) async fn admin(_context: Context<'_>) -> Result<()> {
    Ok(())
}

/// List every registered team, newest first
#[command(slash_command, guild_only, ephemeral)]
pub(crate) async fn teams(context: Context<'_>) -> Result<()> {
    let teams = match context.data().engine.teams.list().await {
        Ok(teams) => teams,
        Err(err) => {
            context.say(rejection(&err)).await?;
            return Ok(());
        }
    };
    if teams.is_empty() {
        context.say("No teams registered yet.").await?;
        return Ok(());
    }
    context
        .send(|m| {
            m.embed(|e| {
                e.title(format!("📋 Registered Teams ({})", teams.len()))
                    .description(render_team_list(&teams))
            })
        })
        .await?;
    Ok(())
}

/// Delete a team and remove its members' roles
#[command(slash_command, guild_only, ephemeral)]
pub(crate) async fn delete_team(
    context: Context<'_>,
    #[description = "Team name"] name: String,
) -> Result<()> {
    let admin = context.author().id.0 as i64;
    match context.data().engine.teams.remove_by_name(&name, admin).await {
        Ok(team) => {
            context
                .say(format!("🗑️ Team **{}** has been deleted.", team.name))
                .await?
        }
        Err(err) => context.say(rejection(&err)).await?,
    };
    Ok(())
}

/// Check a team in for today without a captcha
#[command(slash_command, guild_only, ephemeral)]
pub(crate) async fn force_checkin(
    context: Context<'_>,
    #[description = "Team name"] team: String,
    #[description = "Scrim name"] scrim: String,
) -> Result<()> {
    let admin = context.author().id.0 as i64;
    let engine = &context.data().engine;
    match engine.on_force_check_in(&team, &scrim, admin).await {
        Ok(registration) => {
            context
                .say(format!(
                    "✅ **{}** force checked in for **{}** (Lobby {}, slot #{}).",
                    registration.team_name,
                    registration.scrim_name,
                    registration.lobby_number,
                    registration.check_in_order
                ))
                .await?
        }
        Err(err) => context.say(rejection(&err)).await?,
    };
    Ok(())
}

/// Post a leaderboard from `Team,Placement,Kills` entries
#[command(slash_command, guild_only, ephemeral)]
pub(crate) async fn leaderboard(
    context: Context<'_>,
    #[description = "Scrim name"] scrim: String,
    #[description = "Entries like Alpha,10,5; Bravo,8,3 (separated by ; or new lines)"]
    data: String,
) -> Result<()> {
    let standings = rank(parse_standings(&data.replace(';', "\n")));
    if standings.is_empty() {
        context.say("❌ No leaderboard entries found.").await?;
        return Ok(());
    }
    context
        .channel_id()
        .say(context.discord(), render(&scrim, &standings))
        .await?;
    context.say("Leaderboard posted.").await?;
    Ok(())
}
