use super::super::Context;
use super::rejection;
use anyhow::Result;
use poise::command;
use serenity::model::guild::Role;

#[command(
    slash_command,
    guild_only,
    ephemeral,
    default_member_permissions = "ADMINISTRATOR",
    subcommands("create", "delete", "list")
)]
pub(crate) async fn scrim(_context: Context<'_>) -> Result<()> {
    Ok(())
}

/// Schedule a daily check-in window. Re-using a name replaces that scrim.
#[command(slash_command, guild_only, ephemeral)]
pub(crate) async fn create(
    context: Context<'_>,
    #[description = "Scrim name"] name: String,
    #[description = "Days, e.g. Monday,Wednesday,Friday"] days: String,
    #[description = "Check-in start, HH:MM"] start: String,
    #[description = "Check-in end, HH:MM"] end: String,
    #[description = "Role to mention when check-in opens"] mention: Option<Role>,
) -> Result<()> {
    let engine = &context.data().engine;
    let mention = mention.map(|role| role.id.0 as i64);
    match engine.create_scrim(&name, &days, &start, &end, mention).await {
        Ok(scrim) => {
            context
                .say(format!(
                    "✅ Scrim **{}** scheduled on {} with check-in {}-{} ({}).",
                    scrim.name,
                    scrim.days_label(),
                    scrim.start_label(),
                    scrim.end_label(),
                    engine.calendar().time_zone()
                ))
                .await?
        }
        Err(err) => context.say(rejection(&err)).await?,
    };
    Ok(())
}

#[command(slash_command, guild_only, ephemeral)]
pub(crate) async fn delete(
    context: Context<'_>,
    #[description = "Scrim name"] name: String,
) -> Result<()> {
    match context.data().engine.delete_scrim(&name).await {
        Ok(()) => context.say(format!("🗑️ Scrim **{}** deleted.", name)).await?,
        Err(err) => context.say(rejection(&err)).await?,
    };
    Ok(())
}

#[command(slash_command, guild_only, ephemeral)]
pub(crate) async fn list(context: Context<'_>) -> Result<()> {
    let scrims = match context.data().engine.scrims().await {
        Ok(scrims) => scrims,
        Err(err) => {
            context.say(rejection(&err)).await?;
            return Ok(());
        }
    };
    if scrims.is_empty() {
        context.say("No scrims scheduled.").await?;
        return Ok(());
    }
    let lines = scrims
        .iter()
        .map(|s| {
            format!(
                "**{}**: {} {}-{}",
                s.name,
                s.days_label(),
                s.start_label(),
                s.end_label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    context.say(lines).await?;
    Ok(())
}
