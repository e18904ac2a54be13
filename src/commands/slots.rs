use super::super::Context;
use super::rejection;
use anyhow::Result;
use poise::command;
use serenity::utils::Colour;

/// Show today's lobby slots for every scrim
#[command(slash_command, guild_only, ephemeral)]
pub(crate) async fn slots(context: Context<'_>) -> Result<()> {
    let (today, slots) = match context.data().engine.slots_today().await {
        Ok(slots) => slots,
        Err(err) => {
            context.say(rejection(&err)).await?;
            return Ok(());
        }
    };
    if slots.is_empty() {
        context.say("No teams have checked in today.").await?;
        return Ok(());
    }
    context
        .send(|m| {
            m.embed(|e| {
                e.title(format!("📊 Slots for {}", today.format("%Y-%m-%d")))
                    .colour(Colour::BLUE);
                for scrim in &slots {
                    e.field(&scrim.scrim, scrim.describe(), false);
                }
                e
            })
        })
        .await?;
    Ok(())
}
