use anyhow::Result;
use log::{debug, info};
use scrimbot::interaction::ButtonAction;
use scrimbot::registration::RegistrationReply;
use scrimbot::TextOutcome;
use serenity::client::Context;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::channel::Message;
use serenity::model::id::ChannelId;
use serenity::utils::Colour;

use crate::commands::rejection;
use crate::Data;

pub async fn handle(ctx: &Context, event: &poise::Event<'_>, data: &Data) -> Result<()> {
    match event {
        poise::Event::Message { new_message } => on_message(ctx, new_message, data).await,
        poise::Event::InteractionCreate {
            interaction: Interaction::MessageComponent(component),
        } => on_component(ctx, component, data).await,
        _ => Ok(()),
    }
}

async fn on_message(ctx: &Context, message: &Message, data: &Data) -> Result<()> {
    if message.author.bot || message.guild_id.is_none() {
        return Ok(());
    }
    let author = message.author.id.0 as i64;
    let outcome = data
        .engine
        .on_free_text(message.channel_id.0, author, &message.content)
        .await;
    match outcome {
        TextOutcome::Registration(Ok(RegistrationReply::Prompt { text, .. })) => {
            message.channel_id.say(&ctx.http, text).await?;
        }
        TextOutcome::Registration(Ok(RegistrationReply::Completed { team, edited, text })) => {
            info!(
                "Team {} {} by {}",
                team.name,
                if edited { "updated" } else { "registered" },
                message.author.tag()
            );
            message.channel_id.say(&ctx.http, text).await?;
        }
        TextOutcome::Registration(Err(err)) => {
            message.channel_id.say(&ctx.http, rejection(&err)).await?;
        }
        TextOutcome::CheckIn(Ok(receipt)) => {
            let registration = receipt.registration;
            message
                .reply(
                    &ctx.http,
                    format!(
                        "✅ **{}** checked in for **{}**! Lobby {}, slot #{}",
                        registration.team_name,
                        registration.scrim_name,
                        registration.lobby_number,
                        registration.check_in_order
                    ),
                )
                .await?;
        }
        TextOutcome::CheckIn(Err(err)) => {
            message.reply(&ctx.http, rejection(&err)).await?;
        }
        TextOutcome::Ignored => {}
    }
    Ok(())
}

async fn respond(
    ctx: &Context,
    component: &MessageComponentInteraction,
    content: impl ToString,
) -> Result<()> {
    component
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|d| d.content(content).ephemeral(true))
        })
        .await?;
    Ok(())
}

/// Private thread in the registration channel with the user added to it.
async fn open_thread(
    ctx: &Context,
    data: &Data,
    component: &MessageComponentInteraction,
    prefix: &str,
) -> Result<ChannelId> {
    let thread = data
        .layout
        .registration
        .create_private_thread(&ctx.http, |thread| {
            thread.name(format!("{}-{}", prefix, component.user.name))
        })
        .await?;
    thread.id.add_thread_member(&ctx.http, component.user.id).await?;
    Ok(thread.id)
}

async fn on_component(
    ctx: &Context,
    component: &MessageComponentInteraction,
    data: &Data,
) -> Result<()> {
    let action = match component.data.custom_id.parse::<ButtonAction>() {
        Ok(action) => action,
        Err(err) => {
            debug!("{}", err);
            return Ok(());
        }
    };
    let user = component.user.id.0 as i64;
    let is_admin = component
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map_or(false, |p| p.administrator());
    let engine = &data.engine;

    match action {
        ButtonAction::RegisterTeam => {
            if let Err(err) = engine.registrar.ensure_can_register(user).await {
                return respond(ctx, component, rejection(&err)).await;
            }
            let thread = open_thread(ctx, data, component, "register").await?;
            match engine.registrar.open_registration(thread.0, user).await {
                Ok(greeting) => {
                    thread.say(&ctx.http, greeting).await?;
                    respond(ctx, component, format!("📝 Continue your registration in <#{}>", thread)).await
                }
                Err(err) => respond(ctx, component, rejection(&err)).await,
            }
        }
        ButtonAction::EditTeam => match engine.registrar.prepare_edit(user, is_admin).await {
            Ok(team) => {
                let thread = open_thread(ctx, data, component, "edit").await?;
                let greeting = engine.registrar.open_edit(thread.0, user, team);
                thread.say(&ctx.http, greeting).await?;
                respond(ctx, component, format!("✏️ Continue editing in <#{}>", thread)).await
            }
            Err(err) => respond(ctx, component, rejection(&err)).await,
        },
        ButtonAction::DeleteTeam => match engine.teams.disband_own(user, is_admin).await {
            Ok(team) => {
                respond(ctx, component, format!("🗑️ Team **{}** has been deleted.", team.name)).await
            }
            Err(err) => respond(ctx, component, rejection(&err)).await,
        },
        ButtonAction::CheckIn { scrim } => {
            match engine.on_check_in_button_pressed(user, &scrim).await {
                Ok(prompt) => {
                    component
                        .create_interaction_response(&ctx.http, |response| {
                            response
                                .kind(InteractionResponseType::ChannelMessageWithSource)
                                .interaction_response_data(|d| {
                                    d.ephemeral(true).embed(|e| {
                                        e.title("🔐 Captcha Verification")
                                            .description(format!(
                                                "Checking in **{}** for **{}**.\n\nType this word in the channel within {} seconds:\n\n**`{}`**",
                                                prompt.team_name,
                                                prompt.scrim_name,
                                                prompt.expires_in.num_seconds(),
                                                prompt.word
                                            ))
                                            .colour(Colour::ORANGE)
                                    })
                                })
                        })
                        .await?;
                    Ok(())
                }
                Err(err) => respond(ctx, component, rejection(&err)).await,
            }
        }
        ButtonAction::TransferLobby { lobby, date } => {
            match engine.on_transfer_lobby_role(user, lobby, date).await {
                Ok(transfer) => {
                    respond(
                        ctx,
                        component,
                        format!(
                            "✅ Lobby {} role transferred to **{}**.",
                            transfer.lobby, transfer.recipient_tag
                        ),
                    )
                    .await
                }
                Err(err) => respond(ctx, component, rejection(&err)).await,
            }
        }
    }
}
