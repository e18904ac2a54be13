use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use poise::{Framework, FrameworkOptions};
use scrimbot::clock::Calendar;
use scrimbot::config::Config;
use scrimbot::store::PgStore;
use scrimbot::Engine;
use serenity::model::gateway::GatewayIntents;
use serenity::model::id::GuildId;

use crate::discord::{DiscordNotifier, GuildLayout};

mod commands;
mod discord;
mod events;

pub struct Data {
    pub engine: Arc<Engine>,
    pub layout: GuildLayout,
}

pub type Context<'a> = poise::Context<'a, Data, anyhow::Error>;

async fn on_error(error: poise::FrameworkError<'_, Data, anyhow::Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx } => {
            error!("Command /{} failed: {:#}", ctx.command().qualified_name, error);
            let _ = ctx.say(scrimbot::error::GENERIC_FAILURE).await;
        }
        other => {
            if let Err(err) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", err);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let store = Arc::new(store);
    info!("Database ready");

    let guild = GuildId(config.guild_id);
    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(events::handle(ctx, event, data))
            },
            ..Default::default()
        })
        .token(config.discord_token.clone())
        .intents(intents)
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_in_guild(ctx, &framework.options().commands, guild)
                    .await?;
                let layout =
                    discord::provision(&ctx.http, guild, &config.verified_role, ready.user.id)
                        .await?;
                let notifier = Arc::new(DiscordNotifier::new(ctx.http.clone(), layout));
                let engine = Arc::new(Engine::new(
                    store,
                    notifier,
                    Calendar::system(config.time_zone),
                    config.settings(),
                ));
                engine.restart_ticker().await?;
                info!("{} is connected, scheduling in {}", ready.user.name, config.time_zone);
                Ok(Data { engine, layout })
            })
        });

    framework.run().await?;
    Ok(())
}
