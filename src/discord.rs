use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::info;
use scrimbot::interaction::ButtonAction;
use scrimbot::lobby::LOBBY_CAPACITY;
use scrimbot::notify::{Announcement, Notifier};
use scrimbot::utils::{format_slot_list, lobby_channel_name, lobby_role_name};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::component::ButtonStyle;
use serenity::model::channel::{ChannelType, PermissionOverwrite, PermissionOverwriteType};
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};
use serenity::model::permissions::Permissions;
use serenity::model::Timestamp;
use serenity::utils::Colour;
use tokio::sync::Mutex;

pub const CATEGORY: &str = "Scrims";
pub const REGISTRATION_CHANNEL: &str = "scrim-registration";
pub const CHECK_IN_CHANNEL: &str = "register-here";
pub const LOG_CHANNEL: &str = "scrim-log";

const PANEL_TITLE: &str = "🎮 Team Registration";

/// Channels and roles the bot works with, resolved once at startup.
#[derive(Debug, Clone, Copy)]
pub struct GuildLayout {
    pub guild: GuildId,
    pub category: ChannelId,
    pub registration: ChannelId,
    pub check_in: ChannelId,
    pub log: ChannelId,
    pub verified_role: RoleId,
}

fn role_overwrite(role: RoleId, allow: Permissions, deny: Permissions) -> PermissionOverwrite {
    PermissionOverwrite {
        allow,
        deny,
        kind: PermissionOverwriteType::Role(role),
    }
}

async fn find_or_create_role(http: &Http, guild: GuildId, name: &str) -> Result<RoleId> {
    let roles = guild.roles(http).await?;
    if let Some(role) = roles.values().find(|role| role.name == name) {
        return Ok(role.id);
    }
    let role = guild.create_role(http, |role| role.name(name)).await?;
    info!("Created role {}", name);
    Ok(role.id)
}

async fn find_or_create_channel(
    http: &Http,
    guild: GuildId,
    category: ChannelId,
    name: &str,
    overwrites: Vec<PermissionOverwrite>,
) -> Result<ChannelId> {
    let channels = guild.channels(http).await?;
    if let Some(channel) = channels
        .values()
        .find(|c| c.name == name && c.parent_id == Some(category))
    {
        return Ok(channel.id);
    }
    let channel = guild
        .create_channel(http, |channel| {
            channel
                .name(name)
                .kind(ChannelType::Text)
                .category(category)
                .permissions(overwrites)
        })
        .await?;
    info!("Created channel #{}", name);
    Ok(channel.id)
}

/// Makes sure the category, channels, verified role and registration panel exist.
pub async fn provision(
    http: &Http,
    guild: GuildId,
    verified_role: &str,
    bot: UserId,
) -> Result<GuildLayout> {
    let channels = guild.channels(http).await?;
    let category = match channels
        .values()
        .find(|c| c.kind == ChannelType::Category && c.name == CATEGORY)
    {
        Some(category) => category.id,
        None => {
            guild
                .create_channel(http, |channel| channel.name(CATEGORY).kind(ChannelType::Category))
                .await?
                .id
        }
    };
    let verified = find_or_create_role(http, guild, verified_role).await?;
    let everyone = RoleId(guild.0);

    let registration =
        find_or_create_channel(http, guild, category, REGISTRATION_CHANNEL, Vec::new()).await?;
    let check_in = find_or_create_channel(
        http,
        guild,
        category,
        CHECK_IN_CHANNEL,
        vec![
            role_overwrite(everyone, Permissions::empty(), Permissions::VIEW_CHANNEL),
            role_overwrite(verified, Permissions::VIEW_CHANNEL, Permissions::SEND_MESSAGES),
        ],
    )
    .await?;
    let log = find_or_create_channel(
        http,
        guild,
        category,
        LOG_CHANNEL,
        vec![role_overwrite(everyone, Permissions::empty(), Permissions::VIEW_CHANNEL)],
    )
    .await?;

    post_registration_panel(http, registration, bot).await?;
    Ok(GuildLayout {
        guild,
        category,
        registration,
        check_in,
        log,
        verified_role: verified,
    })
}

/// Edits the pinned panel in place, or posts and pins a new one.
async fn post_registration_panel(http: &Http, channel: ChannelId, bot: UserId) -> Result<()> {
    let description = "Click the buttons below to manage your team:\n\n\
        ✅ **Register Team** - Create a new team\n\
        ✏️ **Edit Team** - Modify your team details\n\
        🗑️ **Delete Team** - Remove your team";
    let pinned = channel
        .pins(http)
        .await?
        .into_iter()
        .find(|m| m.author.id == bot && m.embeds.iter().any(|e| e.title.as_deref() == Some(PANEL_TITLE)));

    match pinned {
        Some(mut message) => {
            message
                .edit(http, |m| {
                    m.embed(|e| e.title(PANEL_TITLE).description(description).colour(Colour::BLUE))
                        .components(|c| c.create_action_row(|row| team_buttons(row)))
                })
                .await?;
        }
        None => {
            let message = channel
                .send_message(http, |m| {
                    m.embed(|e| e.title(PANEL_TITLE).description(description).colour(Colour::BLUE))
                        .components(|c| c.create_action_row(|row| team_buttons(row)))
                })
                .await?;
            message.pin(http).await?;
        }
    }
    Ok(())
}

fn team_buttons(
    row: &mut serenity::builder::CreateActionRow,
) -> &mut serenity::builder::CreateActionRow {
    row.create_button(|b| {
        b.custom_id(ButtonAction::RegisterTeam)
            .label("✅ Register Team")
            .style(ButtonStyle::Success)
    })
    .create_button(|b| {
        b.custom_id(ButtonAction::EditTeam)
            .label("✏️ Edit Team")
            .style(ButtonStyle::Primary)
    })
    .create_button(|b| {
        b.custom_id(ButtonAction::DeleteTeam)
            .label("🗑️ Delete Team")
            .style(ButtonStyle::Danger)
    })
}

pub struct DiscordNotifier {
    http: Arc<Http>,
    layout: GuildLayout,
    /// Serializes role creation so concurrent check-ins don't create duplicates.
    roles: Mutex<()>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>, layout: GuildLayout) -> Self {
        Self {
            http,
            layout,
            roles: Mutex::new(()),
        }
    }

    async fn lobby_channel(&self, lobby: i32, role: RoleId) -> Result<ChannelId> {
        find_or_create_channel(
            &self.http,
            self.layout.guild,
            self.layout.category,
            &lobby_channel_name(lobby),
            vec![
                role_overwrite(RoleId(self.layout.guild.0), Permissions::empty(), Permissions::VIEW_CHANNEL),
                role_overwrite(
                    role,
                    Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
                    Permissions::empty(),
                ),
            ],
        )
        .await
    }

    async fn post_roster(
        &self,
        scrim: &str,
        date: chrono::NaiveDate,
        lobby: i32,
        teams: &[(String, String)],
    ) -> Result<()> {
        let role = self.ensure_role(&lobby_role_name(lobby)).await?;
        let channel = self.lobby_channel(lobby, RoleId(role)).await?;
        let transfer = ButtonAction::TransferLobby { lobby, date };
        channel
            .send_message(&self.http, |m| {
                m.embed(|e| {
                    e.title(format!("🏆 {} - Lobby {}", scrim, lobby))
                        .description(format_slot_list(teams, lobby, LOBBY_CAPACITY))
                        .colour(Colour::GOLD)
                        .timestamp(Timestamp::now())
                        .footer(|f| f.text(format!("Scrim Date: {}", date.format("%Y-%m-%d"))))
                })
                .components(|c| {
                    c.create_action_row(|row| {
                        row.create_button(|b| {
                            b.custom_id(transfer)
                                .label("🔄 Transfer Role")
                                .style(ButtonStyle::Primary)
                        })
                    })
                })
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn announce(&self, announcement: Announcement) -> Result<()> {
        match announcement {
            Announcement::CheckInOpened {
                scrim,
                mention_role,
                closes_at,
            } => {
                let mention = mention_role.map(|r| format!("<@&{r}>")).unwrap_or_default();
                let check_in = ButtonAction::CheckIn {
                    scrim: scrim.clone(),
                };
                self.layout
                    .check_in
                    .send_message(&self.http, |m| {
                        m.content(mention)
                            .embed(|e| {
                                e.title(format!("🔔 {} Check-In OPEN", scrim))
                                    .description(format!(
                                        "Check-in is now open! Click the button below and complete the captcha to check in your team.\n\n**Check-in closes at:** {}",
                                        closes_at
                                    ))
                                    .colour(Colour::DARK_GREEN)
                                    .timestamp(Timestamp::now())
                            })
                            .components(|c| {
                                c.create_action_row(|row| {
                                    row.create_button(|b| {
                                        b.custom_id(check_in)
                                            .label("✅ Check In Team")
                                            .style(ButtonStyle::Success)
                                    })
                                })
                            })
                    })
                    .await?;
            }
            Announcement::CheckInClosed { scrim, total } => {
                self.layout
                    .check_in
                    .send_message(&self.http, |m| {
                        m.embed(|e| {
                            e.title(format!("🔒 {} Check-In CLOSED", scrim))
                                .description(format!(
                                    "Check-in has ended.\n\n**Total Teams Checked In:** {}",
                                    total
                                ))
                                .colour(Colour::RED)
                                .timestamp(Timestamp::now())
                        })
                    })
                    .await?;
            }
            Announcement::LobbyRoster {
                scrim,
                date,
                lobby,
                teams,
            } => self.post_roster(&scrim, date, lobby, &teams).await?,
        }
        Ok(())
    }

    async fn log(&self, line: String) -> Result<()> {
        self.layout.log.say(&self.http, line).await?;
        Ok(())
    }

    async fn set_check_in_open(&self, open: bool) -> Result<()> {
        let (allow, deny) = if open {
            (Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES, Permissions::empty())
        } else {
            (Permissions::VIEW_CHANNEL, Permissions::SEND_MESSAGES)
        };
        self.layout
            .check_in
            .create_permission(&self.http, &role_overwrite(self.layout.verified_role, allow, deny))
            .await?;
        Ok(())
    }

    async fn find_role(&self, name: &str) -> Result<Option<u64>> {
        let roles = self.layout.guild.roles(&self.http).await?;
        Ok(roles.values().find(|r| r.name == name).map(|r| r.id.0))
    }

    async fn ensure_role(&self, name: &str) -> Result<u64> {
        let _guard = self.roles.lock().await;
        Ok(find_or_create_role(&self.http, self.layout.guild, name).await?.0)
    }

    async fn grant_role(&self, user: i64, role: u64) -> Result<()> {
        let mut member = self.layout.guild.member(&*self.http, user as u64).await?;
        member.add_role(&self.http, role).await?;
        Ok(())
    }

    async fn revoke_role(&self, user: i64, role: u64) -> Result<()> {
        let mut member = self.layout.guild.member(&*self.http, user as u64).await?;
        member.remove_role(&self.http, role).await?;
        Ok(())
    }

    async fn has_role(&self, user: i64, role: u64) -> Result<bool> {
        let member = self.layout.guild.member(&*self.http, user as u64).await?;
        Ok(member.roles.contains(&RoleId(role)))
    }

    async fn resolve_member(&self, user: i64) -> Result<Option<String>> {
        match self.layout.guild.member(&*self.http, user as u64).await {
            Ok(member) => Ok(Some(member.user.tag())),
            Err(serenity::Error::Http(_)) => Ok(None),
            Err(err) => Err(anyhow!(err)),
        }
    }

    async fn archive_conversation(&self, conversation: u64) -> Result<()> {
        ChannelId(conversation)
            .edit_thread(&self.http, |thread| thread.archived(true))
            .await?;
        Ok(())
    }
}
