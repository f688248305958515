//! Discord message event handling.
//!
//! Dispatches `!` commands, turns the owner's replies to relayed lines into
//! DGG chat, and forwards DGG whispers to the owner.

use std::sync::Arc;

use fancy_regex::Regex;
use serenity::model::channel::{ChannelType, Message};
use serenity::model::guild::Guild;
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use crate::bridge::renderer::TextRenderer;
use crate::bridge::{Platform, SubscriptionStore};
use crate::common::error::{CommandError, CommandResult};
use crate::common::{Destination, DggCommand, Whisper};
use crate::config::types::DiscordConfig;
use crate::discord::commands::{parse_command, CommandService, GuildScope, Invocation, Reply};
use crate::discord::platform::DiscordPlatform;

/// Find the relay channel of a guild by name.
pub fn relay_channel_for(guild: &Guild, name: &str) -> CommandResult<ChannelId> {
    guild
        .channels
        .values()
        .find(|channel| channel.kind == ChannelType::Text && channel.name == name)
        .map(|channel| channel.id)
        .ok_or_else(|| CommandError::NoRelayChannel(name.to_string()))
}

/// Maps the owner's replies to relayed lines onto DGG commands.
pub struct ReplyBridge {
    /// `**nick:** ...` or `W **nick:** ...`, with renderer escapes in the nick.
    pattern: Regex,
}

impl ReplyBridge {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"^(W )?\*\*((?:\\_|\w)+):\*\*").unwrap(),
        }
    }

    /// The command for a reply to `referenced`, if it was a relayed line.
    pub fn command_for(&self, referenced: &str, reply: &str) -> Option<DggCommand> {
        let reply = reply.trim();
        if reply.is_empty() {
            return None;
        }

        let captures = match self.pattern.captures(referenced) {
            Ok(Some(captures)) => captures,
            Ok(None) => return None,
            Err(e) => {
                warn!("Reply pattern failed: {}", e);
                return None;
            }
        };
        let nick = captures.get(2)?.as_str().replace("\\_", "_");

        if captures.get(1).is_some() {
            Some(DggCommand::Whisper {
                nick,
                text: reply.to_string(),
            })
        } else {
            Some(DggCommand::Send {
                text: format!("{} {}", nick, reply),
            })
        }
    }
}

impl Default for ReplyBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles Discord messages and DGG whispers.
pub struct BridgeHandler {
    commands: CommandService,
    replies: ReplyBridge,
    renderer: TextRenderer,
    store: Arc<SubscriptionStore>,
    platform: Arc<DiscordPlatform>,
    owner_id: u64,
    relay_channel: String,
    mod_role: String,
}

impl BridgeHandler {
    pub fn new(
        commands: CommandService,
        store: Arc<SubscriptionStore>,
        platform: Arc<DiscordPlatform>,
        config: &DiscordConfig,
    ) -> Self {
        Self {
            commands,
            replies: ReplyBridge::new(),
            renderer: TextRenderer::new(),
            store,
            platform,
            owner_id: config.owner_id,
            relay_channel: config.relay_channel.clone(),
            mod_role: config.mod_role.clone(),
        }
    }

    pub async fn handle_message(&self, ctx: Context, msg: Message) {
        // Ignore our own messages and other bots
        if msg.author.id == ctx.cache.current_user().id || msg.author.bot {
            return;
        }

        let content = msg.content.trim();
        if content.is_empty() {
            return;
        }

        if msg.author.id.get() == self.owner_id {
            if let Some(command) = self.owner_reply(&ctx, &msg) {
                self.forward_owner_reply(&ctx, &msg, command).await;
                return;
            }
        }

        let Some(parsed) = parse_command(content) else {
            return;
        };

        let result = match parsed {
            Ok(command) => {
                let invocation = Invocation {
                    author: msg.author.id.get(),
                    author_name: msg.author.name.clone(),
                    guild: self.guild_scope(&ctx, &msg),
                };
                self.commands.execute(invocation, command).await
            }
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(Reply::Text(text)) => msg.channel_id.say(&ctx.http, text).await.map(|_| ()),
            Ok(Reply::Ack) => msg.react(&ctx.http, '☑').await.map(|_| ()),
            Err(e) => {
                info!("Command from {} failed: {}", msg.author.name, e);
                msg.channel_id
                    .say(&ctx.http, format!("**Error:** {}", e))
                    .await
                    .map(|_| ())
            }
        };
        if let Err(e) = outcome {
            error!("Failed to answer command from {}: {}", msg.author.name, e);
        }
    }

    /// A reply by the owner to one of our relayed lines.
    fn owner_reply(&self, ctx: &Context, msg: &Message) -> Option<DggCommand> {
        let referenced = msg.referenced_message.as_ref()?;
        if referenced.author.id != ctx.cache.current_user().id {
            return None;
        }
        self.replies.command_for(&referenced.content, &msg.content)
    }

    async fn forward_owner_reply(&self, ctx: &Context, msg: &Message, command: DggCommand) {
        debug!("Owner reply forwarded to DGG: {:?}", command);
        let reaction = match command {
            DggCommand::Whisper { .. } => '✅',
            DggCommand::Send { .. } => '☑',
        };

        let result = match self.commands.send_to_dgg(command) {
            Ok(()) => msg.react(&ctx.http, reaction).await.map(|_| ()),
            Err(e) => msg
                .channel_id
                .say(&ctx.http, format!("**Error:** {}", e))
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            warn!("Failed to acknowledge owner reply: {}", e);
        }
    }

    /// Guild facts for the command layer. `None` in DMs.
    fn guild_scope(&self, ctx: &Context, msg: &Message) -> Option<GuildScope> {
        let guild_id = msg.guild_id?;
        let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
            warn!("Guild {} is not cached", guild_id);
            return Some(GuildScope {
                name: guild_id.to_string(),
                relay_channel: Err(CommandError::NoRelayChannel(self.relay_channel.clone())),
                is_mod: false,
            });
        };

        let is_mod = msg.member.as_ref().is_some_and(|member| {
            member.roles.iter().any(|role| {
                guild
                    .roles
                    .get(role)
                    .is_some_and(|role| role.name == self.mod_role)
            })
        });

        Some(GuildScope {
            name: guild.name.clone(),
            relay_channel: relay_channel_for(&guild, &self.relay_channel).map(|id| id.get()),
            is_mod,
        })
    }

    /// DM a DGG whisper to the owner as `W **nick:** text`.
    pub async fn handle_whisper(&self, whisper: Whisper) {
        let emotes = self.store.emotes().await;
        let text = format!("W {}", self.renderer.render(&whisper.sender, &whisper.text, &emotes));

        let owner = Destination::User(self.owner_id);
        let Some(handle) = self.platform.resolve(owner).await else {
            warn!("Could not reach the owner, dropping whisper from {}", whisper.sender);
            return;
        };
        match self.platform.send(&handle, text).await {
            Ok(()) => debug!("Forwarded whisper from {} to the owner", whisper.sender),
            Err(e) => error!("Failed to forward whisper from {}: {}", whisper.sender, e),
        }
    }
}
