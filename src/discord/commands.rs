//! Discord bot commands (!relay, !phrase, !emote, etc).
//!
//! Parsing is separate from execution so both can be exercised without a
//! gateway connection. Execution only touches the subscription store, the
//! outbound DGG command channel and the log filter.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::bridge::{Mutation, SubscriptionStore};
use crate::common::error::{CommandError, CommandResult};
use crate::common::logging::{parse_level, LogHandle};
use crate::common::DggCommand;

pub const HELP_TEXT: &str = r#"**Available Commands:**
• `!relay add|remove <dgg user>` - Relay a DGG user's messages to this server
• `!relay list` - List DGG users relayed to this server
• `!phrase add|remove <phrase>` - Get DMed when a phrase is said in DGG
• `!phrase list` - List your phrases
• `!phrase detect-presence on|off` - Skip phrases whose name is in DGG chat
• `!ignore add|remove <dgg user>` - Never get DMed about a DGG user
• `!live on|off` - Toggle live notifications for this server
• `!live role <@role>|none` - Role pinged by live notifications
• `!help` - Show this help message
Server commands need the relay channel and the moderator role."#;

/// A parsed `!` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    RelayAdd(String),
    RelayRemove(String),
    RelayList,
    PhraseAdd(String),
    PhraseRemove(String),
    PhraseList,
    DetectPresence(bool),
    IgnoreAdd(String),
    IgnoreRemove(String),
    LiveEnabled(bool),
    LiveRole(Option<u64>),
    EmoteAdd { token: String, replacement: String },
    EmoteRemove(String),
    EmoteList,
    ConfigRemove { table: ConfigTable, key: String },
    Send(String),
    Whisper { nick: String, text: String },
    LogLevel(String),
}

/// Tables the owner can purge wholesale with `!config remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTable {
    Relay,
    Phrase,
}

/// Guild-side facts about where a command was issued.
#[derive(Debug)]
pub struct GuildScope {
    pub name: String,
    /// Result of looking up the relay channel by name.
    pub relay_channel: CommandResult<u64>,
    /// Whether the author holds the moderator role.
    pub is_mod: bool,
}

/// Who issued a command and from where.
#[derive(Debug)]
pub struct Invocation {
    pub author: u64,
    pub author_name: String,
    /// `None` for direct messages.
    pub guild: Option<GuildScope>,
}

/// What the handler should do once a command succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// React to the command message instead of answering.
    Ack,
}

/// Split a message into a command, or `None` if it is not one of ours.
///
/// Known commands with bad arguments come back as `Some(Err(Usage))`.
pub fn parse_command(content: &str) -> Option<CommandResult<Command>> {
    let body = content.trim().strip_prefix('!')?;
    let (name, rest) = split_word(body);
    let name = name.to_lowercase();

    let parsed = match name.as_str() {
        "help" => Ok(Command::Help),
        "relay" => parse_relay(rest),
        "phrase" => parse_phrase(rest),
        "ignore" => parse_ignore(rest),
        "live" => parse_live(rest),
        "emote" => parse_emote(rest),
        "config" => parse_config(rest),
        "send" => non_empty(rest, "!send <text>").map(|text| Command::Send(text.to_string())),
        "whisper" => parse_whisper(rest),
        "loglevel" => non_empty(rest, "!loglevel warn|info|debug")
            .map(|level| Command::LogLevel(level.to_string())),
        _ => return None,
    };

    debug!("Parsed command {}: {:?}", name, parsed);
    Some(parsed)
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

fn non_empty<'a>(text: &'a str, usage: &'static str) -> CommandResult<&'a str> {
    let text = text.trim();
    if text.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(text)
    }
}

/// A single word argument with nothing after it.
fn single_word<'a>(text: &'a str, usage: &'static str) -> CommandResult<&'a str> {
    match split_word(text) {
        (word, "") if !word.is_empty() => Ok(word),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn parse_switch(text: &str, usage: &'static str) -> CommandResult<bool> {
    match text.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn parse_relay(args: &str) -> CommandResult<Command> {
    const USAGE: &str = "!relay add|remove <dgg user> or !relay list";
    let (action, rest) = split_word(args);
    match action.to_lowercase().as_str() {
        "add" => Ok(Command::RelayAdd(single_word(rest, USAGE)?.to_string())),
        "remove" => Ok(Command::RelayRemove(single_word(rest, USAGE)?.to_string())),
        "list" => Ok(Command::RelayList),
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn parse_phrase(args: &str) -> CommandResult<Command> {
    const USAGE: &str = "!phrase add|remove <phrase>, !phrase list or !phrase detect-presence on|off";
    let (action, rest) = split_word(args);
    match action.to_lowercase().as_str() {
        "add" => Ok(Command::PhraseAdd(non_empty(rest, USAGE)?.to_string())),
        "remove" => Ok(Command::PhraseRemove(non_empty(rest, USAGE)?.to_string())),
        "list" => Ok(Command::PhraseList),
        "detect-presence" => Ok(Command::DetectPresence(parse_switch(rest, USAGE)?)),
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn parse_ignore(args: &str) -> CommandResult<Command> {
    const USAGE: &str = "!ignore add|remove <dgg user>";
    let (action, rest) = split_word(args);
    match action.to_lowercase().as_str() {
        "add" => Ok(Command::IgnoreAdd(single_word(rest, USAGE)?.to_string())),
        "remove" => Ok(Command::IgnoreRemove(single_word(rest, USAGE)?.to_string())),
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn parse_live(args: &str) -> CommandResult<Command> {
    const USAGE: &str = "!live on|off or !live role <@role>|none";
    let (action, rest) = split_word(args);
    match action.to_lowercase().as_str() {
        "on" => Ok(Command::LiveEnabled(true)),
        "off" => Ok(Command::LiveEnabled(false)),
        "role" => {
            let role = single_word(rest, USAGE)?;
            if role.eq_ignore_ascii_case("none") {
                return Ok(Command::LiveRole(None));
            }
            parse_role_mention(role)
                .map(|id| Command::LiveRole(Some(id)))
                .ok_or(CommandError::Usage(USAGE))
        }
        _ => Err(CommandError::Usage(USAGE)),
    }
}

/// Accept `<@&123>` mentions as well as bare role ids.
fn parse_role_mention(text: &str) -> Option<u64> {
    let id = text
        .strip_prefix("<@&")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(text);
    id.parse::<u64>().ok().filter(|id| *id != 0)
}

fn parse_emote(args: &str) -> CommandResult<Command> {
    const USAGE: &str = "!emote add <dgg emote> <discord emote>, !emote remove <dgg emote> or !emote list";
    let (action, rest) = split_word(args);
    match action.to_lowercase().as_str() {
        "add" => {
            let (token, replacement) = split_word(rest);
            if token.is_empty() || replacement.is_empty() {
                return Err(CommandError::Usage(USAGE));
            }
            Ok(Command::EmoteAdd {
                token: token.to_string(),
                replacement: replacement.to_string(),
            })
        }
        "remove" => Ok(Command::EmoteRemove(single_word(rest, USAGE)?.to_string())),
        "list" => Ok(Command::EmoteList),
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn parse_config(args: &str) -> CommandResult<Command> {
    const USAGE: &str = "!config remove relay|phrase <key>";
    let (action, rest) = split_word(args);
    if !action.eq_ignore_ascii_case("remove") {
        return Err(CommandError::Usage(USAGE));
    }
    let (table, key) = split_word(rest);
    let table = match table.to_lowercase().as_str() {
        "relay" => ConfigTable::Relay,
        "phrase" => ConfigTable::Phrase,
        _ => return Err(CommandError::Usage(USAGE)),
    };
    Ok(Command::ConfigRemove {
        table,
        key: non_empty(key, USAGE)?.to_string(),
    })
}

fn parse_whisper(args: &str) -> CommandResult<Command> {
    const USAGE: &str = "!whisper <dgg user> <text>";
    let (nick, text) = split_word(args);
    if nick.is_empty() || text.is_empty() {
        return Err(CommandError::Usage(USAGE));
    }
    Ok(Command::Whisper {
        nick: nick.to_string(),
        text: text.to_string(),
    })
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("'{}'", item))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Executes parsed commands against the relay state.
pub struct CommandService {
    store: Arc<SubscriptionStore>,
    command_tx: mpsc::UnboundedSender<DggCommand>,
    log_handle: Option<LogHandle>,
    owner_id: u64,
    mod_role: String,
}

impl CommandService {
    pub fn new(
        store: Arc<SubscriptionStore>,
        command_tx: mpsc::UnboundedSender<DggCommand>,
        log_handle: Option<LogHandle>,
        owner_id: u64,
        mod_role: impl Into<String>,
    ) -> Self {
        Self {
            store,
            command_tx,
            log_handle,
            owner_id,
            mod_role: mod_role.into(),
        }
    }

    pub fn is_owner(&self, user: u64) -> bool {
        user == self.owner_id
    }

    /// Queue a chat command for DGG.
    pub fn send_to_dgg(&self, command: DggCommand) -> CommandResult<()> {
        self.command_tx
            .send(command)
            .map_err(|_| CommandError::DggUnavailable)
    }

    pub async fn execute(&self, invocation: Invocation, command: Command) -> CommandResult<Reply> {
        info!("{} ({}) issued {:?}", invocation.author_name, invocation.author, command);

        match command {
            Command::Help => Ok(Reply::Text(HELP_TEXT.to_string())),

            Command::RelayAdd(user) => {
                let (guild, channel) = self.moderated_guild(invocation)?;
                match self.store.add_relay(&user, channel).await? {
                    Mutation::Applied => Ok(Reply::Text(format!(
                        "Messages from '{}' will be relayed to '{}'",
                        user, guild
                    ))),
                    Mutation::Unchanged => Err(CommandError::Duplicate(format!(
                        "'{}' is already being relayed to '{}'",
                        user, guild
                    ))),
                }
            }
            Command::RelayRemove(user) => {
                let (guild, channel) = self.moderated_guild(invocation)?;
                match self.store.remove_relay(&user, channel).await? {
                    Mutation::Applied => Ok(Reply::Text(format!(
                        "Removed '{}' relay from '{}'",
                        user, guild
                    ))),
                    Mutation::Unchanged => Err(CommandError::NotFound(format!(
                        "'{}' isn't being relayed to '{}' (try `!relay list`)",
                        user, guild
                    ))),
                }
            }
            Command::RelayList => {
                let (_, channel) = self.moderated_guild(invocation)?;
                let relays = self.store.relays_for_channel(channel).await;
                if relays.is_empty() {
                    Ok(Reply::Text("No relays are active for this server.".to_string()))
                } else {
                    Ok(Reply::Text(format!(
                        "This server gets messages from: {}",
                        quoted_list(&relays)
                    )))
                }
            }

            Command::PhraseAdd(phrase) => {
                let user = self.registered_user(&invocation).await?;
                match self.store.add_phrase(&phrase, user).await? {
                    Mutation::Applied => Ok(Reply::Text(format!(
                        "Forwarding '{}' to {}",
                        phrase, invocation.author_name
                    ))),
                    Mutation::Unchanged => Err(CommandError::Duplicate(format!(
                        "'{}' is already being forwarded to {}",
                        phrase, invocation.author_name
                    ))),
                }
            }
            Command::PhraseRemove(phrase) => {
                let user = self.registered_user(&invocation).await?;
                match self.store.remove_phrase(&phrase, user).await? {
                    Mutation::Applied => Ok(Reply::Text(format!(
                        "No longer forwarding '{}' to {}",
                        phrase, invocation.author_name
                    ))),
                    Mutation::Unchanged => Err(CommandError::NotFound(format!(
                        "'{}' isn't being forwarded to {} (try `!phrase list`)",
                        phrase, invocation.author_name
                    ))),
                }
            }
            Command::PhraseList => {
                let user = self.registered_user(&invocation).await?;
                let phrases = self.store.phrases_for_user(user).await;
                if phrases.is_empty() {
                    Ok(Reply::Text("No phrases are being forwarded to you.".to_string()))
                } else {
                    Ok(Reply::Text(format!("Your phrases: {}", quoted_list(&phrases))))
                }
            }
            Command::DetectPresence(enabled) => {
                let user = self.registered_user(&invocation).await?;
                self.store.set_detect_presence(user, enabled).await?;
                let word = if enabled { "enabled" } else { "disabled" };
                Ok(Reply::Text(format!(
                    "Presence detection {} for {}",
                    word, invocation.author_name
                )))
            }

            Command::IgnoreAdd(nick) => {
                let user = self.registered_user(&invocation).await?;
                self.store.add_ignore(user, &nick).await?;
                Ok(Reply::Text(format!("'{}' added to your ignore list", nick)))
            }
            Command::IgnoreRemove(nick) => {
                let user = self.registered_user(&invocation).await?;
                match self.store.remove_ignore(user, &nick).await? {
                    Mutation::Applied => {
                        Ok(Reply::Text(format!("'{}' removed from your ignore list", nick)))
                    }
                    Mutation::Unchanged => Err(CommandError::NotFound(format!(
                        "'{}' is not in your ignore list",
                        nick
                    ))),
                }
            }

            Command::LiveEnabled(enabled) => {
                let (guild, channel) = self.moderated_guild(invocation)?;
                self.store.set_live_enabled(channel, enabled).await?;
                let word = if enabled { "enabled" } else { "disabled" };
                Ok(Reply::Text(format!(
                    "Live notifications {} for {}",
                    word, guild
                )))
            }
            Command::LiveRole(role) => {
                let (guild, channel) = self.moderated_guild(invocation)?;
                self.store.set_live_role(channel, role).await?;
                Ok(Reply::Text(match role {
                    Some(role) => format!(
                        "<@&{}> will be pinged for live notifications in {}",
                        role, guild
                    ),
                    None => format!("Live notifications in {} will not ping a role", guild),
                }))
            }

            Command::EmoteAdd { token, replacement } => {
                self.require_owner(&invocation, "emote")?;
                self.store.add_emote(&token, &replacement).await?;
                Ok(Reply::Text(format!("Translating {} to {}", token, replacement)))
            }
            Command::EmoteRemove(token) => {
                self.require_owner(&invocation, "emote")?;
                match self.store.remove_emote(&token).await? {
                    Mutation::Applied => Ok(Reply::Text(format!("Removed {} from emotes", token))),
                    Mutation::Unchanged => {
                        Err(CommandError::NotFound(format!("Couldn't find emote {}", token)))
                    }
                }
            }
            Command::EmoteList => {
                self.require_owner(&invocation, "emote")?;
                let emotes = self.store.emotes().await;
                if emotes.is_empty() {
                    return Ok(Reply::Text("No emotes configured.".to_string()));
                }
                let lines = emotes
                    .iter()
                    .map(|(token, replacement)| format!("`{}` → {}", token, replacement))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(Reply::Text(lines))
            }

            Command::ConfigRemove { table, key } => {
                self.require_owner(&invocation, "config")?;
                let (outcome, name) = match table {
                    ConfigTable::Relay => (self.store.purge_relay(&key).await?, "relays"),
                    ConfigTable::Phrase => (self.store.purge_phrase(&key).await?, "phrases"),
                };
                match outcome {
                    Mutation::Applied => Ok(Reply::Text(format!("Removed '{}' from {}", key, name))),
                    Mutation::Unchanged => Err(CommandError::NotFound(format!(
                        "Couldn't find '{}' in {}",
                        key, name
                    ))),
                }
            }

            Command::Send(text) => {
                self.require_owner(&invocation, "send")?;
                self.send_to_dgg(DggCommand::Send { text })?;
                Ok(Reply::Ack)
            }
            Command::Whisper { nick, text } => {
                self.require_owner(&invocation, "whisper")?;
                self.send_to_dgg(DggCommand::Whisper { nick, text })?;
                Ok(Reply::Ack)
            }
            Command::LogLevel(level) => {
                self.require_owner(&invocation, "loglevel")?;
                let level = parse_level(&level)?;
                let handle = self
                    .log_handle
                    .as_ref()
                    .ok_or_else(|| CommandError::LogReload("log filter is not reloadable".to_string()))?;
                handle.set_level(level)?;
                info!("Log level set to {}", level);
                Ok(Reply::Text(format!("Log level set to {}", level)))
            }
        }
    }

    /// Guild commands need a guild, its relay channel and the moderator role.
    fn moderated_guild(&self, invocation: Invocation) -> CommandResult<(String, u64)> {
        let guild = invocation.guild.ok_or(CommandError::GuildOnly)?;
        let channel = guild.relay_channel?;
        if !guild.is_mod {
            return Err(CommandError::MissingRole(self.mod_role.clone()));
        }
        Ok((guild.name, channel))
    }

    /// Per-user commands create the author's preferences on first use.
    async fn registered_user(&self, invocation: &Invocation) -> CommandResult<u64> {
        self.store.ensure_preference(invocation.author).await?;
        Ok(invocation.author)
    }

    fn require_owner(&self, invocation: &Invocation, command: &str) -> CommandResult<()> {
        if self.is_owner(invocation.author) {
            Ok(())
        } else {
            info!("{} tried to use the {} command", invocation.author, command);
            Err(CommandError::OwnerOnly(command.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::subscriptions::{NoopSaveHook, Subscriptions};
    use tokio_test::{assert_err, assert_ok};

    const OWNER: u64 = 1;
    const MEMBER: u64 = 2;
    const RELAY_CHANNEL: u64 = 500;

    fn service() -> (CommandService, Arc<SubscriptionStore>, mpsc::UnboundedReceiver<DggCommand>) {
        let store = Arc::new(SubscriptionStore::new(
            Subscriptions::default(),
            Box::new(NoopSaveHook),
        ));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let service = CommandService::new(store.clone(), command_tx, None, OWNER, "dgg-relay-mod");
        (service, store, command_rx)
    }

    fn dm(author: u64) -> Invocation {
        Invocation {
            author,
            author_name: format!("user{}", author),
            guild: None,
        }
    }

    fn in_guild(author: u64, is_mod: bool) -> Invocation {
        Invocation {
            author,
            author_name: format!("user{}", author),
            guild: Some(GuildScope {
                name: "Test Server".to_string(),
                relay_channel: Ok(RELAY_CHANNEL),
                is_mod,
            }),
        }
    }

    fn text(reply: CommandResult<Reply>) -> String {
        match reply {
            Ok(Reply::Text(text)) => text,
            other => panic!("expected a text reply, got {:?}", other),
        }
    }

    fn parse(content: &str) -> Command {
        parse_command(content).unwrap().unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("!relay add Destiny"), Command::RelayAdd("Destiny".to_string()));
        assert_eq!(parse("!RELAY list"), Command::RelayList);
        assert_eq!(
            parse("!phrase add  hello there "),
            Command::PhraseAdd("hello there".to_string())
        );
        assert_eq!(parse("!phrase detect-presence on"), Command::DetectPresence(true));
        assert_eq!(parse("!live role <@&123>"), Command::LiveRole(Some(123)));
        assert_eq!(parse("!live role none"), Command::LiveRole(None));
        assert_eq!(
            parse("!emote add :) <:smile:1>"),
            Command::EmoteAdd {
                token: ":)".to_string(),
                replacement: "<:smile:1>".to_string()
            }
        );
        assert_eq!(
            parse("!config remove phrase bob"),
            Command::ConfigRemove {
                table: ConfigTable::Phrase,
                key: "bob".to_string()
            }
        );
        assert_eq!(
            parse("!whisper bob hi there"),
            Command::Whisper {
                nick: "bob".to_string(),
                text: "hi there".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(parse_command("hello").is_none());
        assert!(parse_command("!unknown thing").is_none());
        assert!(matches!(parse_command("!relay add"), Some(Err(CommandError::Usage(_)))));
        assert!(matches!(parse_command("!relay add two words"), Some(Err(CommandError::Usage(_)))));
        assert!(matches!(parse_command("!live role @everyone"), Some(Err(CommandError::Usage(_)))));
        assert!(matches!(parse_command("!phrase detect-presence maybe"), Some(Err(CommandError::Usage(_)))));
        assert!(matches!(parse_command("!send"), Some(Err(CommandError::Usage(_)))));
    }

    #[tokio::test]
    async fn test_relay_add_and_list() {
        let (service, store, _rx) = service();

        let reply = service
            .execute(in_guild(MEMBER, true), Command::RelayAdd("Destiny".to_string()))
            .await;
        assert_eq!(text(reply), "Messages from 'Destiny' will be relayed to 'Test Server'");
        assert_eq!(store.relays_for("destiny").await, vec![RELAY_CHANNEL]);

        let again = assert_err!(
            service
                .execute(in_guild(MEMBER, true), Command::RelayAdd("Destiny".to_string()))
                .await
        );
        assert!(matches!(again, CommandError::Duplicate(_)));

        let list = service.execute(in_guild(MEMBER, true), Command::RelayList).await;
        assert_eq!(text(list), "This server gets messages from: 'Destiny'");
    }

    #[tokio::test]
    async fn test_guild_checks_run_in_order() {
        let (service, _store, _rx) = service();

        let from_dm = service.execute(dm(MEMBER), Command::RelayList).await;
        assert!(matches!(from_dm, Err(CommandError::GuildOnly)));

        let mut no_channel = in_guild(MEMBER, false);
        if let Some(guild) = no_channel.guild.as_mut() {
            guild.relay_channel = Err(CommandError::NoRelayChannel("dgg-relay".to_string()));
        }
        let result = service.execute(no_channel, Command::RelayList).await;
        assert!(matches!(result, Err(CommandError::NoRelayChannel(_))));

        let not_mod = service.execute(in_guild(MEMBER, false), Command::LiveEnabled(true)).await;
        assert!(matches!(not_mod, Err(CommandError::MissingRole(role)) if role == "dgg-relay-mod"));
    }

    #[tokio::test]
    async fn test_phrase_commands_register_the_user() {
        let (service, store, _rx) = service();

        let reply = service.execute(dm(MEMBER), Command::PhraseList).await;
        assert_eq!(text(reply), "No phrases are being forwarded to you.");
        assert!(store.read().await.user_prefs.contains_key(&MEMBER));

        service
            .execute(dm(MEMBER), Command::PhraseAdd("bob".to_string()))
            .await
            .unwrap();
        let list = service.execute(dm(MEMBER), Command::PhraseList).await;
        assert_eq!(text(list), "Your phrases: 'bob'");

        let missing = service
            .execute(dm(MEMBER), Command::PhraseRemove("carol".to_string()))
            .await;
        assert!(matches!(missing, Err(CommandError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_ignore_and_presence() {
        let (service, store, _rx) = service();

        assert_ok!(
            service
                .execute(dm(MEMBER), Command::IgnoreAdd("Troll".to_string()))
                .await
        );
        let reply = service.execute(dm(MEMBER), Command::DetectPresence(true)).await;
        assert_eq!(text(reply), "Presence detection enabled for user2");

        let preference = store.read().await.preference(MEMBER);
        assert!(preference.detect_presence);
        assert!(preference.ignores.contains("troll"));

        let removed = service
            .execute(dm(MEMBER), Command::IgnoreRemove("troll".to_string()))
            .await;
        assert_eq!(text(removed), "'troll' removed from your ignore list");
    }

    #[tokio::test]
    async fn test_live_role() {
        let (service, store, _rx) = service();

        let reply = service.execute(in_guild(MEMBER, true), Command::LiveRole(Some(77))).await;
        assert_eq!(
            text(reply),
            "<@&77> will be pinged for live notifications in Test Server"
        );
        assert_eq!(
            store.read().await.live.channels.get(&RELAY_CHANNEL).and_then(|c| c.role),
            Some(77)
        );
    }

    #[tokio::test]
    async fn test_owner_only_commands() {
        let (service, store, mut rx) = service();

        let denied = service
            .execute(dm(MEMBER), Command::Send("hello".to_string()))
            .await;
        assert!(matches!(denied, Err(CommandError::OwnerOnly(name)) if name == "send"));

        let sent = assert_ok!(
            service
                .execute(dm(OWNER), Command::Send("hello".to_string()))
                .await
        );
        assert_eq!(sent, Reply::Ack);
        assert_eq!(
            rx.recv().await,
            Some(DggCommand::Send {
                text: "hello".to_string()
            })
        );

        service
            .execute(
                dm(OWNER),
                Command::EmoteAdd {
                    token: ":)".to_string(),
                    replacement: "<:smile:1>".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(store.emotes().await.get(":)").map(String::as_str), Some("<:smile:1>"));
        let list = service.execute(dm(OWNER), Command::EmoteList).await;
        assert_eq!(text(list), "`:)` → <:smile:1>");
    }

    #[tokio::test]
    async fn test_config_remove_purges_key() {
        let (service, store, _rx) = service();
        store.add_relay("Destiny", 10).await.unwrap();
        store.add_relay("Destiny", 11).await.unwrap();

        let reply = service
            .execute(
                dm(OWNER),
                Command::ConfigRemove {
                    table: ConfigTable::Relay,
                    key: "Destiny".to_string(),
                },
            )
            .await;
        assert_eq!(text(reply), "Removed 'Destiny' from relays");
        assert!(store.relays_for("Destiny").await.is_empty());
    }

    #[tokio::test]
    async fn test_dgg_unavailable_and_log_level() {
        let (service, _store, rx) = service();
        drop(rx);

        let result = service
            .execute(
                dm(OWNER),
                Command::Whisper {
                    nick: "bob".to_string(),
                    text: "hi".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(CommandError::DggUnavailable)));

        let bad_level = service.execute(dm(OWNER), Command::LogLevel("loud".to_string())).await;
        assert!(matches!(bad_level, Err(CommandError::InvalidLogLevel(_))));
        let no_handle = service.execute(dm(OWNER), Command::LogLevel("debug".to_string())).await;
        assert!(matches!(no_handle, Err(CommandError::LogReload(_))));
    }
}
