//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `DGG_RELAY_DISCORD_TOKEN` - Discord bot token
//! - `DGG_RELAY_DGG_AUTH` - DGG `authtoken` cookie value
//! - `DGG_RELAY_OWNER_ID` - Discord user id of the bot owner

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "DGG_RELAY";

/// Apply environment variable overrides to a config.
///
/// This allows secrets to be provided via environment variables
/// instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }

    if let Ok(auth) = env::var(format!("{}_DGG_AUTH", ENV_PREFIX)) {
        if !auth.is_empty() {
            config.dgg.auth_token = Some(auth);
        }
    }

    if let Ok(owner) = env::var(format!("{}_OWNER_ID", ENV_PREFIX)) {
        if let Ok(id) = owner.parse() {
            config.discord.owner_id = id;
        }
    }

    config
}

/// Check if any secret environment variables are set but empty.
///
/// Returns a list of variable names that are set but empty.
pub fn check_empty_env_vars() -> Vec<String> {
    let vars = [
        format!("{}_DISCORD_TOKEN", ENV_PREFIX),
        format!("{}_DGG_AUTH", ENV_PREFIX),
    ];

    vars.into_iter()
        .filter(|var| env::var(var).map(|v| v.is_empty()).unwrap_or(false))
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `DGG_RELAY_CONFIG` environment variable, otherwise returns "dgg-relay.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "dgg-relay.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_test_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "original_token".to_string(),
                owner_id: 1,
                relay_channel: "dgg-relay".to_string(),
                mod_role: "dgg-relay-mod".to_string(),
            },
            dgg: DggConfig {
                auth_token: None,
                chat_url: "wss://chat.destiny.gg/ws".to_string(),
                live_url: "wss://live.destiny.gg/".to_string(),
            },
            relay: RelayConfig::default(),
            live: LiveConfig::default(),
        }
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "DGG_RELAY");
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("DGG_RELAY_CONFIG");
        assert_eq!(get_config_path(), "dgg-relay.conf");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("DGG_RELAY_DISCORD_TOKEN");
        env::remove_var("DGG_RELAY_DGG_AUTH");
        env::remove_var("DGG_RELAY_OWNER_ID");

        let config = make_test_config();
        let result = apply_env_overrides(config);

        assert_eq!(result.discord.token, "original_token");
        assert_eq!(result.discord.owner_id, 1);
        assert!(result.dgg.auth_token.is_none());
    }
}
