//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Discord
    if config.discord.token.is_empty() {
        errors.push("discord.token is required".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }
    if config.discord.owner_id == 0 {
        errors.push("discord.owner_id must be non-zero".to_string());
    }
    if config.discord.relay_channel.is_empty() {
        errors.push("discord.relay_channel must not be empty".to_string());
    }
    if config.discord.mod_role.is_empty() {
        errors.push("discord.mod_role must not be empty".to_string());
    }

    // DGG
    for (key, url) in [("dgg.chat_url", &config.dgg.chat_url), ("dgg.live_url", &config.dgg.live_url)] {
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            errors.push(format!("{} '{}' must be a ws:// or wss:// url", key, url));
        }
    }
    if config.dgg.auth_token.as_deref() == Some("") {
        errors.push("dgg.auth_token is set but empty".to_string());
    }

    // Relay engine
    if config.relay.flush_interval_secs == 0 {
        errors.push("relay.flush_interval_secs must be non-zero".to_string());
    }
    if config.relay.max_message_len < 100 || config.relay.max_message_len > 2000 {
        errors.push(format!(
            "relay.max_message_len must be 100-2000 (got {})",
            config.relay.max_message_len
        ));
    }
    if config.relay.subscriptions_path.is_empty() {
        errors.push("relay.subscriptions_path is required".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "valid_token_here".to_string(),
                owner_id: 123456789,
                relay_channel: "dgg-relay".to_string(),
                mod_role: "dgg-relay-mod".to_string(),
            },
            dgg: DggConfig {
                auth_token: Some("cookie".to_string()),
                chat_url: "wss://chat.destiny.gg/ws".to_string(),
                live_url: "wss://live.destiny.gg/".to_string(),
            },
            relay: RelayConfig::default(),
            live: LiveConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("discord.token"));
    }

    #[test]
    fn test_placeholder_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = "YOUR_DISCORD_TOKEN_HERE".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("placeholder"));
    }

    #[test]
    fn test_non_websocket_url_fails() {
        let mut config = make_valid_config();
        config.dgg.chat_url = "https://chat.destiny.gg".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("dgg.chat_url"));
    }

    #[test]
    fn test_message_len_out_of_range_fails() {
        let mut config = make_valid_config();
        config.relay.max_message_len = 4000;

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("100-2000"));
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = make_valid_config();
        config.discord.owner_id = 0;
        config.relay.flush_interval_secs = 0;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("discord.owner_id"));
        assert!(message.contains("relay.flush_interval_secs"));
    }
}
