//! Configuration file parsing (HOCON format).

use std::path::Path;

use crate::common::error::ConfigError;
use crate::config::types::Config;
use hocon::HoconLoader;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    HoconLoader::new()
        .load_file(path)
        .map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MAX_MESSAGE_LEN};

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_str(
            r#"
            discord {
                token = "abc"
                owner_id = 42
            }
            dgg {}
            "#,
        )
        .unwrap();

        assert_eq!(config.discord.owner_id, 42);
        assert_eq!(config.discord.relay_channel, "dgg-relay");
        assert_eq!(config.discord.mod_role, "dgg-relay-mod");
        assert_eq!(config.dgg.chat_url, "wss://chat.destiny.gg/ws");
        assert!(config.dgg.auth_token.is_none());
        assert_eq!(config.relay.flush_interval_secs, DEFAULT_FLUSH_INTERVAL_SECS);
        assert_eq!(config.relay.max_message_len, DEFAULT_MAX_MESSAGE_LEN);
        assert!(config.live.message.contains("%id"));
    }

    #[test]
    fn test_full_config() {
        let config = load_config_str(
            r#"
            discord {
                token = "abc"
                owner_id = 42
                relay_channel = "relay"
                mod_role = "mods"
            }
            dgg {
                auth_token = "secret"
                chat_url = "ws://localhost:9000/ws"
            }
            relay {
                flush_interval_secs = 5
                max_message_len = 500
                subscriptions_path = "/tmp/subs.json"
            }
            live {
                message = "live: %id"
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.discord.relay_channel, "relay");
        assert_eq!(config.dgg.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.relay.flush_interval_secs, 5);
        assert_eq!(config.relay.max_message_len, 500);
        assert_eq!(config.relay.subscriptions_path, "/tmp/subs.json");
        assert_eq!(config.live.message, "live: %id");
    }

    #[test]
    fn test_missing_discord_section_fails() {
        assert!(load_config_str("dgg {}").is_err());
    }
}
