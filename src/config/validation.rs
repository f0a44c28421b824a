use super::types::Config;

/// Sanity checks beyond what serde's defaulting already guarantees.
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.server.default_max_players < 2 || config.server.default_max_players > 4 {
        return Err("server.default_max_players must be between 2 and 4".to_string());
    }
    if config.server.turn_timeout_seconds == 0 {
        return Err("server.turn_timeout_seconds must be positive".to_string());
    }
    if config.protocol.max_chat_length == 0 {
        return Err("protocol.max_chat_length must be positive".to_string());
    }
    Ok(())
}
