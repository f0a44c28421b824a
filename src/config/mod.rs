//! Configuration module.
//!
//! # Module structure
//!
//! - [`types`]: root [`Config`] struct
//! - [`server`]: room lifecycle and turn timeout settings
//! - [`protocol`]: validation and rate-limit tuning
//! - [`websocket`]: connection-level settings
//! - [`logging`]: logging configuration
//! - [`loader`]: configuration loading
//! - [`validation`]: configuration validation
//! - [`defaults`]: default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod types;
pub mod validation;
pub mod websocket;

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use protocol::ProtocolConfig;
pub use server::ServerConfig;
pub use types::Config;
pub use validation::validate_config;
pub use websocket::WebSocketConfig;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3536);
        assert_eq!(config.server.default_max_players, 4);
        assert_eq!(config.protocol.max_chat_length, 500);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
