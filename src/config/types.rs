use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::protocol::ProtocolConfig;
use super::server::ServerConfig;
use super::websocket::WebSocketConfig;

/// Root configuration object, loaded from a JSON file with environment and
/// CLI overrides layered on top (see [`super::loader`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            protocol: ProtocolConfig::default(),
            websocket: WebSocketConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
