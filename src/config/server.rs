use serde::{Deserialize, Serialize};

use super::defaults;

/// Room lifecycle knobs: how many players a room defaults to, how long a
/// turn may run before the alarm scheduler auto-scores it, and the sweep
/// intervals for reaping empty/abandoned rooms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "defaults::port")]
    pub port: u16,
    #[serde(default = "defaults::default_max_players")]
    pub default_max_players: u8,
    #[serde(default = "defaults::turn_timeout_seconds")]
    pub turn_timeout_seconds: u32,
    #[serde(default = "defaults::room_cleanup_interval_secs")]
    pub room_cleanup_interval_secs: u64,
    #[serde(default = "defaults::empty_room_timeout_secs")]
    pub empty_room_timeout_secs: u64,
    #[serde(default = "defaults::abandoned_room_timeout_secs")]
    pub abandoned_room_timeout_secs: u64,
    #[serde(default = "defaults::cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            default_max_players: defaults::default_max_players(),
            turn_timeout_seconds: defaults::turn_timeout_seconds(),
            room_cleanup_interval_secs: defaults::room_cleanup_interval_secs(),
            empty_room_timeout_secs: defaults::empty_room_timeout_secs(),
            abandoned_room_timeout_secs: defaults::abandoned_room_timeout_secs(),
            cors_origins: defaults::cors_origins(),
        }
    }
}
