use serde::{Deserialize, Serialize};

use super::defaults;

/// Input-validation and rate-limit tuning shared by CommandRouter and
/// ChatManager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolConfig {
    #[serde(default = "defaults::max_chat_length")]
    pub max_chat_length: usize,
    #[serde(default = "defaults::max_display_name_length")]
    pub max_display_name_length: usize,
    #[serde(default = "defaults::chat_history_limit")]
    pub chat_history_limit: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_chat_length: defaults::max_chat_length(),
            max_display_name_length: defaults::max_display_name_length(),
            chat_history_limit: defaults::chat_history_limit(),
        }
    }
}
