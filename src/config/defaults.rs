//! Default value functions, referenced via `#[serde(default = "...")]` so a
//! config file only needs to name the fields it overrides.

pub fn port() -> u16 {
    3536
}

pub fn default_max_players() -> u8 {
    4
}

pub fn turn_timeout_seconds() -> u32 {
    60
}

pub fn room_cleanup_interval_secs() -> u64 {
    60
}

pub fn empty_room_timeout_secs() -> u64 {
    300
}

pub fn abandoned_room_timeout_secs() -> u64 {
    3600
}

pub fn cors_origins() -> String {
    "*".to_string()
}

pub fn max_chat_length() -> usize {
    500
}

pub fn max_display_name_length() -> usize {
    32
}

pub fn chat_history_limit() -> usize {
    20
}

pub fn ping_interval_secs() -> u64 {
    15
}

pub fn log_dir() -> String {
    "logs".to_string()
}

pub fn log_filename() -> String {
    "server.log".to_string()
}

pub fn log_rotation() -> String {
    "daily".to_string()
}
