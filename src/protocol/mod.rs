//! Wire protocol and persisted data model for the game room.

pub mod error_codes;
pub mod messages;
pub mod model;
pub mod validation;

pub use error_codes::ErrorCode;
pub use messages::{ChatMessage, ChatMessageType, ClientMessage, ReactionAction, ServerMessage};
pub use model::*;
pub use validation::{
    generate_room_code, is_valid_room_code, validate_chat_content, validate_display_name,
};
