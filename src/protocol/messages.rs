//! Wire messages exchanged with connected sockets. Discriminated by `type`,
//! following the tagged-enum convention in the teacher's protocol module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error_codes::ErrorCode;
use super::model::{Category, PresenceState, Ranking, RoomStatusUpdate, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    StartGame,
    #[serde(rename = "dice.roll")]
    DiceRoll { kept: [bool; 5] },
    #[serde(rename = "dice.keep")]
    DiceKeep { indices: Vec<u8> },
    #[serde(rename = "category.score")]
    CategoryScore { category: Category },
    Rematch,
    Chat { content: String },
    QuickChat { key: String },
    Reaction {
        message_id: String,
        emoji: String,
        action: ReactionAction,
    },
    #[serde(rename = "typing.start")]
    TypingStart,
    #[serde(rename = "typing.stop")]
    TypingStop,
    Ping,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageType {
    Text,
    Quick,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: ChatMessageType,
    pub user_id: UserId,
    pub display_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub reactions: HashMap<String, Vec<UserId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        state: super::model::ConnectionAttachment,
    },
    #[serde(rename = "player.joined")]
    PlayerJoined { user_id: UserId, display_name: String },
    #[serde(rename = "player.left")]
    PlayerLeft { user_id: UserId },
    #[serde(rename = "player.disconnected")]
    PlayerDisconnected {
        user_id: UserId,
        reconnect_deadline: DateTime<Utc>,
    },
    #[serde(rename = "player.reconnected")]
    PlayerReconnected { user_id: UserId },
    #[serde(rename = "game.started")]
    GameStarted,
    #[serde(rename = "turn.started")]
    TurnStarted {
        player_id: UserId,
        turn_number: u8,
        round_number: u8,
    },
    #[serde(rename = "dice.rolled")]
    DiceRolled {
        player_id: UserId,
        dice: [u8; 5],
        rolls_remaining: u8,
    },
    #[serde(rename = "dice.kept")]
    DiceKept { player_id: UserId, kept: [bool; 5] },
    #[serde(rename = "category.scored")]
    CategoryScored {
        player_id: UserId,
        category: Category,
        score: i32,
        total_score: i32,
        is_dicee_bonus: bool,
    },
    #[serde(rename = "turn.ended")]
    TurnEnded { player_id: UserId },
    #[serde(rename = "turn.skipped")]
    TurnSkipped {
        player_id: UserId,
        reason: String,
        category_scored: Category,
        score: i32,
    },
    #[serde(rename = "player.afk_warning")]
    PlayerAfkWarning {
        player_id: UserId,
        seconds_remaining: i64,
    },
    #[serde(rename = "game.completed")]
    GameCompleted {
        rankings: Vec<Ranking>,
        duration_seconds: i64,
    },
    #[serde(rename = "room.paused")]
    RoomPaused {
        reason: String,
        pause_timeout_at: DateTime<Utc>,
    },
    #[serde(rename = "room.resumed")]
    RoomResumed { resumed_at: DateTime<Utc> },
    #[serde(rename = "room.abandoned")]
    RoomAbandoned { reason: String },
    #[serde(rename = "state.sync")]
    StateSync { state: Box<RoomStatusUpdate> },
    #[serde(rename = "chat.message")]
    ChatMessageEvent { message: ChatMessage },
    #[serde(rename = "chat.reaction_update")]
    ChatReactionUpdate {
        message_id: String,
        reactions: HashMap<String, Vec<UserId>>,
    },
    #[serde(rename = "typing.update")]
    TypingUpdate { user_id: UserId, is_typing: bool },
    #[serde(rename = "game.error")]
    GameError { code: ErrorCode, message: String },
    Pong,
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::GameError {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_tag_matches_wire_name() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"dice.roll","kept":[true,false,false,false,false]}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::DiceRoll { kept } if kept[0]));
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let result: Result<ClientMessage, _> = serde_json::from_str(r#"{"type":"not_a_thing"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_error_round_trips() {
        let msg = ServerMessage::error(ErrorCode::NotYourTurn, "wait your turn");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"game.error\""));
        assert!(json.contains("NOT_YOUR_TURN"));
    }
}
