use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes returned to clients in `game.error` events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidMessage,
    UnknownCommand,
    InvalidPhase,
    NotYourTurn,
    NotHost,
    NotEnoughPlayers,
    GameInProgress,
    NoRollsRemaining,
    CategoryAlreadyScored,
    RoomFull,
    RateLimited,
    ReactionFailed,
    AuthFailed,
    Internal,
}

impl ErrorCode {
    /// Human-readable description suitable for display to a client developer.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidMessage => {
                "The message could not be parsed or does not match the expected schema."
            }
            Self::UnknownCommand => "The message type is not recognized by this server.",
            Self::InvalidPhase => {
                "That action is not allowed in the game's current phase."
            }
            Self::NotYourTurn => "It is not your turn.",
            Self::NotHost => "Only the room host may perform this action.",
            Self::NotEnoughPlayers => "At least two connected players are required to start.",
            Self::GameInProgress => "A game is already in progress in this room.",
            Self::NoRollsRemaining => "No rolls remain this turn.",
            Self::CategoryAlreadyScored => "That scorecard category has already been scored.",
            Self::RoomFull => "The room has reached its maximum player capacity.",
            Self::RateLimited => "Too many requests in a short time. Please slow down.",
            Self::ReactionFailed => "The reaction could not be applied to that message.",
            Self::AuthFailed => "Authentication failed or the token has expired.",
            Self::Internal => "An internal server error occurred.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_codes_have_nonempty_descriptions() {
        let codes = [
            ErrorCode::InvalidMessage,
            ErrorCode::UnknownCommand,
            ErrorCode::InvalidPhase,
            ErrorCode::NotYourTurn,
            ErrorCode::NotHost,
            ErrorCode::NotEnoughPlayers,
            ErrorCode::GameInProgress,
            ErrorCode::NoRollsRemaining,
            ErrorCode::CategoryAlreadyScored,
            ErrorCode::RoomFull,
            ErrorCode::RateLimited,
            ErrorCode::ReactionFailed,
            ErrorCode::AuthFailed,
            ErrorCode::Internal,
        ];
        for code in codes {
            assert!(code.description().len() > 5, "{code:?} has a suspiciously short description");
        }
    }

    #[test]
    fn display_uses_description() {
        assert_eq!(ErrorCode::NotYourTurn.to_string(), ErrorCode::NotYourTurn.description());
    }

    #[test]
    fn serialization_is_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::CategoryAlreadyScored).unwrap();
        assert_eq!(json, "\"CATEGORY_ALREADY_SCORED\"");
    }
}
