//! §4.4 CommandRouter: the single entry point that turns one parsed
//! [`ClientMessage`] into effects -- a reply to the caller, a broadcast to
//! the room, or both. Grounded in the teacher's `message_router.rs`
//! dispatch-by-tag shape and `heartbeat.rs`'s ping/pong fast path.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::alarm::AlarmScheduler;
use super::chat::{ChatRateLimiter, RateLimitCategory};
use super::game_state::GameStateManager;
use super::lobby_projector::LobbyProjector;
use super::rng::Xoshiro128StarStar;
use super::spectator::SpectatorFanout;
use crate::protocol::{
    validate_chat_content, AlarmData, ChatMessage, ChatMessageType, ClientMessage,
    ConnectionRole, ErrorCode, GameState, ReactionAction, RoomState, Seat, ServerMessage, UserId,
    CHAT_HISTORY_LIMIT,
};

pub struct CommandRouter;

/// Bundled mutable access to everything a command might touch. Borrowed for
/// the span of exactly one `dispatch` call, never held across an `.await`
/// (the room-wide concurrency rule, §5).
pub struct RouterContext<'a> {
    pub room: &'a mut RoomState,
    pub seats: &'a mut HashMap<UserId, Seat>,
    pub game: &'a mut GameState,
    pub chat_history: &'a mut Vec<ChatMessage>,
    pub rate_limiter: &'a mut ChatRateLimiter,
    pub spectators: &'a mut SpectatorFanout,
    pub alarm_data: &'a mut AlarmData,
    pub rng: &'a mut Xoshiro128StarStar,
}

#[derive(Default)]
pub struct CommandEffects {
    pub to_caller: Option<ServerMessage>,
    pub broadcast: Vec<ServerMessage>,
}

impl CommandEffects {
    fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            to_caller: Some(ServerMessage::error(code, message)),
            broadcast: Vec::new(),
        }
    }

    fn broadcast_only(events: Vec<ServerMessage>) -> Self {
        Self {
            to_caller: None,
            broadcast: events,
        }
    }

    fn ack_and_broadcast(ack: ServerMessage, events: Vec<ServerMessage>) -> Self {
        Self {
            to_caller: Some(ack),
            broadcast: events,
        }
    }
}

impl CommandRouter {
    pub fn dispatch(
        ctx: &mut RouterContext<'_>,
        caller: UserId,
        role: ConnectionRole,
        message: ClientMessage,
        now: DateTime<Utc>,
    ) -> CommandEffects {
        match message {
            ClientMessage::Ping => CommandEffects {
                to_caller: Some(ServerMessage::Pong),
                broadcast: Vec::new(),
            },

            ClientMessage::StartGame => Self::require_player(role)
                .and_then(|_| Self::start_game(ctx, caller, now))
                .unwrap_or_else(Self::from_error),

            ClientMessage::DiceRoll { kept } => Self::require_player(role)
                .and_then(|_| Self::roll(ctx, caller, kept))
                .unwrap_or_else(Self::from_error),

            ClientMessage::DiceKeep { indices } => Self::require_player(role)
                .and_then(|_| Self::keep(ctx, caller, &indices))
                .unwrap_or_else(Self::from_error),

            ClientMessage::CategoryScore { category } => Self::require_player(role)
                .and_then(|_| Self::score(ctx, caller, category, now))
                .unwrap_or_else(Self::from_error),

            ClientMessage::Rematch => Self::require_player(role)
                .and_then(|_| Self::rematch(ctx, caller, now))
                .unwrap_or_else(Self::from_error),

            ClientMessage::Chat { content } => Self::chat(ctx, caller, &content, now, ChatMessageType::Text),
            ClientMessage::QuickChat { key } => Self::chat(ctx, caller, &key, now, ChatMessageType::Quick),

            ClientMessage::Reaction {
                message_id,
                emoji,
                action,
            } => Self::reaction(ctx, caller, &message_id, &emoji, action, now),

            ClientMessage::TypingStart => Self::typing(ctx, caller, true, now),
            ClientMessage::TypingStop => Self::typing(ctx, caller, false, now),
        }
    }

    /// Player-only commands rejected for spectators. None of the fourteen
    /// wire error codes name "spectator"; `NOT_YOUR_TURN` is the closest fit
    /// since a spectator never holds a turn to act on.
    fn require_player(role: ConnectionRole) -> Result<(), ErrorCode> {
        match role {
            ConnectionRole::Player => Ok(()),
            ConnectionRole::Spectator => Err(ErrorCode::NotYourTurn),
        }
    }

    fn from_error(code: ErrorCode) -> CommandEffects {
        CommandEffects::error(code, code.description())
    }

    /// The wire protocol models `starting` as a distinct phase with a
    /// client-rendered countdown, but with no separate timer subsystem in
    /// scope here the transition to `turn_roll` happens synchronously: the
    /// first `dice.roll` a client can legally send is already accepted the
    /// instant `game.started` is broadcast.
    fn start_game(ctx: &mut RouterContext<'_>, caller: UserId, now: DateTime<Utc>) -> Result<CommandEffects, ErrorCode> {
        let caller_is_host = ctx.seats.get(&caller).is_some_and(|s| s.is_host);
        GameStateManager::start_game(ctx.game, ctx.seats, caller, caller_is_host)?;
        *ctx.rng = Xoshiro128StarStar::seeded(&ctx.room.room_code, ctx.game.game_started_at.unwrap_or(now));
        ctx.room.status = crate::protocol::RoomStatus::Playing;

        let first = GameStateManager::begin_first_turn(ctx.game, now)?;
        let deadline = now + chrono::Duration::seconds(crate::protocol::AFK_TIMEOUT_SECONDS);
        AlarmScheduler::schedule_turn_timeout(ctx.alarm_data, deadline, now);

        Ok(CommandEffects::broadcast_only(vec![
            ServerMessage::GameStarted,
            ServerMessage::TurnStarted {
                player_id: first,
                turn_number: ctx.game.turn_number,
                round_number: ctx.game.round_number,
            },
        ]))
    }

    fn roll(ctx: &mut RouterContext<'_>, caller: UserId, kept: [bool; 5]) -> Result<CommandEffects, ErrorCode> {
        let outcome = GameStateManager::roll(ctx.game, caller, kept, ctx.rng)?;
        Ok(CommandEffects::broadcast_only(vec![ServerMessage::DiceRolled {
            player_id: caller,
            dice: outcome.dice,
            rolls_remaining: outcome.rolls_remaining,
        }]))
    }

    fn keep(ctx: &mut RouterContext<'_>, caller: UserId, indices: &[u8]) -> Result<CommandEffects, ErrorCode> {
        let mask = GameStateManager::keep(ctx.game, caller, indices)?;
        Ok(CommandEffects::broadcast_only(vec![ServerMessage::DiceKept {
            player_id: caller,
            kept: mask,
        }]))
    }

    fn score(
        ctx: &mut RouterContext<'_>,
        caller: UserId,
        category: crate::protocol::Category,
        now: DateTime<Utc>,
    ) -> Result<CommandEffects, ErrorCode> {
        let outcome = GameStateManager::score_category(ctx.game, caller, category)?;
        let mut events = vec![
            ServerMessage::CategoryScored {
                player_id: caller,
                category,
                score: outcome.points,
                total_score: outcome.total_score,
                is_dicee_bonus: outcome.is_dicee_bonus,
            },
            ServerMessage::TurnEnded { player_id: caller },
        ];

        if outcome.game_over {
            ctx.room.status = crate::protocol::RoomStatus::Completed;
            AlarmScheduler::cancel_turn_timeout(ctx.alarm_data);
            let duration_seconds = ctx
                .game
                .game_started_at
                .map(|started| (now - started).num_seconds())
                .unwrap_or(0);
            events.push(ServerMessage::GameCompleted {
                rankings: ctx.game.rankings.clone().unwrap_or_default(),
                duration_seconds,
            });
        } else if let Some(next_player) = outcome.next_player {
            let deadline = now + chrono::Duration::seconds(crate::protocol::AFK_TIMEOUT_SECONDS);
            AlarmScheduler::schedule_turn_timeout(ctx.alarm_data, deadline, now);
            events.push(ServerMessage::TurnStarted {
                player_id: next_player,
                turn_number: outcome.turn_number,
                round_number: outcome.round_number,
            });
        }

        Ok(CommandEffects::broadcast_only(events))
    }

    fn rematch(ctx: &mut RouterContext<'_>, caller: UserId, now: DateTime<Utc>) -> Result<CommandEffects, ErrorCode> {
        let caller_is_host = ctx.seats.get(&caller).is_some_and(|s| s.is_host);
        GameStateManager::rematch(ctx.game, caller_is_host)?;
        ctx.room.status = crate::protocol::RoomStatus::Waiting;
        let update = LobbyProjector::build(
            ctx.room,
            ctx.seats,
            ctx.game,
            ctx.spectators.count(),
            &HashMap::new(),
            now,
        );
        Ok(CommandEffects::broadcast_only(vec![ServerMessage::StateSync {
            state: Box::new(update),
        }]))
    }

    fn chat(
        ctx: &mut RouterContext<'_>,
        caller: UserId,
        content: &str,
        now: DateTime<Utc>,
        message_type: ChatMessageType,
    ) -> CommandEffects {
        if validate_chat_content(content).is_err() {
            return CommandEffects::error(ErrorCode::InvalidMessage, "chat content is empty or too long");
        }
        if !ctx.rate_limiter.check(caller, RateLimitCategory::Chat, now) {
            return CommandEffects::error(ErrorCode::RateLimited, ErrorCode::RateLimited.description());
        }
        let display_name = ctx
            .seats
            .get(&caller)
            .map(|seat| seat.display_name.clone())
            .or_else(|| {
                ctx.spectators
                    .ids()
                    .contains(&caller)
                    .then(|| "Spectator".to_string())
            })
            .unwrap_or_else(|| "Unknown".to_string());

        let message = ChatMessage {
            id: format!("{}-{}", caller, ctx.chat_history.len()),
            message_type,
            user_id: caller,
            display_name,
            content: content.to_string(),
            timestamp: now,
            reactions: HashMap::new(),
        };
        ctx.chat_history.push(message.clone());
        if ctx.chat_history.len() > CHAT_HISTORY_LIMIT {
            let overflow = ctx.chat_history.len() - CHAT_HISTORY_LIMIT;
            ctx.chat_history.drain(0..overflow);
        }

        CommandEffects::broadcast_only(vec![ServerMessage::ChatMessageEvent { message }])
    }

    fn reaction(
        ctx: &mut RouterContext<'_>,
        caller: UserId,
        message_id: &str,
        emoji: &str,
        action: ReactionAction,
        now: DateTime<Utc>,
    ) -> CommandEffects {
        if !ctx.rate_limiter.check(caller, RateLimitCategory::Reaction, now) {
            return CommandEffects::error(ErrorCode::RateLimited, ErrorCode::RateLimited.description());
        }
        let Some(target) = ctx.chat_history.iter_mut().find(|m| m.id == message_id) else {
            return CommandEffects::error(ErrorCode::ReactionFailed, "no such message in history");
        };
        let holders = target.reactions.entry(emoji.to_string()).or_default();
        match action {
            ReactionAction::Add => {
                if !holders.contains(&caller) {
                    holders.push(caller);
                }
            }
            ReactionAction::Remove => holders.retain(|id| *id != caller),
        }
        CommandEffects::broadcast_only(vec![ServerMessage::ChatReactionUpdate {
            message_id: message_id.to_string(),
            reactions: target.reactions.clone(),
        }])
    }

    fn typing(ctx: &mut RouterContext<'_>, caller: UserId, starting: bool, now: DateTime<Utc>) -> CommandEffects {
        if starting {
            if !ctx.rate_limiter.check(caller, RateLimitCategory::TypingStart, now) {
                return CommandEffects::default();
            }
            ctx.rate_limiter.mark_typing_started(caller, now);
        } else {
            ctx.rate_limiter.clear_typing(&caller);
        }
        CommandEffects::broadcast_only(vec![ServerMessage::TypingUpdate {
            user_id: caller,
            is_typing: starting,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RoomSettings, RoomStatus};

    fn ctx_fixture<'a>(
        room: &'a mut RoomState,
        seats: &'a mut HashMap<UserId, Seat>,
        game: &'a mut GameState,
        chat_history: &'a mut Vec<ChatMessage>,
        rate_limiter: &'a mut ChatRateLimiter,
        spectators: &'a mut SpectatorFanout,
        alarm_data: &'a mut AlarmData,
        rng: &'a mut Xoshiro128StarStar,
    ) -> RouterContext<'a> {
        RouterContext {
            room,
            seats,
            game,
            chat_history,
            rate_limiter,
            spectators,
            alarm_data,
            rng,
        }
    }

    #[test]
    fn ping_gets_pong_with_no_broadcast() {
        let mut room = RoomState::new("ABC234".into(), UserId::new_v4(), RoomSettings::default());
        let mut seats = HashMap::new();
        let mut game = GameState::default();
        let mut chat_history = Vec::new();
        let mut rate_limiter = ChatRateLimiter::new();
        let mut spectators = SpectatorFanout::new();
        let mut alarm_data = AlarmData::default();
        let mut rng = Xoshiro128StarStar::seeded("ABC234", Utc::now());
        let mut ctx = ctx_fixture(
            &mut room,
            &mut seats,
            &mut game,
            &mut chat_history,
            &mut rate_limiter,
            &mut spectators,
            &mut alarm_data,
            &mut rng,
        );
        let effects = CommandRouter::dispatch(
            &mut ctx,
            UserId::new_v4(),
            ConnectionRole::Player,
            ClientMessage::Ping,
            Utc::now(),
        );
        assert!(matches!(effects.to_caller, Some(ServerMessage::Pong)));
        assert!(effects.broadcast.is_empty());
    }

    #[test]
    fn spectator_cannot_start_game() {
        let host = UserId::new_v4();
        let mut room = RoomState::new("ABC234".into(), host, RoomSettings::default());
        let mut seats = HashMap::new();
        seats.insert(host, Seat::new_host(host, "H".into(), "x".into()));
        let mut game = GameState::default();
        let mut chat_history = Vec::new();
        let mut rate_limiter = ChatRateLimiter::new();
        let mut spectators = SpectatorFanout::new();
        let mut alarm_data = AlarmData::default();
        let mut rng = Xoshiro128StarStar::seeded("ABC234", Utc::now());
        let mut ctx = ctx_fixture(
            &mut room,
            &mut seats,
            &mut game,
            &mut chat_history,
            &mut rate_limiter,
            &mut spectators,
            &mut alarm_data,
            &mut rng,
        );
        let effects = CommandRouter::dispatch(
            &mut ctx,
            host,
            ConnectionRole::Spectator,
            ClientMessage::StartGame,
            Utc::now(),
        );
        assert!(matches!(
            effects.to_caller,
            Some(ServerMessage::GameError { code: ErrorCode::NotYourTurn, .. })
        ));
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[test]
    fn second_chat_message_within_a_second_is_rate_limited() {
        let user = UserId::new_v4();
        let mut room = RoomState::new("ABC234".into(), user, RoomSettings::default());
        let mut seats = HashMap::new();
        seats.insert(user, Seat::new_host(user, "H".into(), "x".into()));
        let mut game = GameState::default();
        let mut chat_history = Vec::new();
        let mut rate_limiter = ChatRateLimiter::new();
        let mut spectators = SpectatorFanout::new();
        let mut alarm_data = AlarmData::default();
        let mut rng = Xoshiro128StarStar::seeded("ABC234", Utc::now());
        let now = Utc::now();
        let mut ctx = ctx_fixture(
            &mut room,
            &mut seats,
            &mut game,
            &mut chat_history,
            &mut rate_limiter,
            &mut spectators,
            &mut alarm_data,
            &mut rng,
        );
        let first = CommandRouter::dispatch(
            &mut ctx,
            user,
            ConnectionRole::Player,
            ClientMessage::Chat { content: "hi".into() },
            now,
        );
        assert!(matches!(first.broadcast.as_slice(), [ServerMessage::ChatMessageEvent { .. }]));

        let second = CommandRouter::dispatch(
            &mut ctx,
            user,
            ConnectionRole::Player,
            ClientMessage::Chat { content: "again".into() },
            now,
        );
        assert!(matches!(
            second.to_caller,
            Some(ServerMessage::GameError { code: ErrorCode::RateLimited, .. })
        ));
    }
}
