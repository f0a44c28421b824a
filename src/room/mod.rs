//! The `GameRoom` actor: one instance per live room, reachable only through
//! the process-wide directory (§6) so a room code always resolves to the
//! same instance. Holds exclusive ownership of its slice of [`RoomStore`]
//! and guards in-memory state with a single lock held for the span of one
//! message, alarm firing, or lifecycle call and never across an `.await`
//! (§5). Grounded in the teacher's per-room coordination shape
//! (`coordination/room_coordinator.rs`), generalized from lock-handle-backed
//! distributed state to a single-process `Mutex`.

pub mod alarm;
pub mod chat;
pub mod command_router;
pub mod game_state;
pub mod lobby_projector;
pub mod rng;
pub mod seat_ledger;
pub mod spectator;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::identity::VerifiedIdentity;
use crate::lobby::LobbyDirectory;
use crate::metrics::Metrics;
use crate::protocol::{
    AlarmData, ChatMessage, ClientMessage, ConnectionAttachment, ConnectionRole, ErrorCode,
    GameState, RoomSettings, RoomState, RoomStatus, Seat, ServerMessage, UserId,
    AFK_TIMEOUT_SECONDS, AFK_WARNING_SECONDS,
};
use crate::store::RoomStore;

use alarm::{AlarmScheduler, FiredAlarm};
use chat::ChatRateLimiter;
use command_router::{CommandEffects, CommandRouter, RouterContext};
use game_state::GameStateManager;
use lobby_projector::LobbyProjector;
use rng::Xoshiro128StarStar;
use seat_ledger::{AttachOutcome, SeatLedger};
use spectator::SpectatorFanout;

struct RoomInner {
    room: RoomState,
    seats: HashMap<UserId, Seat>,
    game: GameState,
    chat_history: Vec<ChatMessage>,
    rate_limiter: ChatRateLimiter,
    spectators: SpectatorFanout,
    alarm_data: AlarmData,
    rng: Xoshiro128StarStar,
    last_seen: HashMap<UserId, DateTime<Utc>>,
}

/// A live connection's outbound handles: the app-message channel the
/// gateway's send task drains, and a side channel for the rare case the
/// room itself needs to close the socket with a specific WebSocket close
/// code (§4.5 room.abandoned -> 1000).
struct SocketHandle {
    tx: tokio::sync::mpsc::Sender<ServerMessage>,
    close_tx: tokio::sync::mpsc::Sender<(u16, &'static str)>,
}

/// Who should receive what after a call into the room. `broadcast` always
/// goes to every connected player and spectator; `to_caller` (when present)
/// goes only to the socket that sent the triggering message.
pub struct RoomEffects {
    pub to_caller: Option<ServerMessage>,
    pub broadcast: Vec<ServerMessage>,
}

impl From<CommandEffects> for RoomEffects {
    fn from(effects: CommandEffects) -> Self {
        Self {
            to_caller: effects.to_caller,
            broadcast: effects.broadcast,
        }
    }
}

pub struct GameRoom {
    room_code: String,
    store: Arc<dyn RoomStore>,
    lobby: Arc<dyn LobbyDirectory>,
    metrics: Arc<Metrics>,
    inner: tokio::sync::Mutex<RoomInner>,
    /// Live outbound channels, keyed by user id. Ephemeral connection-gateway
    /// state (§5's I8: never persisted, never part of the game's truth).
    sockets: tokio::sync::Mutex<HashMap<UserId, SocketHandle>>,
}

impl GameRoom {
    /// Creates a brand-new room with the given host as its first (and, at
    /// creation time, only) seat.
    pub async fn create(
        room_code: String,
        host: &VerifiedIdentity,
        settings: RoomSettings,
        store: Arc<dyn RoomStore>,
        lobby: Arc<dyn LobbyDirectory>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let room = RoomState::new(room_code.clone(), host.user_id, settings);
        let mut seats = HashMap::new();
        seats.insert(
            host.user_id,
            Seat::new_host(host.user_id, host.display_name.clone(), host.avatar_seed.clone()),
        );

        store.save_room(&room).await?;
        store.save_seat(&seats[&host.user_id]).await?;
        store.save_game(&GameState::default()).await?;
        metrics.increment_rooms_created();

        // Reseeded against the real game-start time once `start_game` runs
        // (see `CommandRouter::start_game`); this seed is only ever used if
        // a roll somehow happens before that, which the phase machine
        // forbids.
        let rng = Xoshiro128StarStar::seeded(&room.room_code, room.created_at);

        Ok(Self {
            room_code,
            store,
            lobby,
            metrics,
            inner: tokio::sync::Mutex::new(RoomInner {
                room,
                seats,
                game: GameState::default(),
                chat_history: Vec::new(),
                rate_limiter: ChatRateLimiter::new(),
                spectators: SpectatorFanout::new(),
                alarm_data: AlarmData::default(),
                rng,
                last_seen: HashMap::new(),
            }),
            sockets: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Rehydrates an existing room from storage (§5: a room is reloaded in
    /// full on its first message after any idle period, never reconstructed
    /// from partial state). Returns `Ok(None)` if no room record exists yet.
    pub async fn hydrate(
        room_code: String,
        store: Arc<dyn RoomStore>,
        lobby: Arc<dyn LobbyDirectory>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Option<Self>> {
        let Some(room) = store.load_room().await? else {
            return Ok(None);
        };
        let game = store.load_game().await?.unwrap_or_default();
        let seats = store
            .load_seats()
            .await?
            .into_iter()
            .map(|seat| (seat.user_id, seat))
            .collect();
        let chat_history = store.load_chat_history().await?;
        let alarm_data = store.load_alarm_data().await?;
        let rng = match store.load_rng_state().await? {
            Some(bytes) => Xoshiro128StarStar::from_bytes(bytes),
            None => Xoshiro128StarStar::seeded(&room_code, game.game_started_at.unwrap_or(room.created_at)),
        };

        Ok(Some(Self {
            room_code,
            store,
            lobby,
            metrics,
            inner: tokio::sync::Mutex::new(RoomInner {
                room,
                seats,
                game,
                chat_history,
                rate_limiter: ChatRateLimiter::new(),
                spectators: SpectatorFanout::new(),
                alarm_data,
                rng,
                last_seen: HashMap::new(),
            }),
            sockets: tokio::sync::Mutex::new(HashMap::new()),
        }))
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// The room's actual creation timestamp (§6 `createdAt`), distinct from
    /// the lobby projection's `updatedAt`.
    pub async fn created_at(&self) -> DateTime<Utc> {
        self.inner.lock().await.room.created_at
    }

    /// §4.2 `attach` entry point for players; spectators join a separate,
    /// ungraced side map instead of taking a seat.
    pub async fn join(
        &self,
        identity: VerifiedIdentity,
        role: ConnectionRole,
        now: DateTime<Utc>,
    ) -> Result<(ConnectionAttachment, RoomEffects), ErrorCode> {
        let mut state = self.inner.lock().await;

        let (is_host, mut broadcast, reconnected) = match role {
            ConnectionRole::Spectator => {
                if !state.room.settings.allow_spectators {
                    return Err(ErrorCode::RoomFull);
                }
                state.spectators.join(identity.user_id, identity.display_name.clone());
                (
                    false,
                    vec![ServerMessage::PlayerJoined {
                        user_id: identity.user_id,
                        display_name: identity.display_name.clone(),
                    }],
                    false,
                )
            }
            ConnectionRole::Player => {
                let outcome = SeatLedger::attach(
                    &mut state.seats,
                    state.room.status,
                    state.room.settings.max_players,
                    identity.user_id,
                    identity.display_name.clone(),
                    identity.avatar_seed.clone(),
                    now,
                )?;
                AlarmScheduler::cancel_seat_expiry(&mut state.alarm_data, &identity.user_id);
                match outcome {
                    AttachOutcome::Reconnected => (
                        state.seats[&identity.user_id].is_host,
                        vec![ServerMessage::PlayerReconnected { user_id: identity.user_id }],
                        true,
                    ),
                    AttachOutcome::Created { is_host } => (
                        is_host,
                        vec![ServerMessage::PlayerJoined {
                            user_id: identity.user_id,
                            display_name: identity.display_name.clone(),
                        }],
                        false,
                    ),
                }
            }
        };

        state.last_seen.insert(identity.user_id, now);

        let was_paused = state.room.status == RoomStatus::Paused;
        if was_paused && role == ConnectionRole::Player {
            let deadline = now + chrono::Duration::seconds(AFK_TIMEOUT_SECONDS);
            if AlarmScheduler::maybe_resume(
                &mut state.room.status,
                &mut state.room.paused_at,
                &mut state.alarm_data,
                deadline,
                now,
            ) {
                broadcast.push(ServerMessage::RoomResumed { resumed_at: now });
            }
        }

        let attachment = ConnectionAttachment {
            user_id: identity.user_id,
            display_name: identity.display_name,
            avatar_seed: identity.avatar_seed,
            is_host,
            role,
            connected_at: now,
        };

        self.persist_and_project(&mut state).await;
        drop(state);

        if reconnected {
            self.metrics.increment_reconnections();
        } else {
            self.metrics.increment_players_joined();
        }

        Ok((attachment, RoomEffects { to_caller: None, broadcast }))
    }

    /// §4.2 `detach`. The seat is left in place (reconnectable); a
    /// spectator's slot is simply dropped.
    pub async fn disconnect(&self, user_id: UserId, role: ConnectionRole, now: DateTime<Utc>) -> RoomEffects {
        let mut state = self.inner.lock().await;

        let broadcast = match role {
            ConnectionRole::Spectator => {
                state.spectators.leave(&user_id);
                vec![ServerMessage::PlayerLeft { user_id }]
            }
            ConnectionRole::Player => {
                if let Some(deadline) = SeatLedger::detach(&mut state.seats, &user_id, now) {
                    AlarmScheduler::schedule_seat_expiry(&mut state.alarm_data, user_id, deadline, now);
                }
                let connected = SeatLedger::connected_count(&state.seats);
                let mut events = vec![ServerMessage::PlayerDisconnected {
                    user_id,
                    reconnect_deadline: now + chrono::Duration::milliseconds(SeatLedger::GRACE_MILLIS),
                }];
                if AlarmScheduler::maybe_pause(
                    &mut state.room.status,
                    &mut state.room.paused_at,
                    &mut state.alarm_data,
                    connected,
                    now,
                ) {
                    events.push(ServerMessage::RoomPaused {
                        reason: "all players disconnected".to_string(),
                        pause_timeout_at: AlarmScheduler::next_fire_at(&state.alarm_data)
                            .unwrap_or(now),
                    });
                }
                events
            }
        };

        self.metrics.increment_players_left();
        self.persist_and_project(&mut state).await;
        RoomEffects { to_caller: None, broadcast }
    }

    /// The single message-handling entry point (§4.4 CommandRouter, wired
    /// up with this room's state).
    pub async fn handle_message(
        &self,
        caller: UserId,
        role: ConnectionRole,
        message: ClientMessage,
        now: DateTime<Utc>,
    ) -> RoomEffects {
        let mut state = self.inner.lock().await;
        let chat_len_before = state.chat_history.len();
        let mut ctx = RouterContext {
            room: &mut state.room,
            seats: &mut state.seats,
            game: &mut state.game,
            chat_history: &mut state.chat_history,
            rate_limiter: &mut state.rate_limiter,
            spectators: &mut state.spectators,
            alarm_data: &mut state.alarm_data,
            rng: &mut state.rng,
        };
        let effects = CommandRouter::dispatch(&mut ctx, caller, role, message, now);

        if matches!(
            effects.to_caller,
            Some(ServerMessage::GameError { code: ErrorCode::RateLimited, .. })
        ) {
            self.metrics.increment_chat_rate_limited();
        }

        // Reactions mutate an existing entry in place rather than appending;
        // only a net-new message needs to be handed to the append-only store.
        let new_messages: Vec<ChatMessage> = state.chat_history[chat_len_before.min(state.chat_history.len())..].to_vec();
        for message in new_messages {
            if let Err(error) = self.store.append_chat_message(message, crate::protocol::CHAT_HISTORY_LIMIT).await {
                tracing::error!(room_code = %self.room_code, %error, "failed to persist chat message");
            }
        }

        self.persist_and_project(&mut state).await;
        effects.into()
    }

    /// `on_alarm` (§4.5): reloads nothing extra (the lock already guards the
    /// live state), drains every due deadline oldest-first, and reprograms
    /// the scheduler's next wakeup is the caller's responsibility via
    /// [`Self::next_alarm_at`].
    pub async fn on_alarm(&self, now: DateTime<Utc>) -> RoomEffects {
        let mut state = self.inner.lock().await;
        let due = AlarmScheduler::take_due(&mut state.alarm_data, now);
        let mut broadcast = Vec::new();

        for fired in due {
            match fired {
                FiredAlarm::TurnTimeout => {
                    if let Some(current) = state.game.current_player() {
                        let outcome = GameStateManager::afk_auto_score(&mut state.game, current);
                        self.metrics.increment_turns_timed_out();
                        broadcast.push(ServerMessage::TurnSkipped {
                            player_id: current,
                            reason: "turn timed out".to_string(),
                            category_scored: outcome.category_scored,
                            score: outcome.score,
                        });
                        if let Some(next_player) = outcome.next_player {
                            let deadline = now + chrono::Duration::seconds(AFK_TIMEOUT_SECONDS);
                            AlarmScheduler::schedule_turn_timeout(&mut state.alarm_data, deadline, now);
                            broadcast.push(ServerMessage::TurnStarted {
                                player_id: next_player,
                                turn_number: outcome.turn_number,
                                round_number: outcome.round_number,
                            });
                        } else {
                            state.room.status = RoomStatus::Completed;
                            let duration_seconds = state
                                .game
                                .game_started_at
                                .map(|started| (now - started).num_seconds())
                                .unwrap_or(0);
                            broadcast.push(ServerMessage::GameCompleted {
                                rankings: state.game.rankings.clone().unwrap_or_default(),
                                duration_seconds,
                            });
                        }
                    }
                }
                FiredAlarm::AfkWarning => {
                    if let Some(current) = state.game.current_player() {
                        broadcast.push(ServerMessage::PlayerAfkWarning {
                            player_id: current,
                            seconds_remaining: AFK_TIMEOUT_SECONDS - AFK_WARNING_SECONDS,
                        });
                    }
                }
                FiredAlarm::PauseTimeout => {
                    state.room.status = RoomStatus::Abandoned;
                    self.metrics.increment_rooms_abandoned();
                    broadcast.push(ServerMessage::RoomAbandoned {
                        reason: "paused too long with nobody reconnecting".to_string(),
                    });
                    self.close_all_sockets(1000, "room abandoned").await;
                }
                FiredAlarm::SeatExpiry(user_id) => {
                    if SeatLedger::reclaim(&mut state.seats, &user_id, state.room.status, now) {
                        let _ = self.store.delete_seat(&user_id).await;
                    }
                }
            }
        }

        self.persist_and_project(&mut state).await;
        RoomEffects { to_caller: None, broadcast }
    }

    pub async fn next_alarm_at(&self) -> Option<DateTime<Utc>> {
        let state = self.inner.lock().await;
        AlarmScheduler::next_fire_at(&state.alarm_data)
    }

    pub async fn spectator_count(&self) -> usize {
        self.inner.lock().await.spectators.count()
    }

    /// A non-mutating read of the room's current lobby projection, for an
    /// HTTP status endpoint that shouldn't have to pretend it's a command.
    pub async fn snapshot(&self) -> crate::protocol::RoomStatusUpdate {
        let state = self.inner.lock().await;
        LobbyProjector::build(
            &state.room,
            &state.seats,
            &state.game,
            state.spectators.count(),
            &state.last_seen,
            Utc::now(),
        )
    }

    /// Registers a connection gateway's outbound channels so `broadcast` can
    /// reach it and the room can close it with a specific code if it needs
    /// to. Replaces any existing handle for this user (a reconnect with the
    /// old socket not yet torn down).
    pub async fn register_socket(
        &self,
        user_id: UserId,
        tx: tokio::sync::mpsc::Sender<ServerMessage>,
        close_tx: tokio::sync::mpsc::Sender<(u16, &'static str)>,
    ) {
        self.sockets.lock().await.insert(user_id, SocketHandle { tx, close_tx });
    }

    /// Drops a connection's outbound channels. A no-op if it was already
    /// replaced by a newer connection for the same user.
    pub async fn unregister_socket(&self, user_id: &UserId) {
        self.sockets.lock().await.remove(user_id);
    }

    /// Fans `events` out to every live connection, pruning any whose
    /// receiver has gone away (the gateway task exited without calling
    /// `unregister_socket`, e.g. on a hard disconnect).
    pub async fn broadcast(&self, events: &[ServerMessage]) {
        if events.is_empty() {
            return;
        }
        let mut sockets = self.sockets.lock().await;
        sockets.retain(|_, handle| {
            for event in events {
                if handle.tx.try_send(event.clone()).is_err() {
                    return false;
                }
            }
            true
        });
    }

    /// Delivers `effects` to this room's live connections: `to_caller` only
    /// to `caller`, `broadcast` to everyone.
    pub async fn deliver(&self, caller: UserId, effects: &RoomEffects) {
        if let Some(message) = &effects.to_caller {
            let sockets = self.sockets.lock().await;
            if let Some(handle) = sockets.get(&caller) {
                let _ = handle.tx.try_send(message.clone());
            }
        }
        self.broadcast(&effects.broadcast).await;
    }

    /// Closes every live connection with the given WebSocket close code and
    /// reason (§4.5: `room.abandoned` closes every socket with 1000; §4.1
    /// closes a single offending connection with 1003 from the gateway
    /// itself rather than through here).
    pub async fn close_all_sockets(&self, code: u16, reason: &'static str) {
        let sockets = self.sockets.lock().await;
        for handle in sockets.values() {
            let _ = handle.close_tx.try_send((code, reason));
        }
    }

    /// Persists every mutable key and republishes the lobby projection.
    /// Called after every state-mutating entry point; storage writes and
    /// the lobby publish both happen with the lock still held so a second
    /// message can't observe a half-persisted room, but neither awaits
    /// inside a borrow of the in-memory maps (everything needed is cloned
    /// out first, satisfying §5's no-cache-across-suspension rule).
    async fn persist_and_project(&self, state: &mut RoomInner) {
        let room = state.room.clone();
        let game = state.game.clone();
        let alarm_data = state.alarm_data.clone();
        let rng_bytes = state.rng.to_bytes();
        let spectator_count = state.spectators.count();

        if let Err(error) = self.store.save_room(&room).await {
            tracing::error!(room_code = %self.room_code, %error, "failed to persist room state");
        }
        if let Err(error) = self.store.save_game(&game).await {
            tracing::error!(room_code = %self.room_code, %error, "failed to persist game state");
        }
        if let Err(error) = self.store.save_alarm_data(&alarm_data).await {
            tracing::error!(room_code = %self.room_code, %error, "failed to persist alarm data");
        }
        if let Err(error) = self.store.save_rng_state(rng_bytes).await {
            tracing::error!(room_code = %self.room_code, %error, "failed to persist rng state");
        }
        for seat in state.seats.values() {
            if let Err(error) = self.store.save_seat(seat).await {
                tracing::error!(room_code = %self.room_code, %error, "failed to persist seat");
            }
        }

        let update = LobbyProjector::build(
            &room,
            &state.seats,
            &game,
            spectator_count,
            &state.last_seen,
            Utc::now(),
        );
        LobbyProjector::publish(&self.lobby, &self.metrics, update).await;
    }
}
