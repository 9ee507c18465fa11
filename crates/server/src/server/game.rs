//! Game state and message handlers.
//!
//! `GameState` is the single owner of the world and the session table.
//! Every handler mutates synchronously and returns the [`Effects`] that the
//! dispatcher delivers before the state lock is released.

use crate::config::Config;
use crate::entity::{Player, TimerToken};
use crate::movement::{self, Collision, StepOutcome};
use crate::session::{LeaveOutcome, SessionError, SessionTable};
use crate::world::World;
use protocol::packets::{ClientMessage, ServerMessage};
use protocol::{Direction, PlayerId, SessionId, Visibility};
use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

use super::{Effects, ScheduledTask};

/// Main game state.
#[derive(Debug)]
pub struct GameState {
    pub config: Config,
    pub world: World,
    pub sessions: SessionTable,

    // ID counters
    next_player_id: PlayerId,
    next_timer_token: u64,
}

impl GameState {
    /// Create a new game state with an empty world.
    pub fn new(config: &Config) -> Self {
        Self::with_world(config, World::new(&config.world))
    }

    /// Create a game state around an existing world.
    pub fn with_world(config: &Config, world: World) -> Self {
        Self {
            config: config.clone(),
            world,
            sessions: SessionTable::new(&config.session),
            next_player_id: 1,
            next_timer_token: 1,
        }
    }

    /// Startup population of food, portals and yellow dots.
    pub fn populate_world(&mut self) {
        let counts = self.world.populate(&self.config.world);
        info!(
            "World initialized: {} food, {} portals, {} yellow dots",
            counts.foods, counts.portals, counts.yellow_dots
        );
    }

    /// Register a new connection as an idle player.
    pub fn add_client(&mut self, addr: SocketAddr) -> (PlayerId, Effects) {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let position = self.world.spawn_position();
        self.world.add_player(Player::new(id, default_name(id), position));
        info!("Client {} connected from {}", id, addr);

        let mut effects = Effects::default();
        effects.send(id, ServerMessage::Init { player_id: id });
        (id, effects)
    }

    /// Remove a disconnected player, leaving their session first.
    pub fn remove_client(&mut self, id: PlayerId) -> Effects {
        let mut effects = Effects::default();
        let Some(player) = self.world.player(id) else {
            return effects;
        };
        let was_playing = player.is_playing;

        if let Some(session_id) = player.session_id {
            if let Ok(outcome) = self.sessions.leave(&mut self.world, session_id, id) {
                self.after_leave(outcome, &mut effects);
            }
        }

        if let Some(player) = self.world.remove_player(id) {
            info!("Client {} ({}) disconnected", id, player.name);
        }

        if was_playing {
            // The departed snake vanished from the world.
            self.broadcast_game_state(&mut effects);
        }
        effects
    }

    /// Handle a message from a client.
    pub fn handle_message(&mut self, id: PlayerId, message: ClientMessage) -> Effects {
        if !message.is_high_frequency() {
            debug!("Client {} sent {:?}", id, message);
        }

        match message {
            ClientMessage::Spawn { player_name } => self.handle_spawn(id, &player_name),
            ClientMessage::Direction { direction } => self.handle_direction(id, direction),
            ClientMessage::Update => self.handle_update(id),
            ClientMessage::SpeedBoost => self.handle_speed_boost(id),
            ClientMessage::CreateSession {
                session_name,
                visibility,
            } => self.handle_create_session(id, &session_name, visibility),
            ClientMessage::JoinSession { code } => self.handle_join_session(id, &code),
            ClientMessage::LeaveSession { session_id } => self.handle_leave_session(id, session_id),
            ClientMessage::ToggleReady {
                session_id,
                is_ready,
            } => self.handle_toggle_ready(id, session_id, is_ready),
            ClientMessage::ToggleVisibility {
                session_id,
                visibility,
            } => self.handle_toggle_visibility(id, session_id, visibility),
            ClientMessage::GetSessions => self.handle_get_sessions(id),
        }
    }

    fn handle_spawn(&mut self, id: PlayerId, requested_name: &str) -> Effects {
        let mut effects = Effects::default();
        if self.world.player(id).is_none() {
            return effects;
        }

        let name: String = requested_name
            .trim()
            .chars()
            .take(self.config.player.max_name_length)
            .collect();
        let position = self.world.spawn_position();
        if let Some(player) = self.world.player_mut(id) {
            if !name.is_empty() {
                player.name = name;
            }
            player.respawn(position);
            info!("Spawned '{}' ({}) at ({}, {})", player.name, id, position.x, position.y);
        }

        self.broadcast_game_state(&mut effects);
        effects
    }

    fn handle_direction(&mut self, id: PlayerId, direction: Direction) -> Effects {
        let mut effects = Effects::default();
        if let Some(player) = self.world.player_mut(id) {
            player.direction = direction;
            self.broadcast_game_state(&mut effects);
        }
        effects
    }

    fn handle_update(&mut self, id: PlayerId) -> Effects {
        let mut effects = Effects::default();

        let min_interval = Duration::from_millis(self.config.player.min_update_interval_ms);
        if !min_interval.is_zero() {
            let now = Instant::now();
            let Some(player) = self.world.player_mut(id) else {
                return effects;
            };
            if player.last_update.is_some_and(|last| now.duration_since(last) < min_interval) {
                return effects;
            }
            player.last_update = Some(now);
        }

        match movement::advance(&mut self.world, id, &self.config.player) {
            StepOutcome::Ignored => {}
            StepOutcome::Died(collision) => self.on_death(id, collision, &mut effects),
            StepOutcome::Moved(pickups) => {
                if pickups.yellow_dot {
                    self.open_minimap(id, &mut effects);
                }
                self.broadcast_game_state(&mut effects);
            }
        }
        effects
    }

    fn handle_speed_boost(&mut self, id: PlayerId) -> Effects {
        let mut effects = Effects::default();
        let decay = self.config.player.boost_decay;
        if self.world.player_mut(id).is_some_and(|p| p.burn_boost(decay)) {
            self.broadcast_game_state(&mut effects);
        }
        effects
    }

    fn handle_create_session(&mut self, id: PlayerId, name: &str, visibility: Visibility) -> Effects {
        let mut effects = Effects::default();

        if let Some(previous) = self.world.player(id).and_then(|p| p.session_id) {
            if let Ok(outcome) = self.sessions.leave(&mut self.world, previous, id) {
                self.after_leave(outcome, &mut effects);
            }
        }

        let session = self
            .sessions
            .create(&mut self.world, name, id, visibility, SystemTime::now());
        info!(
            "Client {} created session {} '{}' (code {})",
            id, session.id, session.name, session.code
        );
        effects.send(id, ServerMessage::SessionCreated { session: session.info() });
        effects
    }

    fn handle_join_session(&mut self, id: PlayerId, code: &str) -> Effects {
        let mut effects = Effects::default();
        match self.sessions.join(&mut self.world, code, id) {
            Ok(outcome) => {
                if let Some(left) = outcome.left {
                    self.after_leave(left, &mut effects);
                }
                if let Some(session) = self.sessions.get(outcome.session_id) {
                    if outcome.added {
                        info!("Client {} joined session {}", id, session.id);
                    }
                    effects.send(id, ServerMessage::SessionJoined { session: session.info() });
                }
                self.broadcast_session(outcome.session_id, &mut effects);
            }
            Err(e) => session_error(id, e, &mut effects),
        }
        effects
    }

    fn handle_leave_session(&mut self, id: PlayerId, session_id: SessionId) -> Effects {
        let mut effects = Effects::default();
        match self.sessions.leave(&mut self.world, session_id, id) {
            Ok(outcome) => {
                let message = if outcome.closed {
                    "Session closed"
                } else {
                    "You left the session"
                };
                effects.send(
                    id,
                    ServerMessage::SessionClosed {
                        session_id,
                        message: message.to_string(),
                    },
                );
                self.after_leave(outcome, &mut effects);
            }
            Err(e) => session_error(id, e, &mut effects),
        }
        effects
    }

    fn handle_toggle_ready(&mut self, id: PlayerId, session_id: SessionId, is_ready: bool) -> Effects {
        let mut effects = Effects::default();
        match self
            .sessions
            .toggle_ready(&mut self.world, session_id, id, is_ready)
        {
            Ok(started) => {
                self.broadcast_session(session_id, &mut effects);
                if started {
                    info!("Session {} started", session_id);
                    self.broadcast_game_state(&mut effects);
                }
            }
            Err(e) => session_error(id, e, &mut effects),
        }
        effects
    }

    fn handle_toggle_visibility(
        &mut self,
        id: PlayerId,
        session_id: SessionId,
        visibility: Visibility,
    ) -> Effects {
        let mut effects = Effects::default();
        match self.sessions.toggle_visibility(session_id, id, visibility) {
            Ok(()) => self.broadcast_session(session_id, &mut effects),
            Err(e) => session_error(id, e, &mut effects),
        }
        effects
    }

    fn handle_get_sessions(&mut self, id: PlayerId) -> Effects {
        let mut effects = Effects::default();
        effects.send(
            id,
            ServerMessage::SessionsList {
                sessions: self.sessions.public_sessions(),
            },
        );
        effects
    }

    /// Notify everyone about a death and return the session to the lobby if
    /// that was its last living member.
    fn on_death(&mut self, id: PlayerId, collision: Collision, effects: &mut Effects) {
        let Some(player) = self.world.player(id) else {
            return;
        };
        let name = player.name.clone();
        let score = player.score;
        let session_id = player.session_id;

        let killer = match collision {
            Collision::Player(killer_id) => self.world.player(killer_id).map(|k| (killer_id, k.name.clone())),
            _ => None,
        };
        let (broadcast, personal) = match (&collision, &killer) {
            (Collision::Wall, _) => (format!("{name} hit the wall"), "You hit the wall".to_string()),
            (Collision::Tail, _) => (
                format!("{name} ran into their own tail"),
                "You ran into your own tail".to_string(),
            ),
            (Collision::Player(_), Some((_, killer_name))) => (
                format!("{name} was killed by {killer_name}"),
                format!("You were killed by {killer_name}"),
            ),
            (Collision::Player(_), None) => (format!("{name} was killed"), "You were killed".to_string()),
        };
        info!("Player {} died: {}", id, broadcast);

        effects.broadcast(ServerMessage::PlayerDeath {
            message: broadcast,
            player_id: id,
            killer_id: killer.map(|(killer_id, _)| killer_id),
        });
        effects.send(id, ServerMessage::GameOver { score, message: personal });

        if let Some(session_id) = session_id {
            self.revert_session(session_id, effects);
        }
        self.broadcast_game_state(effects);
    }

    fn open_minimap(&mut self, id: PlayerId, effects: &mut Effects) {
        let token = TimerToken(self.next_timer_token);
        self.next_timer_token += 1;

        let Some(player) = self.world.player_mut(id) else {
            return;
        };
        let reset = player.minimap_timer.replace(token).is_some();
        let duration = self.config.player.minimap_duration();

        effects.send(
            id,
            ServerMessage::MinimapUpdate {
                visible: true,
                duration: duration.as_secs(),
                reset,
            },
        );
        effects.schedule(ScheduledTask::HideMinimap {
            player_id: id,
            token,
            after: duration,
        });
    }

    /// Close the minimap window opened with `token`, unless it has since been
    /// replaced or cancelled.
    pub fn expire_minimap(&mut self, id: PlayerId, token: TimerToken) -> Effects {
        let mut effects = Effects::default();
        if let Some(player) = self.world.player_mut(id) {
            if player.minimap_timer == Some(token) {
                player.minimap_timer = None;
                effects.send(
                    id,
                    ServerMessage::MinimapUpdate {
                        visible: false,
                        duration: 0,
                        reset: false,
                    },
                );
            }
        }
        effects
    }

    /// Periodic food spawn.
    pub fn spawn_food_tick(&mut self) -> Effects {
        let mut effects = Effects::default();
        if let Some(food) = self.world.spawn_food() {
            debug!("Spawned {:?} food at {:?}", food.kind, food.position);
            self.broadcast_game_state(&mut effects);
        }
        effects
    }

    /// Periodic portal spawn.
    pub fn spawn_portal_tick(&mut self) -> Effects {
        let mut effects = Effects::default();
        if let Some(portal) = self.world.spawn_portal() {
            debug!("Spawned portal at {:?}", portal.position);
            self.broadcast_game_state(&mut effects);
        }
        effects
    }

    /// Periodic yellow dot spawn, capped.
    pub fn spawn_yellow_dot_tick(&mut self) -> Effects {
        let mut effects = Effects::default();
        if let Some(dot) = self.world.spawn_yellow_dot() {
            debug!("Spawned yellow dot at {:?}", dot.position);
            self.broadcast_game_state(&mut effects);
        }
        effects
    }

    /// Delete sessions older than the configured maximum age.
    pub fn sweep_sessions(&mut self, now: SystemTime) -> Effects {
        let mut effects = Effects::default();
        let max_age = self.config.session.max_age();
        let reaped = self.sessions.reap_expired(&mut self.world, now, max_age);
        for session in &reaped {
            effects.send_to(
                session.member_ids(),
                ServerMessage::SessionClosed {
                    session_id: session.id,
                    message: "Session expired".to_string(),
                },
            );
        }
        if !reaped.is_empty() {
            info!("Swept {} expired sessions ({} remaining)", reaped.len(), self.sessions.len());
        }
        effects
    }

    fn after_leave(&mut self, outcome: LeaveOutcome, effects: &mut Effects) {
        if outcome.closed {
            info!("Session {} closed", outcome.session_id);
            return;
        }
        if let Some(host) = outcome.new_host {
            info!("Session {} host moved to {}", outcome.session_id, host);
        }
        if !self.revert_session(outcome.session_id, effects) {
            self.broadcast_session(outcome.session_id, effects);
        }
    }

    /// Returns whether an update was queued.
    fn revert_session(&mut self, session_id: SessionId, effects: &mut Effects) -> bool {
        if self.sessions.revert_if_finished(&self.world, session_id) {
            info!("Session {} back to waiting", session_id);
            self.broadcast_session(session_id, effects);
            return true;
        }
        false
    }

    fn broadcast_session(&self, session_id: SessionId, effects: &mut Effects) {
        if let Some(session) = self.sessions.get(session_id) {
            effects.send_to(
                session.member_ids(),
                ServerMessage::SessionUpdated { session: session.info() },
            );
        }
    }

    fn broadcast_game_state(&self, effects: &mut Effects) {
        effects.send_to(
            self.world.playing_ids(),
            ServerMessage::GameState(self.world.snapshot()),
        );
    }
}

fn default_name(id: PlayerId) -> String {
    format!("Player {id}")
}

fn session_error(id: PlayerId, error: SessionError, effects: &mut Effects) {
    debug!("Session request from {} rejected: {}", id, error);
    effects.send(
        id,
        ServerMessage::SessionError {
            message: error.to_string(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::YellowDot;
    use protocol::packets::SessionInfo;
    use protocol::{Position, SessionStatus};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::VecDeque;

    fn game_with(config: Config) -> GameState {
        let world = World::with_rng(&config.world, StdRng::seed_from_u64(21));
        GameState::with_world(&config, world)
    }

    fn game() -> GameState {
        game_with(Config::default())
    }

    fn connect(game: &mut GameState) -> PlayerId {
        let (id, effects) = game.add_client("127.0.0.1:4000".parse().unwrap());
        assert_eq!(
            effects.messages_for(id).cloned().collect::<Vec<_>>(),
            vec![ServerMessage::Init { player_id: id }]
        );
        id
    }

    fn received(effects: &Effects, id: PlayerId) -> Vec<ServerMessage> {
        effects.messages_for(id).cloned().collect()
    }

    fn session_updates(effects: &Effects, id: PlayerId) -> Vec<SessionInfo> {
        effects
            .messages_for(id)
            .filter_map(|m| match m {
                ServerMessage::SessionUpdated { session } => Some(session.clone()),
                _ => None,
            })
            .collect()
    }

    /// Put `id` into play at `head` heading `direction`.
    fn place(game: &mut GameState, id: PlayerId, head: (i32, i32), direction: Direction) {
        game.handle_message(id, ClientMessage::Spawn { player_name: String::new() });
        let player = game.world.player_mut(id).unwrap();
        player.snake = VecDeque::from([Position::new(head.0, head.1)]);
        player.direction = direction;
    }

    fn create_room(game: &mut GameState, host: PlayerId) -> SessionInfo {
        let effects = game.handle_message(
            host,
            ClientMessage::CreateSession {
                session_name: "Room1".into(),
                visibility: Visibility::Public,
            },
        );
        match received(&effects, host).as_slice() {
            [ServerMessage::SessionCreated { session }] => session.clone(),
            other => panic!("unexpected {other:?}"),
        }
    }

    fn start_match(game: &mut GameState, a: PlayerId, b: PlayerId) -> SessionInfo {
        let session = create_room(game, a);
        game.handle_message(b, ClientMessage::JoinSession { code: session.code.clone() });
        game.handle_message(a, ClientMessage::ToggleReady { session_id: session.id, is_ready: true });
        game.handle_message(b, ClientMessage::ToggleReady { session_id: session.id, is_ready: true });
        session
    }

    #[test]
    fn test_lobby_to_match_end_to_end() {
        let mut game = game();
        let a = connect(&mut game);
        let b = connect(&mut game);

        let created = create_room(&mut game, a);
        assert_eq!(created.code.len(), 6);
        assert_eq!(created.name, "Room1");
        assert_eq!(created.host_id, a);

        let effects = game.handle_message(b, ClientMessage::JoinSession { code: created.code.clone() });
        assert!(matches!(received(&effects, b)[0], ServerMessage::SessionJoined { .. }));
        for id in [a, b] {
            let updates = session_updates(&effects, id);
            assert_eq!(updates.len(), 1);
            assert_eq!(updates[0].players.len(), 2);
        }

        let effects = game.handle_message(a, ClientMessage::ToggleReady { session_id: created.id, is_ready: true });
        assert_eq!(session_updates(&effects, b)[0].status, SessionStatus::Waiting);

        let effects = game.handle_message(b, ClientMessage::ToggleReady { session_id: created.id, is_ready: true });
        for id in [a, b] {
            let updates = session_updates(&effects, id);
            assert_eq!(updates[0].status, SessionStatus::Playing);

            let snapshot = effects
                .messages_for(id)
                .find_map(|m| match m {
                    ServerMessage::GameState(snapshot) => Some(snapshot.clone()),
                    _ => None,
                })
                .expect("game state broadcast");
            for pid in [a, b] {
                let player = snapshot.players.iter().find(|p| p.id == pid).unwrap();
                assert!(player.is_playing);
                assert_eq!(player.score, 0);
                assert_eq!(player.snake.len(), 1);
            }
        }
    }

    #[test]
    fn test_join_errors_reach_only_requester() {
        let mut game = game();
        let a = connect(&mut game);
        let b = connect(&mut game);

        let effects = game.handle_message(b, ClientMessage::JoinSession { code: "QQQQQQ".into() });
        assert_eq!(
            received(&effects, b),
            vec![ServerMessage::SessionError { message: "Session not found".into() }]
        );
        assert!(received(&effects, a).is_empty());

        let c = connect(&mut game);
        let session = start_match(&mut game, a, b);
        let effects = game.handle_message(c, ClientMessage::JoinSession { code: session.code });
        assert_eq!(
            received(&effects, c),
            vec![ServerMessage::SessionError { message: "Game already in progress".into() }]
        );
    }

    #[test]
    fn test_visibility_is_host_only() {
        let mut game = game();
        let a = connect(&mut game);
        let b = connect(&mut game);
        let session = create_room(&mut game, a);
        game.handle_message(b, ClientMessage::JoinSession { code: session.code.clone() });

        let effects = game.handle_message(
            b,
            ClientMessage::ToggleVisibility { session_id: session.id, visibility: Visibility::Private },
        );
        assert_eq!(
            received(&effects, b),
            vec![ServerMessage::SessionError { message: "Only the host can change visibility".into() }]
        );

        game.handle_message(
            a,
            ClientMessage::ToggleVisibility { session_id: session.id, visibility: Visibility::Private },
        );
        let effects = game.handle_message(b, ClientMessage::GetSessions);
        assert_eq!(received(&effects, b), vec![ServerMessage::SessionsList { sessions: vec![] }]);
    }

    #[test]
    fn test_wall_death_notifies_everyone() {
        let mut game = game();
        let a = connect(&mut game);
        let b = connect(&mut game);
        place(&mut game, a, (0, 10), Direction::Left);
        game.world.player_mut(a).unwrap().score = 7;

        let effects = game.handle_message(a, ClientMessage::Update);
        let death = ServerMessage::PlayerDeath {
            message: "Player 1 hit the wall".into(),
            player_id: a,
            killer_id: None,
        };
        assert!(received(&effects, b).contains(&death));
        let own = received(&effects, a);
        assert!(own.contains(&death));
        assert!(own.contains(&ServerMessage::GameOver { score: 7, message: "You hit the wall".into() }));
        assert!(!received(&effects, b).iter().any(|m| matches!(m, ServerMessage::GameOver { .. })));
        assert!(!game.world.player(a).unwrap().is_playing);
    }

    #[test]
    fn test_kill_names_killer() {
        let mut game = game();
        let a = connect(&mut game);
        let b = connect(&mut game);
        game.handle_message(b, ClientMessage::Spawn { player_name: "  viper ".into() });
        place(&mut game, a, (10, 10), Direction::Right);
        place(&mut game, b, (11, 10), Direction::Up);

        let effects = game.handle_message(a, ClientMessage::Update);
        assert!(received(&effects, b).contains(&ServerMessage::PlayerDeath {
            message: "Player 1 was killed by viper".into(),
            player_id: a,
            killer_id: Some(b),
        }));
    }

    #[test]
    fn test_session_reverts_after_last_death() {
        let mut game = game();
        let a = connect(&mut game);
        let b = connect(&mut game);
        let session = start_match(&mut game, a, b);

        place(&mut game, a, (0, 5), Direction::Left);
        place(&mut game, b, (255, 5), Direction::Right);
        // Spawning directly does not touch the session.
        assert_eq!(game.sessions.get(session.id).unwrap().status, SessionStatus::Playing);

        let effects = game.handle_message(a, ClientMessage::Update);
        assert!(session_updates(&effects, b).is_empty());

        let effects = game.handle_message(b, ClientMessage::Update);
        let updates = session_updates(&effects, a);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, SessionStatus::Waiting);
        assert!(updates[0].players.iter().all(|m| !m.is_ready));
    }

    #[test]
    fn test_minimap_timer_replaced_and_cancelled() {
        let mut game = game();
        let a = connect(&mut game);
        place(&mut game, a, (10, 10), Direction::Right);
        game.world.add_yellow_dot(YellowDot::new(Position::new(11, 10)));
        game.world.add_yellow_dot(YellowDot::new(Position::new(12, 10)));

        let first = game.handle_message(a, ClientMessage::Update);
        assert!(received(&first, a).contains(&ServerMessage::MinimapUpdate {
            visible: true,
            duration: 20,
            reset: false
        }));
        let ScheduledTask::HideMinimap { token: first_token, after, .. } = first.tasks[0].clone();
        assert_eq!(after, Duration::from_secs(20));

        let second = game.handle_message(a, ClientMessage::Update);
        assert!(received(&second, a).contains(&ServerMessage::MinimapUpdate {
            visible: true,
            duration: 20,
            reset: true
        }));
        let ScheduledTask::HideMinimap { token: second_token, .. } = second.tasks[0].clone();

        assert!(game.expire_minimap(a, first_token).messages.is_empty());
        assert_eq!(
            received(&game.expire_minimap(a, second_token), a),
            vec![ServerMessage::MinimapUpdate { visible: false, duration: 0, reset: false }]
        );

        // A death cancels an open window.
        game.world.add_yellow_dot(YellowDot::new(Position::new(13, 10)));
        let third = game.handle_message(a, ClientMessage::Update);
        let ScheduledTask::HideMinimap { token, .. } = third.tasks[0].clone();
        let player = game.world.player_mut(a).unwrap();
        player.snake = VecDeque::from([Position::new(0, 10)]);
        player.direction = Direction::Left;
        game.handle_message(a, ClientMessage::Update);
        assert!(!game.world.player(a).unwrap().is_playing);
        assert!(game.expire_minimap(a, token).messages.is_empty());
    }

    #[test]
    fn test_stale_updates_are_silent() {
        let mut game = game();
        let a = connect(&mut game);
        assert!(game.handle_message(a, ClientMessage::Update).messages.is_empty());
        assert!(game.handle_message(99, ClientMessage::Update).messages.is_empty());
        assert!(game.handle_message(99, ClientMessage::SpeedBoost).messages.is_empty());
    }

    #[test]
    fn test_speed_boost_decays_to_zero() {
        let mut game = game();
        let a = connect(&mut game);
        place(&mut game, a, (10, 10), Direction::Right);
        game.world.player_mut(a).unwrap().speed_boost_percentage = 0.3;

        assert!(!game.handle_message(a, ClientMessage::SpeedBoost).messages.is_empty());
        assert_eq!(game.world.player(a).unwrap().speed_boost_percentage, 0.0);
        assert!(game.handle_message(a, ClientMessage::SpeedBoost).messages.is_empty());
    }

    #[test]
    fn test_update_throttle_when_configured() {
        let mut config = Config::default();
        config.player.min_update_interval_ms = 60_000;
        let mut game = game_with(config);
        let a = connect(&mut game);
        place(&mut game, a, (10, 10), Direction::Right);

        game.handle_message(a, ClientMessage::Update);
        game.handle_message(a, ClientMessage::Update);
        assert_eq!(game.world.player(a).unwrap().head(), Position::new(11, 10));
    }

    #[test]
    fn test_unthrottled_by_default() {
        let mut game = game();
        let a = connect(&mut game);
        place(&mut game, a, (10, 10), Direction::Right);
        for _ in 0..3 {
            game.handle_message(a, ClientMessage::Update);
        }
        assert_eq!(game.world.player(a).unwrap().head(), Position::new(13, 10));
    }

    #[test]
    fn test_disconnecting_host_migrates() {
        let mut game = game();
        let a = connect(&mut game);
        let b = connect(&mut game);
        let session = create_room(&mut game, a);
        game.handle_message(b, ClientMessage::JoinSession { code: session.code });

        let effects = game.remove_client(a);
        let updates = session_updates(&effects, b);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].host_id, b);
        assert_eq!(updates[0].players.len(), 1);
        assert!(game.world.player(a).is_none());

        game.remove_client(b);
        assert!(game.sessions.is_empty());
    }

    #[test]
    fn test_leave_reports_closed_to_leaver() {
        let mut game = game();
        let a = connect(&mut game);
        let session = create_room(&mut game, a);
        let effects = game.handle_message(a, ClientMessage::LeaveSession { session_id: session.id });
        assert_eq!(
            received(&effects, a),
            vec![ServerMessage::SessionClosed { session_id: session.id, message: "Session closed".into() }]
        );
        assert_eq!(game.world.player(a).unwrap().session_id, None);
    }

    #[test]
    fn test_sweep_closes_old_sessions() {
        let mut game = game();
        let a = connect(&mut game);
        let session = create_room(&mut game, a);

        assert!(game.sweep_sessions(SystemTime::now()).messages.is_empty());
        let later = SystemTime::now() + Duration::from_secs(3 * 60 * 60);
        let effects = game.sweep_sessions(later);
        assert_eq!(
            received(&effects, a),
            vec![ServerMessage::SessionClosed { session_id: session.id, message: "Session expired".into() }]
        );
        assert!(game.sessions.get(session.id).is_none());
    }

    #[test]
    fn test_spawner_ticks_broadcast_to_players_only() {
        let mut game = game();
        let a = connect(&mut game);
        let b = connect(&mut game);
        place(&mut game, a, (10, 10), Direction::Right);

        let effects = game.spawn_food_tick();
        assert_eq!(game.world.foods.len(), 1);
        assert_eq!(received(&effects, a).len(), 1);
        assert!(received(&effects, b).is_empty());

        game.spawn_portal_tick();
        assert_eq!(game.world.portals.len(), 1);
        for _ in 0..10 {
            game.spawn_yellow_dot_tick();
        }
        assert_eq!(game.world.yellow_dots.len(), 5);
    }
}
