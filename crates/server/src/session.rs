//! Lobby sessions.
//!
//! A session groups players who ready up together. Its roster mirrors each
//! member's `Player::session_id`; every operation here updates both sides.

use crate::config::SessionConfig;
use crate::world::World;
use protocol::packets::{SessionInfo, SessionMember};
use protocol::{PlayerId, SessionId, SessionStatus, Visibility};
use rand::Rng;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Share code alphabet. Leaves out `0`, `1`, `I` and `O`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Shortest share code handed out, whatever the configuration says.
const MIN_CODE_LENGTH: usize = 4;

/// Collisions tolerated at one code length before codes grow by a character.
const CODE_ATTEMPTS: usize = 64;

/// Host name used when the creating player is unknown.
const FALLBACK_HOST_NAME: &str = "Host";

/// Rejected lobby actions. The display text is sent to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
    #[error("Game already in progress")]
    InProgress,
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Player not in session")]
    NotInSession,
    #[error("Only the host can change visibility")]
    NotHost,
}

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
}

/// A lobby.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub code: String,
    pub name: String,
    /// Always a member of `members`.
    pub host_id: PlayerId,
    /// In join order.
    pub members: Vec<Member>,
    pub status: SessionStatus,
    pub visibility: Visibility,
    pub created_at: SystemTime,
}

impl Session {
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.members.iter().any(|m| m.id == player_id)
    }

    pub fn member_ids(&self) -> Vec<PlayerId> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// A game starts once at least two members are all ready.
    pub fn ready_to_start(&self) -> bool {
        self.members.len() > 1 && self.members.iter().all(|m| m.is_ready)
    }

    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_at).unwrap_or_default()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            code: self.code.clone(),
            name: self.name.clone(),
            host_id: self.host_id,
            players: self
                .members
                .iter()
                .map(|m| SessionMember {
                    id: m.id,
                    name: m.name.clone(),
                    is_ready: m.is_ready,
                })
                .collect(),
            status: self.status,
            visibility: self.visibility,
            created_at: self
                .created_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }
    }
}

/// Result of a player leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub session_id: SessionId,
    /// The roster became empty and the session was deleted.
    pub closed: bool,
    /// Set when the departing player was host and someone was promoted.
    pub new_host: Option<PlayerId>,
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub session_id: SessionId,
    /// False when the player was already a member.
    pub added: bool,
    /// Session the player had to leave first.
    pub left: Option<LeaveOutcome>,
}

/// All live sessions.
#[derive(Debug)]
pub struct SessionTable {
    sessions: BTreeMap<SessionId, Session>,
    next_id: SessionId,
    code_length: usize,
    max_name_length: usize,
}

impl SessionTable {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_id: 1,
            code_length: config.code_length.max(MIN_CODE_LENGTH),
            max_name_length: config.max_name_length,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn by_code(&self, code: &str) -> Option<&Session> {
        self.sessions.values().find(|s| s.code.eq_ignore_ascii_case(code.trim()))
    }

    fn generate_code(&self, rng: &mut impl Rng) -> String {
        let mut length = self.code_length;
        loop {
            for _ in 0..CODE_ATTEMPTS {
                let code: String = (0..length)
                    .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                    .collect();
                if self.by_code(&code).is_none() {
                    return code;
                }
            }
            length += 1;
        }
    }

    /// Open a session with `host_id` as its first, non-ready member.
    ///
    /// The caller must make sure the host has left any previous session.
    pub fn create(
        &mut self,
        world: &mut World,
        name: &str,
        host_id: PlayerId,
        visibility: Visibility,
        now: SystemTime,
    ) -> &Session {
        let id = self.next_id;
        self.next_id += 1;
        let code = self.generate_code(world.rng());

        let host_name = match world.player_mut(host_id) {
            Some(player) => {
                player.session_id = Some(id);
                player.name.clone()
            }
            None => FALLBACK_HOST_NAME.to_string(),
        };

        let session = Session {
            id,
            code,
            name: name.trim().chars().take(self.max_name_length).collect(),
            host_id,
            members: vec![Member {
                id: host_id,
                name: host_name,
                is_ready: false,
            }],
            status: SessionStatus::Waiting,
            visibility,
            created_at: now,
        };
        self.sessions.entry(id).or_insert(session)
    }

    /// Join the session with share code `code`.
    ///
    /// Joining a session the player already belongs to is a no-op. A player
    /// in a different session leaves it first.
    pub fn join(
        &mut self,
        world: &mut World,
        code: &str,
        player_id: PlayerId,
    ) -> Result<JoinOutcome, SessionError> {
        let session = self.by_code(code).ok_or(SessionError::NotFound)?;
        let session_id = session.id;
        if session.contains(player_id) {
            return Ok(JoinOutcome {
                session_id,
                added: false,
                left: None,
            });
        }
        if session.status == SessionStatus::Playing {
            return Err(SessionError::InProgress);
        }
        let player = world.player(player_id).ok_or(SessionError::PlayerNotFound)?;
        let name = player.name.clone();
        let previous = player.session_id;

        let left = match previous {
            Some(prev) => self.leave(world, prev, player_id).ok(),
            None => None,
        };

        let session = self.sessions.get_mut(&session_id).ok_or(SessionError::NotFound)?;
        session.members.push(Member {
            id: player_id,
            name,
            is_ready: false,
        });
        if let Some(player) = world.player_mut(player_id) {
            player.session_id = Some(session_id);
        }

        Ok(JoinOutcome {
            session_id,
            added: true,
            left,
        })
    }

    /// Remove `player_id` from the roster, migrating host or deleting the
    /// session as needed.
    pub fn leave(
        &mut self,
        world: &mut World,
        session_id: SessionId,
        player_id: PlayerId,
    ) -> Result<LeaveOutcome, SessionError> {
        let session = self.sessions.get_mut(&session_id).ok_or(SessionError::NotFound)?;
        let index = session
            .members
            .iter()
            .position(|m| m.id == player_id)
            .ok_or(SessionError::NotInSession)?;
        session.members.remove(index);

        if let Some(player) = world.player_mut(player_id) {
            if player.session_id == Some(session_id) {
                player.session_id = None;
            }
        }

        if session.members.is_empty() {
            self.sessions.remove(&session_id);
            return Ok(LeaveOutcome {
                session_id,
                closed: true,
                new_host: None,
            });
        }

        let mut new_host = None;
        if session.host_id == player_id {
            session.host_id = session.members[0].id;
            new_host = Some(session.host_id);
        }

        Ok(LeaveOutcome {
            session_id,
            closed: false,
            new_host,
        })
    }

    /// Set a member's ready flag. Starts the game when every member of a
    /// waiting session with at least two players is ready; returns whether
    /// that happened.
    pub fn toggle_ready(
        &mut self,
        world: &mut World,
        session_id: SessionId,
        player_id: PlayerId,
        is_ready: bool,
    ) -> Result<bool, SessionError> {
        let session = self.sessions.get_mut(&session_id).ok_or(SessionError::NotFound)?;
        let member = session
            .members
            .iter_mut()
            .find(|m| m.id == player_id)
            .ok_or(SessionError::NotInSession)?;
        member.is_ready = is_ready;

        if session.status != SessionStatus::Waiting || !session.ready_to_start() {
            return Ok(false);
        }

        session.status = SessionStatus::Playing;
        for id in session.member_ids() {
            if world.player(id).is_none() {
                continue;
            }
            let position = world.spawn_position();
            if let Some(player) = world.player_mut(id) {
                player.respawn(position);
            }
        }
        Ok(true)
    }

    /// Host-only visibility change.
    pub fn toggle_visibility(
        &mut self,
        session_id: SessionId,
        player_id: PlayerId,
        visibility: Visibility,
    ) -> Result<(), SessionError> {
        let session = self.sessions.get_mut(&session_id).ok_or(SessionError::NotFound)?;
        if session.host_id != player_id {
            return Err(SessionError::NotHost);
        }
        session.visibility = visibility;
        Ok(())
    }

    /// Return a playing session to the lobby once none of its members is
    /// still alive. Clears every ready flag. Returns whether it reverted.
    pub fn revert_if_finished(&mut self, world: &World, session_id: SessionId) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        if session.status != SessionStatus::Playing {
            return false;
        }
        let any_alive = session
            .members
            .iter()
            .any(|m| world.player(m.id).is_some_and(|p| p.is_playing));
        if any_alive {
            return false;
        }
        session.status = SessionStatus::Waiting;
        for member in &mut session.members {
            member.is_ready = false;
        }
        true
    }

    /// Delete sessions older than `max_age`, detaching their members.
    pub fn reap_expired(&mut self, world: &mut World, now: SystemTime, max_age: Duration) -> Vec<Session> {
        let expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.age(now) > max_age)
            .map(|s| s.id)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(session) = self.sessions.remove(&id) {
                for member in &session.members {
                    if let Some(player) = world.player_mut(member.id) {
                        if player.session_id == Some(id) {
                            player.session_id = None;
                        }
                    }
                }
                removed.push(session);
            }
        }
        removed
    }

    /// Public sessions, oldest first.
    pub fn public_sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .values()
            .filter(|s| s.visibility == Visibility::Public)
            .map(Session::info)
            .collect()
    }
}
