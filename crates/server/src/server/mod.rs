//! Game server implementation.

use crate::config::Config;
use crate::entity::TimerToken;
use futures_util::{SinkExt, StreamExt};
use protocol::packets::{ClientMessage, ServerMessage};
use protocol::{PlayerId, ProtocolError};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

pub mod game;
pub mod spawner;

pub use game::GameState;

/// Who receives an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every connection.
    All,
    /// Only these players.
    Players(Vec<PlayerId>),
}

impl Recipients {
    pub fn includes(&self, id: PlayerId) -> bool {
        match self {
            Recipients::All => true,
            Recipients::Players(ids) => ids.contains(&id),
        }
    }
}

/// A message addressed to one or more connections.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipients,
    pub message: ServerMessage,
}

/// Deferred work a handler asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Close a minimap window unless its token was replaced in the meantime.
    HideMinimap {
        player_id: PlayerId,
        token: TimerToken,
        after: Duration,
    },
}

/// Everything a handler wants delivered after the state lock is released.
#[derive(Debug, Default)]
pub struct Effects {
    pub messages: Vec<Outbound>,
    pub tasks: Vec<ScheduledTask>,
}

impl Effects {
    /// Send to a single player.
    pub fn send(&mut self, id: PlayerId, message: ServerMessage) {
        self.messages.push(Outbound {
            to: Recipients::Players(vec![id]),
            message,
        });
    }

    /// Send to a set of players. Dropped when the set is empty.
    pub fn send_to(&mut self, ids: Vec<PlayerId>, message: ServerMessage) {
        if ids.is_empty() {
            return;
        }
        self.messages.push(Outbound {
            to: Recipients::Players(ids),
            message,
        });
    }

    /// Send to every connection.
    pub fn broadcast(&mut self, message: ServerMessage) {
        self.messages.push(Outbound {
            to: Recipients::All,
            message,
        });
    }

    pub fn schedule(&mut self, task: ScheduledTask) {
        self.tasks.push(task);
    }

    /// Messages that `id` would receive, in order.
    pub fn messages_for(&self, id: PlayerId) -> impl Iterator<Item = &ServerMessage> {
        self.messages
            .iter()
            .filter(move |o| o.to.includes(id))
            .map(|o| &o.message)
    }
}

/// An encoded frame queued for one connection.
#[derive(Debug)]
pub struct Frame {
    pub text: String,
    /// World snapshots may be skipped when a newer one is queued behind them.
    pub snapshot: bool,
}

/// Sending half of a connection's frame queue.
pub type Outbox = mpsc::UnboundedSender<Arc<Frame>>;

/// Delivers [`Effects`]: queues frames on the addressed connections and runs
/// scheduled tasks against the shared state.
///
/// Effects are delivered while the state lock is still held, so every
/// connection sees frames in the order the state changed.
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<RwLock<GameState>>,
    outboxes: Arc<Mutex<HashMap<PlayerId, Outbox>>>,
}

impl Dispatcher {
    pub fn new(state: Arc<RwLock<GameState>>) -> Self {
        Self {
            state,
            outboxes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `f` under the write lock and deliver its effects before releasing it.
    pub async fn apply<F>(&self, f: F)
    where
        F: FnOnce(&mut GameState) -> Effects,
    {
        let mut state = self.state.write().await;
        let effects = f(&mut state);
        self.dispatch(effects);
    }

    /// Register a new connection and queue its `init`.
    pub async fn connect(&self, addr: SocketAddr, outbox: Outbox) -> PlayerId {
        let mut state = self.state.write().await;
        let (player_id, effects) = state.add_client(addr);
        self.outboxes().insert(player_id, outbox);
        self.dispatch(effects);
        player_id
    }

    /// Drop a connection and tell the others what changed.
    pub async fn disconnect(&self, player_id: PlayerId) {
        let mut state = self.state.write().await;
        self.outboxes().remove(&player_id);
        let effects = state.remove_client(player_id);
        self.dispatch(effects);
    }

    fn outboxes(&self) -> MutexGuard<'_, HashMap<PlayerId, Outbox>> {
        self.outboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the state lock held, from within the tokio runtime.
    fn dispatch(&self, effects: Effects) {
        if !effects.messages.is_empty() {
            let outboxes = self.outboxes();
            for outbound in effects.messages {
                let text = match outbound.message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode {:?}: {}", outbound.message, e);
                        continue;
                    }
                };
                let frame = Arc::new(Frame {
                    text,
                    snapshot: matches!(outbound.message, ServerMessage::GameState(_)),
                });

                // A closed outbox belongs to a connection that is shutting down.
                match &outbound.to {
                    Recipients::All => {
                        for outbox in outboxes.values() {
                            let _ = outbox.send(Arc::clone(&frame));
                        }
                    }
                    Recipients::Players(ids) => {
                        for outbox in ids.iter().filter_map(|id| outboxes.get(id)) {
                            let _ = outbox.send(Arc::clone(&frame));
                        }
                    }
                }
            }
        }

        for task in effects.tasks {
            self.schedule(task);
        }
    }

    fn schedule(&self, task: ScheduledTask) {
        match task {
            ScheduledTask::HideMinimap {
                player_id,
                token,
                after,
            } => {
                let dispatcher = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    dispatcher
                        .apply(|state| state.expire_minimap(player_id, token))
                        .await;
                });
            }
        }
    }
}

/// Keep every queued frame except snapshots that a later snapshot supersedes.
fn coalesce(batch: Vec<Arc<Frame>>) -> Vec<Arc<Frame>> {
    let latest_snapshot = batch.iter().rposition(|frame| frame.snapshot);
    batch
        .into_iter()
        .enumerate()
        .filter(|(i, frame)| !frame.snapshot || Some(*i) == latest_snapshot)
        .map(|(_, frame)| frame)
        .collect()
}

/// Admission control for `server.max_connections` and `server.ip_limit`.
struct ConnectionLimits {
    max_total: usize,
    max_per_ip: usize,
    open: usize,
    per_ip: HashMap<IpAddr, usize>,
}

impl ConnectionLimits {
    fn new(max_total: usize, max_per_ip: usize) -> Self {
        Self {
            max_total,
            max_per_ip,
            open: 0,
            per_ip: HashMap::new(),
        }
    }

    /// Count a new socket from `ip`, or refuse it when either limit is reached.
    fn admit(&mut self, ip: IpAddr) -> bool {
        let from_ip = self.per_ip.get(&ip).copied().unwrap_or(0);
        if self.open >= self.max_total || from_ip >= self.max_per_ip {
            return false;
        }
        self.per_ip.insert(ip, from_ip + 1);
        self.open += 1;
        true
    }

    fn release(&mut self, ip: IpAddr) {
        let Some(from_ip) = self.per_ip.get_mut(&ip) else {
            return;
        };
        *from_ip -= 1;
        self.open = self.open.saturating_sub(1);
        if *from_ip == 0 {
            self.per_ip.remove(&ip);
        }
    }
}

/// Bind the configured address and run the game server.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("{} listening on ws://{}", config.server.name, addr);
    serve(listener, config).await
}

/// Run the game server on an already bound listener.
pub async fn serve(listener: TcpListener, config: Config) -> anyhow::Result<()> {
    let limits = Arc::new(Mutex::new(ConnectionLimits::new(
        config.server.max_connections,
        config.server.ip_limit,
    )));

    // Shared game state
    let mut game = GameState::new(&config);
    game.populate_world();
    let dispatcher = Dispatcher::new(Arc::new(RwLock::new(game)));

    // Start the background spawners
    tokio::spawn(spawner::run_spawners(dispatcher.clone(), config.spawner.clone()));

    loop {
        let (stream, addr) = listener.accept().await?;
        let ip = addr.ip();

        let admitted = limits.lock().unwrap_or_else(PoisonError::into_inner).admit(ip);
        if !admitted {
            warn!("Connection rejected (limit reached): {}", addr);
            continue;
        }

        let dispatcher = dispatcher.clone();
        let limits = Arc::clone(&limits);

        tokio::spawn(async move {
            let result = handle_connection(stream, addr, dispatcher).await;
            limits.lock().unwrap_or_else(PoisonError::into_inner).release(ip);

            if let Err(e) = result {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Dispatcher,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (mut write, mut read) = ws_stream.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel();
    let player_id = dispatcher.connect(addr, outbox).await;

    loop {
        tokio::select! {
            // Handle incoming WebSocket messages
            msg = read.next() => {
                let parsed = match msg {
                    Some(Ok(Message::Text(text))) => ClientMessage::parse(text.as_str()),
                    Some(Ok(Message::Binary(_))) => Err(ProtocolError::UnexpectedBinary),
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => continue,
                };

                match parsed {
                    Ok(message) => {
                        dispatcher
                            .apply(|state| state.handle_message(player_id, message))
                            .await;
                    }
                    Err(e) => {
                        warn!("Bad message from {}: {}", addr, e);
                        let Ok(reply) = ServerMessage::Error { message: e.to_string() }.to_json() else {
                            continue;
                        };
                        if let Err(e) = write.send(Message::text(reply)).await {
                            warn!("Failed to send error to {}: {}", addr, e);
                            break;
                        }
                    }
                }
            }
            // Flush queued frames
            frame = inbox.recv() => {
                let Some(frame) = frame else { break };
                let mut batch = vec![frame];
                while let Ok(next) = inbox.try_recv() {
                    batch.push(next);
                }
                let queued = batch.len();
                let batch = coalesce(batch);
                if batch.len() < queued {
                    debug!("Client {} behind, skipped {} snapshots", player_id, queued - batch.len());
                }

                let mut failed = false;
                for frame in batch {
                    if let Err(e) = write.send(Message::text(frame.text.clone())).await {
                        warn!("Failed to send to {}: {}", addr, e);
                        failed = true;
                        break;
                    }
                }
                if failed {
                    break;
                }
            }
        }
    }

    dispatcher.disconnect(player_id).await;

    Ok(())
}
