//! Session state store: the authoritative client-side mirror of one room.
//!
//! The store consumes decoded server events and outbound command intents,
//! applies the round/membership/permissions state machine, and publishes
//! whole [`SessionState`] snapshots through a watch channel. UI layers read
//! reactively and call only the command methods here; the transport is
//! never exposed.
//!
//! ERROR HANDLING
//! ==============
//! Transport faults collapse to disconnection, fetch faults collapse to
//! empty defaults, and undecodable frames are per-message no-ops. The only
//! hard error is [`SessionError::NotConnected`] from [`Session::send`],
//! which flags programmer misuse rather than a recoverable condition.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use protocol::{Command, Event, decode_event, encode_command};

use crate::directory::Directory;
use crate::transport::{self, Connection, TransportError};
use crate::types::{Permissions, Role, Round, RoundPhase, SessionState};

/// Error raised by session commands.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A command was sent without an open connection.
    #[error("can not send a command without a connection")]
    NotConnected,
    /// `connect` was called with an empty username.
    #[error("username must not be empty")]
    EmptyUsername,
    /// `connect` was called with a role that cannot join a room.
    #[error("role {0:?} can not join a room")]
    UnjoinableRole(Role),
    /// The transport failed to open.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The real-time context for one user in one room.
///
/// At most one live connection exists per instance; the handle is owned
/// exclusively here and is present exactly while a transport is open.
pub struct Session {
    base_url: String,
    directory: Directory,
    state: Arc<watch::Sender<SessionState>>,
    handle: Mutex<Option<ConnectionHandle>>,
}

struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl Session {
    /// Create a disconnected session against the given HTTP base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            directory: Directory::new(base_url.clone()),
            base_url,
            state: Arc::new(watch::Sender::new(SessionState::default())),
            handle: Mutex::new(None),
        }
    }

    /// The room-directory client, shared with pre-join flows.
    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Subscribe to state snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Point-in-time clone of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Whether a connection is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock_handle()
            .as_ref()
            .is_some_and(|handle| !handle.outbound.is_closed())
    }

    /// Connect to a room and start driving reactive state.
    ///
    /// A live connection is torn down first; re-entrant connects are legal
    /// but never share a transport. The call suspends until the new
    /// transport reports open or fails.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptyUsername`] or
    /// [`SessionError::UnjoinableRole`] for invalid join parameters and
    /// [`SessionError::Transport`] when the handshake fails.
    pub async fn connect(&self, name: &str, role: Role, room_id: &str) -> Result<(), SessionError> {
        if name.trim().is_empty() {
            return Err(SessionError::EmptyUsername);
        }
        let Some(segment) = role.url_segment() else {
            return Err(SessionError::UnjoinableRole(role));
        };

        self.disconnect().await;

        let url = transport::ws_url(&self.base_url, room_id, segment, name)?;
        let connection = Connection::open(&url).await?;

        self.state.send_modify(|state| {
            state.username = name.to_owned();
            state.role = role;
            state.room_id = room_id.to_owned();
            state.connected = true;
        });

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(
            connection,
            outbound_rx,
            Arc::clone(&self.state),
            self.directory.clone(),
            room_id.to_owned(),
        ));
        *self.lock_handle() = Some(ConnectionHandle { outbound, task });

        Ok(())
    }

    /// Tear down the transport and reset permissions to the no-capability
    /// default.
    ///
    /// Round and membership state are deliberately left untouched; callers
    /// decide whether [`Session::reset_round`] is also warranted.
    pub async fn disconnect(&self) {
        let handle = self.lock_handle().take();
        if let Some(ConnectionHandle { outbound, task }) = handle {
            // Dropping the sender is the teardown signal for the task.
            drop(outbound);
            let _ = task.await;
        }
        self.state.send_modify(|state| {
            state.connected = false;
            state.permissions = Permissions::default();
        });
    }

    /// Queue a command on the open connection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] if and only if no connection
    /// is currently open. This is a programmer-error guard; the server is
    /// the actual authority on whether a command is legal right now.
    pub fn send(&self, command: &Command) -> Result<(), SessionError> {
        let guard = self.lock_handle();
        let Some(handle) = guard.as_ref() else {
            return Err(SessionError::NotConnected);
        };
        handle
            .outbound
            .send(encode_command(command))
            .map_err(|_| SessionError::NotConnected)
    }

    /// Restore the round to its waiting zero state.
    pub fn reset_round(&self) {
        self.state.send_modify(|state| state.round = Round::default());
    }

    /// Replace the roster with the server's current snapshot.
    pub async fn refresh_users(&self) {
        let room_id = self.state.borrow().room_id.clone();
        refresh_users(&self.state, &self.directory, &room_id).await;
    }

    /// Re-fetch the local user's capabilities for the current room.
    pub async fn refresh_permissions(&self) {
        let (room_id, username) = {
            let state = self.state.borrow();
            (state.room_id.clone(), state.username.clone())
        };
        let permissions = self.directory.fetch_permissions(&room_id, &username).await;
        self.state.send_modify(|state| state.permissions = permissions);
    }

    /// Re-fetch whether the current room is password-gated.
    pub async fn refresh_room_locked(&self) {
        let room_id = self.state.borrow().room_id.clone();
        let locked = self.directory.room_is_locked(&room_id).await;
        self.state.send_modify(|state| state.room_locked = locked);
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<ConnectionHandle>> {
        self.handle.lock().expect("connection handle lock poisoned")
    }
}

/// Drive one connection until either side tears it down.
///
/// Inbound events are applied strictly in delivery order; a re-fetch
/// triggered by an event is awaited before the next event is applied, so
/// the roster always equals the server's last returned snapshot.
async fn run_connection(
    connection: Connection,
    mut outbound: mpsc::UnboundedReceiver<String>,
    state: Arc<watch::Sender<SessionState>>,
    directory: Directory,
    room_id: String,
) {
    let (mut writer, mut reader) = connection.split();

    let send_task = async {
        while let Some(text) = outbound.recv().await {
            if let Err(error) = writer.send_text(text).await {
                tracing::warn!(error = %error, room = %room_id, "failed to send command frame");
                break;
            }
        }
    };

    let recv_task = async {
        while let Some(frame) = reader.next_text().await {
            match frame {
                Ok(text) => match decode_event(&text) {
                    Ok(event) => apply_event(event, &state, &directory, &room_id).await,
                    Err(error) => {
                        tracing::debug!(error = %error, "ignoring undecodable event frame");
                    }
                },
                Err(error) => {
                    tracing::warn!(error = %error, room = %room_id, "websocket transport fault");
                    break;
                }
            }
        }
    };

    // When either half finishes the connection is done: a dropped sender
    // means explicit disconnect, a drained reader means the peer closed.
    tokio::select! {
        () = send_task => {}
        () = recv_task => {}
    }

    writer.close().await;
    state.send_modify(|s| {
        s.connected = false;
        s.permissions = Permissions::default();
    });
}

/// Apply one decoded server event to the state snapshot.
///
/// Round transitions are guarded so only the specified machine is
/// reachable: `Waiting -> InProgress` on estimate, `InProgress -> End` on
/// everyone-done, and back to `Waiting` on new-round.
async fn apply_event(
    event: Event,
    state: &watch::Sender<SessionState>,
    directory: &Directory,
    room_id: &str,
) {
    let roster_changed = event.is_membership_change();

    match event {
        Event::Estimate(ticket) => state.send_modify(|s| {
            if s.round.phase == RoundPhase::Waiting {
                s.round.phase = RoundPhase::InProgress;
                s.round.ticket = ticket;
            }
        }),
        Event::YouGuessed(guess) => state.send_modify(|s| {
            s.round.own_guess = guess;
            s.round.own_skipped = false;
        }),
        Event::YouSkipped => state.send_modify(|s| {
            s.round.own_guess = 0;
            s.round.own_skipped = true;
        }),
        Event::EveryoneDone => state.send_modify(|s| {
            if s.round.phase == RoundPhase::InProgress {
                s.round.phase = RoundPhase::End;
            }
        }),
        Event::Reveal(revealed) => state.send_modify(|s| s.round.revealed = revealed),
        Event::NewRound => state.send_modify(|s| s.round = Round::default()),
        Event::RoomLocked | Event::RoomOpened => {
            let locked = directory.room_is_locked(room_id).await;
            state.send_modify(|s| s.room_locked = locked);
        }
        Event::Join | Event::Leave | Event::DeveloperGuessed | Event::DeveloperSkipped => {}
    }

    if roster_changed {
        refresh_users(state, directory, room_id).await;
    }
}

async fn refresh_users(
    state: &watch::Sender<SessionState>,
    directory: &Directory,
    room_id: &str,
) {
    let users = directory.fetch_users(room_id).await;
    state.send_modify(|s| s.users = users);
}
