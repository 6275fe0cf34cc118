//! Client core for the realtime estimation tool.
//!
//! `transport` owns the websocket lifecycle, `directory` handles the
//! room-management HTTP surface, `session` is the authoritative local state
//! store, and `types` defines the shared domain schema. UI layers read
//! [`session::Session`] state reactively and issue commands through it;
//! nothing else touches the transport directly.

pub mod directory;
pub mod session;
pub mod transport;
pub mod types;
