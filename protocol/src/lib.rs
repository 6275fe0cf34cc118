//! Wire model and JSON codec for the realtime estimation protocol.
//!
//! This crate owns the wire representation used between the client and the
//! room server: one JSON object per websocket text frame, shaped as
//! `{"type": <kind>, "data"?: <payload>}`. Outbound frames are commands the
//! local user issues; inbound frames are events the server broadcasts.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

/// Error returned by [`decode_event`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text frame is not a well-formed JSON envelope.
    #[error("failed to decode event frame: {0}")]
    Decode(#[from] serde_json::Error),
    /// The envelope `type` does not name a known event kind.
    #[error("unknown event type: {0}")]
    UnknownEvent(String),
    /// The envelope `data` is missing or has the wrong shape for its kind.
    #[error("invalid payload for `{0}` event")]
    InvalidPayload(&'static str),
}

/// A command the local user sends to the room server.
///
/// The set is closed; the server ignores anything else, so there is no
/// escape hatch for free-form frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Announce the ticket to estimate next (product owner only).
    Estimate(String),
    /// Submit a guess for the active ticket (developer only).
    Guess(i64),
    /// Abstain from guessing for the active ticket.
    Skip,
    /// Reveal all submitted guesses to the room.
    Reveal,
    /// Start a fresh round, clearing per-developer progress.
    NewRound,
    /// Password-gate the room against new joins.
    LockRoom { password: String, key: String },
    /// Remove the room's password gate.
    OpenRoom { key: String },
}

/// An event broadcast by the room server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A user entered the room.
    Join,
    /// A user left the room.
    Leave,
    /// Some developer submitted a guess.
    DeveloperGuessed,
    /// Some developer abstained.
    DeveloperSkipped,
    /// A round started for the given ticket.
    Estimate(String),
    /// The server acknowledged the local user's own guess.
    YouGuessed(i64),
    /// The server acknowledged the local user's own skip.
    YouSkipped,
    /// Every developer in the room has guessed or skipped.
    EveryoneDone,
    /// Per-developer results, in server order.
    Reveal(Vec<RevealedGuess>),
    /// The room was password-gated.
    RoomLocked,
    /// The room's password gate was removed.
    RoomOpened,
    /// The round was reset to its waiting state.
    NewRound,
}

impl Event {
    /// Whether this event invalidates the locally mirrored room roster.
    ///
    /// The roster is replaced wholesale via a re-fetch rather than patched,
    /// so every member of this family funnels through the same fetch path.
    #[must_use]
    pub fn is_membership_change(&self) -> bool {
        matches!(
            self,
            Self::Join
                | Self::Leave
                | Self::DeveloperGuessed
                | Self::DeveloperSkipped
                | Self::EveryoneDone
                | Self::NewRound
        )
    }
}

/// One developer's result as revealed to the whole room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedGuess {
    /// Developer name.
    pub name: String,
    /// Submitted guess; `0` when the developer skipped.
    #[serde(deserialize_with = "deserialize_i64_from_number")]
    pub guess: i64,
    /// True when the developer abstained instead of guessing.
    #[serde(rename = "doSkip")]
    pub do_skip: bool,
}

/// Encode a command into a JSON text frame.
#[must_use]
pub fn encode_command(command: &Command) -> String {
    let envelope = match command {
        Command::Estimate(ticket) => json!({"type": "estimate", "data": ticket}),
        Command::Guess(guess) => json!({"type": "guess", "data": guess}),
        Command::Skip => json!({"type": "skip"}),
        Command::Reveal => json!({"type": "reveal"}),
        Command::NewRound => json!({"type": "new-round"}),
        Command::LockRoom { password, key } => {
            json!({"type": "lock-room", "data": {"password": password, "key": key}})
        }
        Command::OpenRoom { key } => json!({"type": "open-room", "data": {"key": key}}),
    };
    envelope.to_string()
}

/// Decode a JSON text frame into an event.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON,
/// [`CodecError::UnknownEvent`] for an unrecognized `type`, and
/// [`CodecError::InvalidPayload`] when `data` does not fit the kind.
/// Callers that prioritize forward compatibility treat every error as a
/// per-message no-op.
pub fn decode_event(text: &str) -> Result<Event, CodecError> {
    let envelope = serde_json::from_str::<Envelope>(text)?;
    let data = envelope.data.unwrap_or(Value::Null);

    match envelope.kind.as_str() {
        "join" => Ok(Event::Join),
        "leave" => Ok(Event::Leave),
        "developer-guessed" => Ok(Event::DeveloperGuessed),
        "developer-skipped" => Ok(Event::DeveloperSkipped),
        "estimate" => data
            .as_str()
            .map(|ticket| Event::Estimate(ticket.to_owned()))
            .ok_or(CodecError::InvalidPayload("estimate")),
        "you-guessed" => int_from_number(&data)
            .map(Event::YouGuessed)
            .ok_or(CodecError::InvalidPayload("you-guessed")),
        "you-skipped" => Ok(Event::YouSkipped),
        "everyone-done" => Ok(Event::EveryoneDone),
        "reveal" => serde_json::from_value::<Vec<RevealedGuess>>(data)
            .map(Event::Reveal)
            .map_err(|_| CodecError::InvalidPayload("reveal")),
        "room-locked" => Ok(Event::RoomLocked),
        "room-opened" => Ok(Event::RoomOpened),
        "new-round" => Ok(Event::NewRound),
        _ => Err(CodecError::UnknownEvent(envelope.kind)),
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Accept plain integers plus the integral floats some JSON encoders emit.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn int_from_number(value: &Value) -> Option<i64> {
    let number = value.as_number()?;
    if let Some(int) = number.as_i64() {
        return Some(int);
    }
    number
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
        .map(|f| f as i64)
}

fn deserialize_i64_from_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let value = Value::deserialize(deserializer)?;
    int_from_number(&value).ok_or_else(|| D::Error::custom("expected integer-compatible number"))
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
