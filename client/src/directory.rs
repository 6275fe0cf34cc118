//! Room-directory HTTP client.
//!
//! Stateless request/response helpers against the room-management surface
//! under `/api/estimation`, used both before a session (existence checks,
//! password verification) and during one (roster and lock-state re-fetches).
//!
//! Every operation collapses faults to its safe default instead of
//! propagating an error: callers get an obviously empty value rather than
//! silently stale data, and nothing here can take the session down.

#[cfg(test)]
#[path = "directory_test.rs"]
mod directory_test;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::types::{GuessOption, Permissions, RoomInfo, UserEntry};

/// Stateless client for the room-management HTTP surface.
#[derive(Clone, Debug)]
pub struct Directory {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(Deserialize)]
struct RoomStateResponse {
    #[serde(rename = "inProgress")]
    in_progress: bool,
    #[serde(rename = "isLocked")]
    is_locked: bool,
}

#[derive(Deserialize)]
struct AuthenticateResponse {
    ok: bool,
}

#[derive(Deserialize)]
struct PermissionsResponse {
    permissions: Permissions,
}

#[derive(Deserialize)]
struct RoomsResponse {
    #[serde(default)]
    rooms: Option<Vec<RoomInfo>>,
}

impl Directory {
    /// Create a client for the given HTTP base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    /// Whether `name` is already taken in `room_id`.
    ///
    /// The server answers 409 Conflict with `{"exists": true}`, so the body
    /// is authoritative here, not the status code.
    pub async fn user_exists(&self, room_id: &str, name: &str) -> bool {
        let url = format!("{}/api/estimation/room/{room_id}/users/exists", self.base_url);
        let Ok(response) = self.http.get(url).query(&[("name", name)]).send().await else {
            return false;
        };
        response
            .json::<ExistsResponse>()
            .await
            .map(|body| body.exists)
            .unwrap_or(false)
    }

    /// Whether a round is currently running in `room_id`.
    pub async fn round_in_progress(&self, room_id: &str) -> bool {
        self.fetch_room_state(room_id)
            .await
            .is_some_and(|state| state.in_progress)
    }

    /// Whether `room_id` is password-gated.
    pub async fn room_is_locked(&self, room_id: &str) -> bool {
        self.fetch_room_state(room_id)
            .await
            .is_some_and(|state| state.is_locked)
    }

    /// Verify `password` against `room_id`.
    ///
    /// A non-2xx answer and a mismatched credential both collapse to `false`.
    pub async fn password_matches_room(&self, room_id: &str, password: &str) -> bool {
        let url = format!("{}/api/estimation/room/{room_id}/authenticate", self.base_url);
        let body = serde_json::json!({ "password": password });
        let Ok(response) = self.http.post(url).json(&body).send().await else {
            return false;
        };
        if !response.status().is_success() {
            return false;
        }
        response
            .json::<AuthenticateResponse>()
            .await
            .map(|body| body.ok)
            .unwrap_or(false)
    }

    /// Capabilities of `username` in `room_id`; default no-capability value
    /// on any fault.
    pub async fn fetch_permissions(&self, room_id: &str, username: &str) -> Permissions {
        self.get_json::<PermissionsResponse>(&format!(
            "/api/estimation/room/{room_id}/{username}/permissions"
        ))
        .await
        .map(|body| body.permissions)
        .unwrap_or_default()
    }

    /// Joinable rooms, in server order. The server serializes an empty
    /// listing as `null`.
    pub async fn fetch_active_rooms(&self) -> Vec<RoomInfo> {
        self.get_json::<RoomsResponse>("/api/estimation/room/rooms")
            .await
            .and_then(|body| body.rooms)
            .unwrap_or_default()
    }

    /// The configured guess catalog, in server order.
    pub async fn fetch_possible_guesses(&self) -> Vec<GuessOption> {
        self.get_json::<Vec<GuessOption>>("/api/estimation/possible-guesses")
            .await
            .unwrap_or_default()
    }

    /// Current roster of `room_id`. The server serializes an empty roster as
    /// `null`.
    pub async fn fetch_users(&self, room_id: &str) -> Vec<UserEntry> {
        self.get_json::<Option<Vec<UserEntry>>>(&format!("/api/estimation/room/{room_id}/users"))
            .await
            .flatten()
            .unwrap_or_default()
    }

    async fn fetch_room_state(&self, room_id: &str) -> Option<RoomStateResponse> {
        self.get_json(&format!("/api/estimation/room/{room_id}/state"))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let url = format!("{}{path}", self.base_url);
        let response = match self.http.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(error = %error, %url, "directory request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), %url, "directory request rejected");
            return None;
        }
        response.json::<T>().await.ok()
    }
}
