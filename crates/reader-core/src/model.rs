use serde::{Deserialize, Serialize};

/// Persisted authentication material.
///
/// A record counts as logged in only when both `token` and `user_id` are
/// present; a fully empty record is the logged-out state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialRecord {
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some() && self.user_id.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none()
            && self.user_id.is_none()
            && self.username.is_none()
            && self.password.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub coin_count: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub rank: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
    Unauthorized,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::LoggedOut => "logged-out",
            SessionState::LoggedIn => "logged-in",
            SessionState::Unauthorized => "unauthorized",
        }
    }
}

/// One page returned by a page-fetch function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: u32,
    pub has_more: bool,
}
