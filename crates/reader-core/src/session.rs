use crate::credentials::CredentialStore;
use crate::model::{SessionState, UserProfile};
use crate::observable::{Observable, Subscription};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, warn};

pub type ProfileFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<UserProfile>> + Send + 'a>>;

/// Remote lookup of the signed-in user's profile.
pub trait ProfileSource: Send + Sync {
    fn fetch_profile(&self) -> ProfileFuture<'_>;
}

/// Owner of the authoritative session state and the cached profile.
///
/// Every transition is broadcast to the current subscribers, including
/// transitions into the state the session is already in. Subscribers that
/// fall further behind than the channel capacity lose the oldest updates and
/// a warning is logged.
pub struct SessionManager {
    credentials: CredentialStore,
    state: Observable<SessionState>,
    profile: Observable<Option<UserProfile>>,
}

impl SessionManager {
    pub fn new(credentials: CredentialStore) -> Self {
        Self {
            credentials,
            state: Observable::new(SessionState::LoggedOut),
            profile: Observable::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.profile.get()
    }

    pub fn notify_login(&self) {
        self.transition(SessionState::LoggedIn);
    }

    pub fn notify_logout(&self) {
        self.transition(SessionState::LoggedOut);
    }

    pub fn notify_unauthorized(&self) {
        self.transition(SessionState::Unauthorized);
    }

    fn transition(&self, next: SessionState) {
        self.state.update_if(|state| {
            info!(from = state.as_str(), to = next.as_str(), "Session transition");
            *state = next;
            true
        });
    }

    pub fn update_user_info(&self, profile: Option<UserProfile>) {
        self.profile.set(profile);
    }

    /// Transitions announced from now on. Drop the handle to unsubscribe.
    pub fn subscribe_state(&self) -> Subscription<SessionState> {
        self.state.subscribe()
    }

    pub fn subscribe_profile(&self) -> Subscription<Option<UserProfile>> {
        self.profile.subscribe()
    }

    /// Resolves the profile for the persisted session.
    ///
    /// Logged out (or unreadable credentials) caches and returns `None`. A
    /// profile already held is returned as is. Otherwise the profile is fetched
    /// and the outcome cached, with `None` standing in for a failed fetch.
    pub async fn get_cached_user_info(&self, source: &dyn ProfileSource) -> Option<UserProfile> {
        let logged_in = match self.credentials.is_logged_in().await {
            Ok(logged_in) => logged_in,
            Err(err) => {
                warn!(error = %err, "Credential lookup failed; treating session as logged out");
                false
            }
        };
        if !logged_in {
            self.update_user_info(None);
            return None;
        }
        if let Some(profile) = self.profile.get() {
            return Some(profile);
        }
        let fetched = match source.fetch_profile().await {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(error = %err, "Profile fetch failed");
                None
            }
        };
        self.update_user_info(fetched.clone());
        fetched
    }

    /// Startup restoration. Never fails: anything short of a resolved profile
    /// ends in `LoggedOut`.
    pub async fn restore(&self, source: &dyn ProfileSource) -> SessionState {
        match self.get_cached_user_info(source).await {
            Some(profile) => {
                debug!(user = %profile.username, "Restored session");
                self.notify_login();
                self.update_user_info(Some(profile));
            }
            None => self.notify_logout(),
        }
        self.state()
    }
}
