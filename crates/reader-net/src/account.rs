use crate::config::UnauthorizedListener;
use crate::gateway::ApiGateway;
use anyhow::Context;
use reader_core::cookies::{CookieStore, with_store};
use reader_core::credentials::CredentialStore;
use reader_core::model::{SessionState, UserProfile};
use reader_core::session::SessionManager;
use std::sync::Arc;
use tracing::{info, warn};

/// Routes unrecovered unauthorized responses into the session so the whole
/// app moves to the sign-in-again state.
pub fn session_expiry_listener(session: Arc<SessionManager>) -> Arc<dyn UnauthorizedListener> {
    Arc::new(move || session.notify_unauthorized())
}

/// Sign-in and sign-out flows that keep credentials, cookies and session
/// state consistent with each other.
#[derive(Clone)]
pub struct AccountService {
    gateway: ApiGateway,
    credentials: CredentialStore,
    cookies: Arc<dyn CookieStore>,
    session: Arc<SessionManager>,
}

impl AccountService {
    pub fn new(
        gateway: ApiGateway,
        credentials: CredentialStore,
        cookies: Arc<dyn CookieStore>,
        session: Arc<SessionManager>,
    ) -> Self {
        Self {
            gateway,
            credentials,
            cookies,
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub async fn login(&self, username: &str, password: &str) -> anyhow::Result<UserProfile> {
        let payload = self
            .gateway
            .login(username, password)
            .await
            .context("login request")?;
        self.credentials
            .save(
                &payload.token,
                &payload.id.to_string(),
                &payload.username,
                password,
            )
            .await
            .context("store credentials")?;
        info!(user = %payload.username, "Logged in");
        self.session.notify_login();

        let profile = match self.gateway.user_profile().await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "Profile fetch after login failed; using login payload");
                payload.profile()
            }
        };
        self.session.update_user_info(Some(profile.clone()));
        Ok(profile)
    }

    /// Local state is cleared even when the remote logout fails.
    pub async fn logout(&self) -> anyhow::Result<()> {
        if let Err(err) = self.gateway.logout().await {
            warn!(error = %err, "Remote logout failed; clearing local session anyway");
        }
        let cleared = self.credentials.clear().await;
        if let Err(err) = with_store(&self.cookies, |store| store.clear()).await {
            warn!(error = %err, "Clearing cookies did not complete");
        }
        self.session.update_user_info(None);
        self.session.notify_logout();
        cleared.context("clear stored credentials")
    }

    pub async fn restore(&self) -> SessionState {
        self.session.restore(&self.gateway).await
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        self.session.get_cached_user_info(&self.gateway).await
    }
}
