use crate::envelope::ApiEnvelope;
use crate::gateway::LOGIN_PATH;
use crate::models::LoginPayload;
use crate::pipeline::{RefreshFuture, RefreshHandler};
use crate::transport::{ApiRequest, Transport};
use anyhow::Context;
use reader_core::cookies::{CookieStore, with_store};
use reader_core::credentials::CredentialStore;
use reader_core::session::SessionManager;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Renews the session by replaying the stored username and password
/// against the login endpoint.
///
/// Talks to the bare transport so a rejected login can never re-enter the
/// pipeline's own refresh path.
pub struct ReloginRefreshHandler {
    transport: Arc<dyn Transport>,
    login_url: Url,
    credentials: CredentialStore,
    cookies: Arc<dyn CookieStore>,
    session: Option<Arc<SessionManager>>,
}

impl ReloginRefreshHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &Url,
        credentials: CredentialStore,
        cookies: Arc<dyn CookieStore>,
    ) -> anyhow::Result<Self> {
        let login_url = base_url
            .join(LOGIN_PATH)
            .with_context(|| format!("resolve login endpoint against {base_url}"))?;
        Ok(Self {
            transport,
            login_url,
            credentials,
            cookies,
            session: None,
        })
    }

    pub fn with_session(mut self, session: Arc<SessionManager>) -> Self {
        self.session = Some(session);
        self
    }

    async fn stored_login(&self) -> Option<(String, String)> {
        let username = self.credentials.username().await;
        let password = self.credentials.password().await;
        match (username, password) {
            (Ok(Some(username)), Ok(Some(password)))
                if !username.is_empty() && !password.is_empty() =>
            {
                Some((username, password))
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "Failed to read stored login");
                None
            }
            _ => None,
        }
    }

    async fn relogin(&self) -> anyhow::Result<bool> {
        let Some((username, password)) = self.stored_login().await else {
            return Ok(false);
        };
        let request = ApiRequest::post_form(
            self.login_url.clone(),
            [("username", username.as_str()), ("password", password.as_str())],
        );
        let response = self
            .transport
            .execute(&request)
            .await
            .context("send re-login request")?;
        let cookies = response.set_cookies();
        if !cookies.is_empty() {
            let url = self.login_url.clone();
            with_store(&self.cookies, move |store| store.save_from_response(&url, &cookies))
                .await
                .context("store re-login cookies")?;
        }
        if !response.status.is_success() {
            warn!(status = response.status.as_u16(), "Re-login was rejected");
            return Ok(false);
        }

        let envelope: ApiEnvelope<LoginPayload> =
            response.json().context("decode re-login response")?;
        let payload = match envelope.into_result(&BTreeSet::new()) {
            Ok(Some(payload)) => payload,
            Ok(None) => return Ok(false),
            Err(err) => {
                warn!(error = %err, "Re-login was rejected");
                return Ok(false);
            }
        };

        self.credentials
            .save(
                &payload.token,
                &payload.id.to_string(),
                &payload.username,
                &password,
            )
            .await
            .context("store renewed credentials")?;
        info!(user = %payload.username, "Session renewed");
        if let Some(session) = &self.session {
            session.notify_login();
            session.update_user_info(Some(payload.profile()));
        }
        Ok(true)
    }
}

impl RefreshHandler for ReloginRefreshHandler {
    fn can_refresh(&self) -> RefreshFuture<'_, bool> {
        Box::pin(async move { self.stored_login().await.is_some() })
    }

    fn refresh(&self) -> RefreshFuture<'_, anyhow::Result<bool>> {
        Box::pin(self.relogin())
    }
}
