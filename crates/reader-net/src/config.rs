use crate::pipeline::RefreshHandler;
use crate::transport::TransportSettings;
use anyhow::Context;
use reader_core::config::AppConfig;
use reader_core::cookies::{CookieStore, MemoryCookieStore};
use reader_core::credentials::CredentialStore;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub trait HeaderProvider: Send + Sync {
    fn headers(&self) -> Vec<(String, String)>;
}

impl<F> HeaderProvider for F
where
    F: Fn() -> Vec<(String, String)> + Send + Sync,
{
    fn headers(&self) -> Vec<(String, String)> {
        self()
    }
}

/// Told when an unauthorized response could not be recovered.
pub trait UnauthorizedListener: Send + Sync {
    fn on_unauthorized(&self);
}

impl<F> UnauthorizedListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_unauthorized(&self) {
        self()
    }
}

/// Construction-time settings and collaborators of a [`RequestPipeline`].
///
/// [`RequestPipeline`]: crate::pipeline::RequestPipeline
#[derive(Clone)]
pub struct PipelineConfig {
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub enable_logging: bool,
    pub allow_insecure_tls: bool,
    pub crash_report_endpoint: Option<Url>,
    pub static_headers: Vec<(String, String)>,
    pub header_provider: Option<Arc<dyn HeaderProvider>>,
    pub credentials: Option<CredentialStore>,
    pub cookie_store: Arc<dyn CookieStore>,
    pub unauthorized_statuses: BTreeSet<u16>,
    pub business_unauthorized_codes: BTreeSet<i64>,
    pub refresh_handler: Option<Arc<dyn RefreshHandler>>,
    pub unauthorized_listener: Option<Arc<dyn UnauthorizedListener>>,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("base_url", &self.base_url.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("enable_logging", &self.enable_logging)
            .field("allow_insecure_tls", &self.allow_insecure_tls)
            .field("unauthorized_statuses", &self.unauthorized_statuses)
            .field("refresh_handler", &self.refresh_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl PipelineConfig {
    pub fn builder(base_url: Url) -> PipelineConfigBuilder {
        PipelineConfigBuilder::new(base_url)
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            allow_insecure_tls: self.allow_insecure_tls,
        }
    }
}

pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new(base_url: Url) -> Self {
        Self {
            config: PipelineConfig {
                base_url,
                connect_timeout: Duration::from_secs(10),
                read_timeout: Duration::from_secs(10),
                write_timeout: Duration::from_secs(10),
                enable_logging: false,
                allow_insecure_tls: false,
                crash_report_endpoint: None,
                static_headers: Vec::new(),
                header_provider: None,
                credentials: None,
                cookie_store: Arc::new(MemoryCookieStore::new()),
                unauthorized_statuses: BTreeSet::from([401, 403]),
                business_unauthorized_codes: BTreeSet::from([-1001]),
                refresh_handler: None,
                unauthorized_listener: None,
            },
        }
    }

    /// Seeds a builder from the on-disk configuration.
    pub fn from_app_config(app: &AppConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&app.base_url)
            .with_context(|| format!("parse base url {}", app.base_url))?;
        let crash_report_endpoint = app
            .crash_report_endpoint
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("parse crash report endpoint")?;
        let mut builder = Self::new(base_url)
            .timeouts(
                Duration::from_secs(app.connect_timeout_secs),
                Duration::from_secs(app.read_timeout_secs),
                Duration::from_secs(app.write_timeout_secs),
            )
            .enable_logging(app.enable_logging)
            .allow_insecure_tls(app.allow_insecure_tls)
            .unauthorized_statuses(app.unauthorized_statuses.iter().copied())
            .business_unauthorized_codes(app.business_unauthorized_codes.iter().copied());
        builder.config.crash_report_endpoint = crash_report_endpoint;
        builder.config.static_headers = app
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(builder)
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    pub fn transport_settings(&self) -> TransportSettings {
        self.config.transport_settings()
    }

    pub fn timeouts(mut self, connect: Duration, read: Duration, write: Duration) -> Self {
        self.config.connect_timeout = connect;
        self.config.read_timeout = read;
        self.config.write_timeout = write;
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Only honored by debug builds.
    pub fn allow_insecure_tls(mut self, allow: bool) -> Self {
        if allow && !cfg!(debug_assertions) {
            warn!("Ignoring insecure TLS request in a release build");
            self.config.allow_insecure_tls = false;
        } else {
            self.config.allow_insecure_tls = allow;
        }
        self
    }

    pub fn crash_report_endpoint(mut self, endpoint: Option<Url>) -> Self {
        self.config.crash_report_endpoint = endpoint;
        self
    }

    pub fn static_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.static_headers.push((name.into(), value.into()));
        self
    }

    pub fn header_provider(mut self, provider: Arc<dyn HeaderProvider>) -> Self {
        self.config.header_provider = Some(provider);
        self
    }

    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.config.cookie_store = store;
        self
    }

    pub fn unauthorized_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.config.unauthorized_statuses = statuses.into_iter().collect();
        self
    }

    pub fn business_unauthorized_codes(mut self, codes: impl IntoIterator<Item = i64>) -> Self {
        self.config.business_unauthorized_codes = codes.into_iter().collect();
        self
    }

    pub fn refresh_handler(mut self, handler: Arc<dyn RefreshHandler>) -> Self {
        self.config.refresh_handler = Some(handler);
        self
    }

    pub fn unauthorized_listener(mut self, listener: Arc<dyn UnauthorizedListener>) -> Self {
        self.config.unauthorized_listener = Some(listener);
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
