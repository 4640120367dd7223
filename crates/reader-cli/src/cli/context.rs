use super::*;

/// Everything a command needs before any component is constructed.
#[derive(Debug, Clone)]
pub(super) struct ContextOptions {
    pub(super) config_path: PathBuf,
    pub(super) prefs_path: PathBuf,
    pub(super) base_url: Option<String>,
    pub(super) log_http: bool,
    pub(super) ephemeral: bool,
}

impl ContextOptions {
    pub(super) fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        Ok(Self {
            config_path,
            prefs_path: default_prefs_path()?,
            base_url: cli.base_url.clone(),
            log_http: cli.log_http,
            ephemeral: cli.ephemeral,
        })
    }

    /// The config file with command-line overrides applied.
    pub(super) fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::load(&self.config_path)
            .with_context(|| format!("load config from {}", self.config_path.display()))?;
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if self.log_http {
            config.enable_logging = true;
        }
        Ok(config)
    }
}

/// Process-wide components, built once and handed to every command.
pub(super) struct AppContext {
    pub(super) options: ContextOptions,
    pub(super) cookies: Arc<CookieJar>,
    pub(super) session: Arc<SessionManager>,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) gateway: ApiGateway,
    pub(super) account: AccountService,
}

impl AppContext {
    pub(super) fn build(options: ContextOptions) -> anyhow::Result<Self> {
        let config = options.load_config()?;
        let credentials = CredentialStore::new(secret_backend(options.ephemeral));
        let cookies = Arc::new(CookieJar::new(Arc::new(FilePreferences::new(
            options.prefs_path.clone(),
        ))));
        let session = Arc::new(SessionManager::new(credentials.clone()));

        let builder = PipelineConfigBuilder::from_app_config(&config)?;
        let transport: Arc<dyn Transport> = Arc::new(
            ReqwestTransport::new(&builder.transport_settings()).context("build HTTP client")?,
        );
        let refresh = ReloginRefreshHandler::new(
            transport.clone(),
            builder.base_url(),
            credentials.clone(),
            cookies.clone(),
        )?
        .with_session(session.clone());
        let pipeline_config = builder
            .credentials(credentials.clone())
            .cookie_store(cookies.clone())
            .refresh_handler(Arc::new(refresh))
            .unauthorized_listener(session_expiry_listener(session.clone()))
            .build();
        let pipeline = Arc::new(RequestPipeline::new(pipeline_config, transport.clone()));
        let gateway = ApiGateway::new(pipeline);
        let account = AccountService::new(
            gateway.clone(),
            credentials,
            cookies.clone(),
            session.clone(),
        );

        Ok(Self {
            options,
            cookies,
            session,
            transport,
            gateway,
            account,
        })
    }

    pub(super) fn crash_report_endpoint(&self) -> Option<&Url> {
        self.gateway.pipeline().crash_report_endpoint()
    }

    pub(super) fn base_host(&self) -> Option<String> {
        self.gateway
            .pipeline()
            .config()
            .base_url
            .host_str()
            .map(ToString::to_string)
    }
}

fn secret_backend(ephemeral: bool) -> Arc<dyn SecretBackend> {
    if ephemeral {
        return Arc::new(MemorySecrets::new());
    }
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        Arc::new(reader_core::secrets::KeyringSecrets::default())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        warn!("No OS keyring on this platform; credentials are kept in memory");
        Arc::new(MemorySecrets::new())
    }
}
