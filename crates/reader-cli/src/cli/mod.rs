use crate::{crash, logging};
use anyhow::{Context, bail};
use clap::Parser;
use reader_core::config::{AppConfig, default_config_path, default_prefs_path};
use reader_core::cookies::{CookieJar, CookieStore};
use reader_core::credentials::CredentialStore;
use reader_core::model::SessionState;
use reader_core::paging::LoadOutcome;
use reader_core::prefs::FilePreferences;
use reader_core::secrets::{MemorySecrets, SecretBackend};
use reader_core::session::SessionManager;
use reader_net::RequestPipeline;
use reader_net::account::{AccountService, session_expiry_listener};
use reader_net::config::PipelineConfigBuilder;
use reader_net::gateway::ApiGateway;
use reader_net::refresh::ReloginRefreshHandler;
use reader_net::transport::{ReqwestTransport, Transport};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use url::Url;

mod app;
mod args;
mod config_cmd;
mod content_cmd;
mod context;
mod cookies_cmd;
mod session_cmd;

use args::*;

use config_cmd::handle_config;
use content_cmd::{handle_articles, handle_banners};
use context::{AppContext, ContextOptions};
use cookies_cmd::handle_cookies;
use session_cmd::{handle_login, handle_logout, handle_whoami};

pub async fn run() -> anyhow::Result<()> {
    app::run().await
}
