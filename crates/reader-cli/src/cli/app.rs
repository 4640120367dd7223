use super::*;

pub(super) async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let trail = logging::CrashTrail::new(logging::DEFAULT_CAPACITY);
    init_tracing(cli.log_http, &trail)?;

    let label = command_label(&cli.command);
    info!(command = label, "Running command");
    let options = ContextOptions::from_cli(&cli)?;
    if let Commands::Config(args) = &cli.command {
        return handle_config(args, &options);
    }

    let ctx = AppContext::build(options)?;
    let result = dispatch(&cli.command, &ctx)
        .instrument(tracing::info_span!("command", name = label))
        .await;
    if let Err(err) = &result {
        report_crash(&ctx, label, err, &trail).await;
    }
    result
}

fn init_tracing(log_http: bool, trail: &logging::CrashTrail) -> anyhow::Result<()> {
    let mut filter = EnvFilter::from_default_env();
    let buffered = if log_http {
        filter = filter.add_directive("reader_net=debug".parse()?);
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(filter),
        )
        .with(logging::TrailLayer::new(trail.clone()).with_filter(buffered))
        .init();
    Ok(())
}

async fn dispatch(command: &Commands, ctx: &AppContext) -> anyhow::Result<()> {
    match command {
        Commands::Login(args) => handle_login(args, ctx).await,
        Commands::Logout => handle_logout(ctx).await,
        Commands::Whoami => handle_whoami(ctx).await,
        Commands::Articles(args) => handle_articles(args, ctx).await,
        Commands::Banners => handle_banners(ctx).await,
        Commands::Cookies(args) => handle_cookies(args, ctx),
        Commands::Config(args) => handle_config(args, &ctx.options),
    }
}

async fn report_crash(
    ctx: &AppContext,
    command: &str,
    err: &anyhow::Error,
    trail: &logging::CrashTrail,
) {
    let Some(endpoint) = ctx.crash_report_endpoint() else {
        return;
    };
    let report = crash::CrashReport::new(command, err, trail);
    match crash::upload(ctx.transport.as_ref(), endpoint, &report).await {
        Ok(()) => info!(command, "Crash report uploaded"),
        Err(upload_err) => warn!(error = %format!("{upload_err:#}"), "Crash report upload failed"),
    }
}
