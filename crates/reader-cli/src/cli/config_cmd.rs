use super::*;
pub(super) fn handle_config(args: &ConfigArgs, options: &ContextOptions) -> anyhow::Result<()> {
    match &args.command {
        ConfigCommands::Show => handle_show(options),
        ConfigCommands::Init(args) => handle_init(args, options),
    }
}

fn handle_show(options: &ContextOptions) -> anyhow::Result<()> {
    let config = options.load_config()?;
    println!("Config file: {}", options.config_path.display());
    println!("Cookie store: {}", options.prefs_path.display());
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("serialize config")?
    );
    Ok(())
}

pub(super) fn handle_init(args: &InitArgs, options: &ContextOptions) -> anyhow::Result<()> {
    let path = &options.config_path;
    if path.exists() && !args.force {
        bail!(
            "config already exists at {}; pass --force to overwrite",
            path.display()
        );
    }
    let mut config = AppConfig::default();
    if let Some(base_url) = &options.base_url {
        Url::parse(base_url).with_context(|| format!("invalid base url {base_url}"))?;
        config.base_url = base_url.clone();
    }
    config.save(path)?;
    info!(path = %path.display(), "Config written");
    println!("Config saved to {}", path.display());
    Ok(())
}
