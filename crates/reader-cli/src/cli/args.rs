use super::*;
#[derive(Parser)]
#[command(name = "reader", author, version, about)]
pub(super) struct Cli {
    #[arg(long, global = true, help = "Config file (defaults to the platform config dir)")]
    pub(super) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the configured API base URL")]
    pub(super) base_url: Option<String>,
    #[arg(long, global = true, help = "Log every HTTP exchange at debug level")]
    pub(super) log_http: bool,
    #[arg(
        long,
        global = true,
        help = "Keep credentials in memory instead of the OS keyring"
    )]
    pub(super) ephemeral: bool,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Sign in and store the session")]
    Login(LoginArgs),
    #[command(about = "Sign out and clear local session data")]
    Logout,
    #[command(about = "Show the signed-in user")]
    Whoami,
    #[command(about = "List the home article feed")]
    Articles(ArticlesArgs),
    #[command(about = "List home banners")]
    Banners,
    #[command(about = "Inspect or clear stored cookies")]
    Cookies(CookiesArgs),
    #[command(about = "Manage config")]
    Config(ConfigArgs),
}

#[derive(Parser)]
pub(super) struct LoginArgs {
    #[arg(long)]
    pub(super) username: String,
    #[arg(long, help = "Read from stdin when omitted")]
    pub(super) password: Option<String>,
}

#[derive(Parser)]
pub(super) struct ArticlesArgs {
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub(super) pages: u32,
}

#[derive(Parser)]
pub(super) struct CookiesArgs {
    #[command(subcommand)]
    pub(super) command: CookiesCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum CookiesCommands {
    #[command(about = "Show cookies stored for a host")]
    Show(ShowCookiesArgs),
    #[command(about = "Remove every stored cookie")]
    Clear,
}

#[derive(Parser)]
pub(super) struct ShowCookiesArgs {
    pub(super) host: Option<String>,
}

#[derive(Parser)]
pub(super) struct ConfigArgs {
    #[command(subcommand)]
    pub(super) command: ConfigCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum ConfigCommands {
    #[command(about = "Print the effective config")]
    Show,
    #[command(about = "Write a default config file")]
    Init(InitArgs),
}

#[derive(Parser)]
pub(super) struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    pub(super) force: bool,
}

pub(super) fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Login(_) => "login",
        Commands::Logout => "logout",
        Commands::Whoami => "whoami",
        Commands::Articles(_) => "articles",
        Commands::Banners => "banners",
        Commands::Cookies(_) => "cookies",
        Commands::Config(_) => "config",
    }
}
