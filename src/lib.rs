pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod discussion;
pub mod matching;
pub mod models;
pub mod parser;
pub mod progress;
pub mod resolver;
pub mod session;

use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
pub use config::Config;
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    init_tracing(&config);

    match cli.command {
        None | Some(Commands::Watch) => cli::cmd_watch(&config).await,
        Some(Commands::Auth) => cli::cmd_auth(&config),
        Some(Commands::Refresh) => cli::cmd_refresh(&config).await,
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => cli::cmd_config_show(&config),
            ConfigCommands::Init => cli::cmd_config_init(),
        },
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // Transport chatter would interleave with the interactive prompts.
    let mut log_level = config.general.log_level.clone();
    log_level.push_str(",hyper_util=warn,reqwest=warn");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
