pub mod daemon_path;
pub mod process;

use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use process::{kill_previous_servers, restart_server};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        config::{Config, CONFIG_FILE_NAME},
        start_daemon,
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Focusgate", version, long_about = None)]
#[command(about = "Earn time on distracting sites by spending time in your editor", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(clap::Args, Debug)]
struct Location {
    #[arg(
        long,
        help = "Application directory. By default $XDG_STATE_HOME/focusgate, $HOME/.local/state/focusgate or the platform equivalent"
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Config file. By default <dir>/config.json")]
    config: Option<PathBuf>,
}

impl Location {
    fn dir(&self) -> Result<PathBuf> {
        self.dir
            .clone()
            .map_or_else(create_application_default_path, Ok)
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(v) => Ok(v.clone()),
            None => Ok(self.dir()?.join(CONFIG_FILE_NAME)),
        }
    }
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application, replacing a running one")]
    Init {
        #[command(flatten)]
        location: Location,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for debugging"
    )]
    Serve {
        #[command(flatten)]
        location: Location,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Print the configuration the daemon would use")]
    CheckConfig {
        #[command(flatten)]
        location: Location,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    match args.commands {
        Commands::Init { location } => {
            let dir = location.dir()?;
            enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;
            restart_server(&dir, location.config.as_deref())?;
            Ok(())
        }
        Commands::Stop {} => {
            let process_name = env::current_exe().context("Can't locate the current executable")?;
            kill_previous_servers(&process_name);
            Ok(())
        }
        Commands::Serve { location } => {
            let dir = location.dir()?;
            enable_logging(CLI_PREFIX, &dir, logging_level, true)?;
            start_daemon(dir, location.config).await
        }
        Commands::CheckConfig { location } => {
            let path = location.config_path()?;
            let config = Config::load(&path);
            println!("Config path: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            let settings = config.budget_settings();
            println!(
                "Effective budget: {}s initial grace, {}s reward, {}s check interval, {}s wake grace",
                settings.initial_grace_period.num_seconds(),
                settings.reward_extension.num_seconds(),
                settings.check_interval.num_seconds(),
                settings.wake_grace_period.num_seconds(),
            );
            Ok(())
        }
    }
}
