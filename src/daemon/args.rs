use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "focusgate-daemon", version, about = "Runs the focusgate budget loop")]
pub struct DaemonArgs {
    /// Stay attached to the current console instead of detaching.
    #[arg(long)]
    pub force: bool,
    /// Application directory holding the config file and logs.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Config file to use instead of `<dir>/config.json`.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
