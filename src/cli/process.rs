use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{Context, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use super::daemon_path::to_daemon_path;

/// Stops every other process started from `name` or from the daemon binary next to it. Covers
/// both `focusgate serve` and detached daemons.
pub fn kill_previous_servers(name: &Path) {
    let daemon = to_daemon_path(name.to_path_buf());
    let system = System::new_all();
    let Ok(current_id) = get_current_pid() else {
        return;
    };
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v || daemon == *v)
            .is_some()
        {
            info!("Stopping {pid}");
            // This will forcefully terminate the process on Windows. Anything better will require a
            // lot more work.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
}

/// Shuts down previous daemons and starts a new detached one. The daemon binary detaches itself,
/// so it is enough to spawn it and return.
pub fn restart_server(dir: &Path, config: Option<&Path>) -> Result<()> {
    let process_name = env::current_exe().context("Can't operate without an executable")?;
    kill_previous_servers(&process_name);

    let daemon: PathBuf = to_daemon_path(process_name);
    let mut command = std::process::Command::new(&daemon);
    // The daemon changes its working directory, relative paths would break.
    command.arg("--dir").arg(std::path::absolute(dir)?);
    if let Some(config) = config {
        command.arg("--config").arg(std::path::absolute(config)?);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    println!("Spawning {}", daemon.display());
    #[allow(clippy::zombie_processes)]
    let _ = command
        .spawn()
        .with_context(|| format!("Failed to start {}", daemon.display()))?;
    println!("Success");
    Ok(())
}
