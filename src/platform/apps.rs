use anyhow::Result;
use sysinfo::{get_current_pid, Pid, ProcessesToUpdate, Signal, System};
use tracing::{debug, info, warn};

use super::blocking::BlockingState;

/// Quits blocked applications by looking them up in the process table. The scan runs on the
/// blocking pool.
pub struct ProcessTerminator {
    processes: BlockingState<ProcessTable>,
}

struct ProcessTable {
    system: System,
    current_pid: Option<Pid>,
}

/// Whether a process name refers to the configured application. Comparison ignores case and a
/// trailing `.exe`.
pub fn matches_app(process_name: &str, app: &str) -> bool {
    fn normalize(name: &str) -> String {
        let name = name.trim().to_lowercase();
        match name.strip_suffix(".exe") {
            Some(stripped) => stripped.to_string(),
            None => name,
        }
    }
    let app = normalize(app);
    !app.is_empty() && normalize(process_name) == app
}

impl ProcessTerminator {
    pub fn new() -> Self {
        Self {
            processes: BlockingState::new(ProcessTable {
                system: System::new(),
                current_pid: get_current_pid().ok(),
            }),
        }
    }

    /// Tries to terminate every running process of every app in `apps`. Returns the apps that
    /// were running but could not be stopped.
    pub async fn terminate(&self, apps: &[String]) -> Result<Vec<String>> {
        if apps.is_empty() {
            return Ok(vec![]);
        }
        let apps = apps.to_vec();
        self.processes
            .run(move |processes| Ok(processes.terminate(&apps)))
            .await
    }
}

impl ProcessTable {
    fn terminate(&mut self, apps: &[String]) -> Vec<String> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);

        let mut failed = vec![];
        for app in apps {
            let mut found = false;
            let mut stopped = true;
            for (pid, process) in self.system.processes() {
                if Some(*pid) == self.current_pid {
                    continue;
                }
                if !matches_app(&process.name().to_string_lossy(), app) {
                    continue;
                }
                found = true;
                // Ask nicely first, then force. Windows has no SIGTERM and goes straight to kill.
                let terminated = match process.kill_with(Signal::Term) {
                    Some(true) => true,
                    Some(false) | None => process.kill(),
                };
                if terminated {
                    info!("Quit {app} (pid {pid})");
                } else {
                    warn!("Failed to quit {app} (pid {pid})");
                    stopped = false;
                }
            }
            if !found {
                debug!("{app} is not running");
            } else if !stopped {
                failed.push(app.clone());
            }
        }
        failed
    }
}

impl Default for ProcessTerminator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{matches_app, ProcessTerminator};

    #[test]
    fn matching_ignores_case_and_exe_suffix() {
        assert!(matches_app("Discord", "discord"));
        assert!(matches_app("Discord.exe", "Discord"));
        assert!(matches_app("steam", "Steam.EXE"));
        assert!(!matches_app("DiscordPTB", "Discord"));
        assert!(!matches_app("Discord", ""));
    }

    #[tokio::test]
    async fn unknown_apps_are_not_failures() -> Result<()> {
        let terminator = ProcessTerminator::new();
        let failed = terminator
            .terminate(&["focusgate-no-such-app-91f3".into()])
            .await?;
        assert!(failed.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_list_does_nothing() -> Result<()> {
        assert!(ProcessTerminator::new().terminate(&[]).await?.is_empty());
        Ok(())
    }
}
