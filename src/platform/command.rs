use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::trace;

/// Runs an external program and returns its trimmed stdout. A non-zero exit status is an error
/// carrying stderr. The child is killed if the returned future is dropped, so a caller that
/// times out doesn't leave it behind.
pub async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    trace!("Running {program} {args:?}");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to spawn {program}"))?;

    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
