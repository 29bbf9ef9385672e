use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{command::run_command, Notifier};

/// Milliseconds a notification stays on screen. The notification daemon is free to ignore it.
const EXPIRE_TIME_MS: &str = "5000";

/// Notifier for freedesktop systems, backed by `notify-send` from libnotify.
pub struct NotifySendNotifier;

#[async_trait]
impl Notifier for NotifySendNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        run_command(
            "notify-send",
            &["--app-name=focusgate", "--expire-time", EXPIRE_TIME_MS, title, message],
        )
        .await?;
        debug!("Notification sent - {title}: {message}");
        Ok(())
    }
}
