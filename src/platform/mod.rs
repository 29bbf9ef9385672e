//! Contains everything that touches the operating system: finding the frontmost application,
//! showing notifications and enforcing the blocklist. [Platform::new] picks the implementations
//! for the current target, the rest of the crate only sees the traits.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

pub mod apps;
pub mod blocking;
pub mod command;
pub mod macos;
pub mod notify_send;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use apps::ProcessTerminator;

/// Reports the display name of the application the user is currently looking at.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ForegroundProbe: Send + 'static {
    async fn current_foreground_app(&mut self) -> Result<String>;
}

/// Fire and forget desktop notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Applies the blocklist. Both operations are idempotent and are re-run on every tick while the
/// budget is exhausted, so they only need to handle what is open right now.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Enforcer: Send + 'static {
    async fn block_websites(&mut self, websites: &[String]) -> Result<()>;

    /// Returns the apps that were running but could not be quit.
    async fn block_apps(&mut self, apps: &[String]) -> Result<Vec<String>>;
}

/// Set of collaborators used by the daemon.
pub struct Platform {
    pub probe: Box<dyn ForegroundProbe>,
    pub notifier: Arc<dyn Notifier>,
    pub enforcer: Box<dyn Enforcer>,
}

impl Platform {
    pub fn new() -> Result<Self> {
        let notifier = default_notifier();
        let probe = default_probe()?;
        let enforcer = Box::new(DesktopEnforcer::new(default_website_blocker()));
        Ok(Self {
            probe,
            notifier,
            enforcer,
        })
    }
}

fn default_probe() -> Result<Box<dyn ForegroundProbe>> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            Ok(Box::new(macos::AppleScriptProbe))
        }
        else if #[cfg(feature = "win")] {
            Ok(Box::new(win::WindowsProbe::new()))
        }
        else if #[cfg(feature = "x11")] {
            Ok(Box::new(x11::X11Probe::new()?))
        }
        else {
            warn!("No foreground probe is available for this target, rewards are disabled");
            Ok(Box::new(UnsupportedProbe))
        }
    }
}

fn default_notifier() -> Arc<dyn Notifier> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            Arc::new(macos::AppleScriptNotifier)
        }
        else if #[cfg(all(unix, not(target_os = "macos")))] {
            Arc::new(notify_send::NotifySendNotifier)
        }
        else {
            Arc::new(LogNotifier)
        }
    }
}

fn default_website_blocker() -> Option<macos::ChromeTabBlocker> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            Some(macos::ChromeTabBlocker)
        }
        else {
            None
        }
    }
}

/// Used on targets where the frontmost application can't be determined. Every tick counts as
/// unproductive, so the budget still runs out.
pub struct UnsupportedProbe;

#[async_trait]
impl ForegroundProbe for UnsupportedProbe {
    async fn current_foreground_app(&mut self) -> Result<String> {
        Err(anyhow!("Foreground application detection is not supported on this platform"))
    }
}

/// Writes notifications to the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        info!("{title}: {message}");
        Ok(())
    }
}

/// Combines a browser tab blocker with the process terminator. Without a tab blocker website
/// blocking is skipped with a warning.
pub struct DesktopEnforcer {
    websites: Option<macos::ChromeTabBlocker>,
    apps: ProcessTerminator,
}

impl DesktopEnforcer {
    pub fn new(websites: Option<macos::ChromeTabBlocker>) -> Self {
        Self {
            websites,
            apps: ProcessTerminator::new(),
        }
    }
}

#[async_trait]
impl Enforcer for DesktopEnforcer {
    async fn block_websites(&mut self, websites: &[String]) -> Result<()> {
        if websites.is_empty() {
            return Ok(());
        }
        match &self.websites {
            Some(blocker) => blocker.block(websites).await,
            None => {
                warn!("Website blocking is not supported on this platform, skipping {websites:?}");
                Ok(())
            }
        }
    }

    async fn block_apps(&mut self, apps: &[String]) -> Result<Vec<String>> {
        self.apps.terminate(apps).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{DesktopEnforcer, Enforcer, ForegroundProbe, UnsupportedProbe};

    #[tokio::test]
    async fn empty_blocklists_are_noops() -> Result<()> {
        let mut enforcer = DesktopEnforcer::new(None);

        enforcer.block_websites(&[]).await?;
        assert!(enforcer.block_apps(&[]).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_tab_blocker_skips_websites() -> Result<()> {
        let mut enforcer = DesktopEnforcer::new(None);
        enforcer.block_websites(&["youtube.com".into()]).await?;
        Ok(())
    }

    #[tokio::test]
    async fn apps_that_are_not_running_are_ignored() -> Result<()> {
        let mut enforcer = DesktopEnforcer::new(None);
        let failed = enforcer
            .block_apps(&["definitely-not-a-running-app-4c1e".into()])
            .await?;
        assert!(failed.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_probe_always_fails() {
        assert!(UnsupportedProbe.current_foreground_app().await.is_err());
    }
}
