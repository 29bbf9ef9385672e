use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    budget::{BudgetClock, BudgetSettings, TickOutcome},
    platform::{Enforcer, ForegroundProbe, Notifier},
    utils::clock::Clock,
};

/// Upper bound for a single collaborator call. Lowered to half the check interval for very short
/// intervals so a slow call can't eat a whole tick.
pub const MAX_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(1);

/// Decides whether the frontmost application counts as productive.
#[derive(Debug, Clone)]
pub struct ProductivityMatcher {
    editors: Vec<String>,
}

impl ProductivityMatcher {
    pub fn new(editors: &[String]) -> Self {
        Self {
            editors: editors
                .iter()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect(),
        }
    }

    pub fn is_productive(&self, app: &str) -> bool {
        let app = app.to_lowercase();
        self.editors.iter().any(|editor| app.contains(editor.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    pub websites: Vec<String>,
    pub apps: Vec<String>,
}

/// Fixed texts shown to the user. Durations are rendered in minutes when they are a whole number of
/// minutes, in seconds otherwise.
pub mod messages {
    use chrono::Duration;

    pub const STARTUP_TITLE: &str = "Focusgate Running";
    pub const WAKE_TITLE: &str = "Welcome Back";
    pub const GRACE_EXPIRED_TITLE: &str = "Grace Period Over";
    pub const GRACE_EXPIRED_MESSAGE: &str = "Blocked sites are now monitored. Start coding!";
    pub const REWARD_TITLE: &str = "Good Job!";
    pub const BLOCK_TITLE: &str = "Time's Up!";
    pub const BLOCK_MESSAGE: &str = "Distractions are blocked until you code again.";
    pub const APP_NOT_QUIT_TITLE: &str = "Blocked App";
    pub const ERROR_TITLE: &str = "Focusgate Error";

    fn amount(duration: Duration) -> (i64, &'static str) {
        let seconds = duration.num_seconds();
        if seconds >= 60 && seconds % 60 == 0 {
            (seconds / 60, "minute")
        } else {
            (seconds, "second")
        }
    }

    fn plural(count: i64, unit: &str) -> String {
        if count == 1 {
            unit.to_string()
        } else {
            format!("{unit}s")
        }
    }

    pub fn startup(initial_grace_period: Duration) -> String {
        let (count, unit) = amount(initial_grace_period);
        format!("Distraction blocker is active. {count}-{unit} grace period started.")
    }

    pub fn wake(wake_grace_period: Duration) -> String {
        let (count, unit) = amount(wake_grace_period);
        format!(
            "You have {count} {} of grace time to resume coding.",
            plural(count, unit)
        )
    }

    pub fn reward(reward_extension: Duration) -> String {
        let (count, unit) = amount(reward_extension);
        format!("{count} extra {} added. Keep coding!", plural(count, unit))
    }

    pub fn app_not_quit(app: &str) -> String {
        format!("Could not quit {app}. Please close it.")
    }

    pub fn error(error: &anyhow::Error) -> String {
        format!("An error occurred: {error}")
    }
}

/// Sends notifications on behalf of the daemon. A failing or slow notifier is logged and
/// otherwise ignored.
#[derive(Clone)]
pub struct Notifications {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl Notifications {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    pub async fn send(&self, title: &str, message: &str) {
        match bounded(self.timeout, "notifier", self.notifier.notify(title, message)).await {
            Ok(()) => info!("Notification sent - {title}: {message}"),
            Err(e) => warn!("Failed to send notification {title:?} {e:?}"),
        }
    }
}

/// Drives [BudgetClock] at a fixed cadence and turns its outcomes into notifications and
/// blocking. Collaborator failures are logged and skipped, they never end the loop.
pub struct PollLoop {
    budget: BudgetClock,
    matcher: ProductivityMatcher,
    blocklist: Blocklist,
    probe: Box<dyn ForegroundProbe>,
    notifications: Notifications,
    enforcer: Box<dyn Enforcer>,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
    check_interval: Duration,
    collaborator_timeout: Duration,
}

impl PollLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: BudgetSettings,
        matcher: ProductivityMatcher,
        blocklist: Blocklist,
        probe: Box<dyn ForegroundProbe>,
        notifier: Arc<dyn Notifier>,
        enforcer: Box<dyn Enforcer>,
        clock: Box<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        let check_interval = settings
            .check_interval
            .to_std()
            .unwrap_or(Duration::from_secs(2));
        let collaborator_timeout = MAX_COLLABORATOR_TIMEOUT.min(check_interval / 2);
        let budget = BudgetClock::new(settings, clock.time());
        Self {
            budget,
            matcher,
            blocklist,
            probe,
            notifications: Notifications::new(notifier, collaborator_timeout),
            enforcer,
            clock,
            shutdown,
            check_interval,
            collaborator_timeout,
        }
    }

    pub fn budget(&self) -> &BudgetClock {
        &self.budget
    }

    /// Executes the loop until the shutdown token is cancelled.
    pub async fn run(mut self) {
        let startup = messages::startup(self.budget.settings().initial_grace_period);
        self.notifications.send(messages::STARTUP_TITLE, &startup).await;
        info!(
            "Started with {}s of grace",
            self.budget.settings().initial_grace_period.num_seconds()
        );

        let mut deadline = self.clock.instant();
        loop {
            // After a suspend the deadline lags behind, restart the schedule instead of catching
            // up with a burst of ticks.
            deadline = (deadline + self.check_interval).max(self.clock.instant());

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping");
                    return;
                }
                _ = self.clock.sleep_until(deadline) => ()
            }

            let span = info_span!("tick");
            self.tick_once().instrument(span).await;
        }
    }

    /// Runs one iteration: probe, classify, advance the budget, act on the outcome.
    pub async fn tick_once(&mut self) -> TickOutcome {
        let is_productive = match bounded(
            self.collaborator_timeout,
            "foreground probe",
            self.probe.current_foreground_app(),
        )
        .await
        {
            Ok(app) => {
                let productive = self.matcher.is_productive(&app);
                if productive {
                    debug!("Detected coding editor: {app}");
                }
                productive
            }
            Err(e) => {
                warn!("Couldn't detect the foreground application {e:?}");
                false
            }
        };

        let now = self.clock.time();
        let outcome = self.budget.tick(now, is_productive);
        self.dispatch(outcome).await;
        outcome
    }

    async fn dispatch(&mut self, outcome: TickOutcome) {
        let settings = self.budget.settings().clone();

        if outcome.wake_detected {
            info!("System wake detected, granting wake grace period");
            self.notifications
                .send(messages::WAKE_TITLE, &messages::wake(settings.wake_grace_period))
                .await;
        }

        if outcome.grace_just_expired {
            info!("Grace period expired");
            self.notifications
                .send(messages::GRACE_EXPIRED_TITLE, messages::GRACE_EXPIRED_MESSAGE)
                .await;
        }

        if outcome.reward_granted {
            let now = self.clock.time();
            debug!(
                "New allowed_until: {} ({} seconds left)",
                self.budget.state().allowed_until,
                self.budget.remaining(now).num_seconds()
            );
            self.notifications
                .send(messages::REWARD_TITLE, &messages::reward(settings.reward_extension))
                .await;
        }

        if outcome.should_block {
            self.notifications
                .send(messages::BLOCK_TITLE, messages::BLOCK_MESSAGE)
                .await;

            let timeout = self.collaborator_timeout;
            if let Err(e) = bounded(
                timeout,
                "website enforcer",
                self.enforcer.block_websites(&self.blocklist.websites),
            )
            .await
            {
                warn!("Failed to block websites {e:?}");
            }
            match bounded(
                timeout,
                "app enforcer",
                self.enforcer.block_apps(&self.blocklist.apps),
            )
            .await
            {
                // Each notice gets its own bound, separate from the kills.
                Ok(not_quit) => {
                    for app in not_quit {
                        self.notifications
                            .send(messages::APP_NOT_QUIT_TITLE, &messages::app_not_quit(&app))
                            .await;
                    }
                }
                Err(e) => warn!("Failed to block apps {e:?}"),
            }
        }
    }
}

/// Bounds a collaborator call. Hitting the limit counts as a failure of that call.
async fn bounded<T>(
    limit: Duration,
    what: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| anyhow!("{what} timed out after {limit:?}"))?
}
