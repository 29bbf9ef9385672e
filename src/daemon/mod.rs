use std::path::PathBuf;

use anyhow::{anyhow, Result};
use config::{Config, CONFIG_FILE_NAME};
use poll::{
    messages, Blocklist, Notifications, PollLoop, ProductivityMatcher, MAX_COLLABORATOR_TIMEOUT,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    platform::Platform,
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod config;
pub mod poll;
pub mod shutdown;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    // Resolved before changing directory so relative paths keep working.
    let config = Config::load(&config_path.unwrap_or_else(|| dir.join(CONFIG_FILE_NAME)));
    std::env::set_current_dir("/")?;

    let platform = Platform::new()?;
    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown::detect_shutdown(shutdown_token.clone()));

    let result = run_daemon(config, platform, DefaultClock, shutdown_token.clone()).await;
    shutdown_token.cancel();
    result
}

/// Runs the budget loop until `shutdown_token` is cancelled. The loop only ends early on a panic,
/// which is logged, reported to the user and returned as an error.
pub async fn run_daemon(
    config: Config,
    platform: Platform,
    clock: impl Clock,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let notifications = Notifications::new(platform.notifier.clone(), MAX_COLLABORATOR_TIMEOUT);
    let poll_loop = create_poll_loop(&config, platform, clock, shutdown_token);

    match tokio::spawn(poll_loop.run()).await {
        Ok(()) => {
            info!("Budget loop stopped");
            Ok(())
        }
        Err(e) => {
            let error = anyhow!("Budget loop failed: {e}");
            error!("{error:?}");
            notifications
                .send(messages::ERROR_TITLE, &messages::error(&error))
                .await;
            Err(error)
        }
    }
}

fn create_poll_loop(
    config: &Config,
    platform: Platform,
    clock: impl Clock,
    shutdown_token: CancellationToken,
) -> PollLoop {
    PollLoop::new(
        config.budget_settings(),
        ProductivityMatcher::new(&config.code_editors),
        Blocklist {
            websites: config.websites_to_block.clone(),
            apps: config.apps_to_block.clone(),
        },
        platform.probe,
        platform.notifier,
        platform.enforcer,
        Box::new(clock),
        shutdown_token,
    )
}

#[cfg(test)]
mod daemon_tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use mockall::predicate::{always, eq};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{config::Config, poll::messages, run_daemon},
        platform::{ForegroundProbe, MockEnforcer, MockForegroundProbe, MockNotifier, Platform},
        utils::{clock::TestClock, logging::TEST_LOGGING},
    };

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_530_662_400, 0).unwrap()
    }

    struct PanickingProbe;

    #[async_trait]
    impl ForegroundProbe for PanickingProbe {
        async fn current_foreground_app(&mut self) -> Result<String> {
            panic!("probe exploded")
        }
    }

    /// Runs the whole loop for a minute of paused time with a short grace period and checks that
    /// blocking kicks in with the configured lists.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let config = Config {
            websites_to_block: vec!["youtube.com".into()],
            apps_to_block: vec!["Steam".into()],
            initial_grace_period_secs: 30,
            ..Config::default()
        };

        let mut probe = MockForegroundProbe::new();
        probe
            .expect_current_foreground_app()
            .returning(|| Ok("Google Chrome".into()));

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_, _| Ok(()));

        let blocked = Arc::new(AtomicUsize::new(0));
        let mut enforcer = MockEnforcer::new();
        let counter = blocked.clone();
        enforcer
            .expect_block_websites()
            .withf(|websites| websites.to_vec() == vec!["youtube.com".to_string()])
            .returning(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        enforcer
            .expect_block_apps()
            .withf(|apps| apps.to_vec() == vec!["Steam".to_string()])
            .returning(|_| Ok(vec![]));

        let platform = Platform {
            probe: Box::new(probe),
            notifier: Arc::new(notifier),
            enforcer: Box::new(enforcer),
        };
        let shutdown_token = CancellationToken::new();

        let (_, result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(60_500)).await;
                shutdown_token.cancel()
            },
            run_daemon(
                config,
                platform,
                TestClock::new(start()),
                shutdown_token.clone()
            ),
        );
        result?;

        // Ticks at 32s through 60s are past the 30s budget.
        assert_eq!(blocked.load(Ordering::SeqCst), 15);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn panic_in_loop_is_reported() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .with(eq(messages::STARTUP_TITLE), always())
            .times(1)
            .returning(|_, _| Ok(()));
        notifier
            .expect_notify()
            .with(eq(messages::ERROR_TITLE), always())
            .times(1)
            .returning(|_, _| Ok(()));

        let platform = Platform {
            probe: Box::new(PanickingProbe),
            notifier: Arc::new(notifier),
            enforcer: Box::new(MockEnforcer::new()),
        };

        let result = run_daemon(
            Config::default(),
            platform,
            TestClock::new(start()),
            CancellationToken::new(),
        )
        .await;
        let error = result.unwrap_err();
        assert!(error.to_string().contains("Budget loop failed"), "{error}");
    }
}
