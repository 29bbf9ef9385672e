//! The time budget. [BudgetClock] decides, tick by tick, whether distractions are still allowed,
//! when the user earns more time and when a gap between ticks means the machine was asleep.
//!
//! Nothing here performs side effects. Every tick returns a [TickOutcome] that the caller turns
//! into notifications and blocking.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Sleep detection is a heuristic: a gap of more than this many check intervals between two ticks
/// is attributed to a suspended machine rather than to scheduling jitter.
pub const WAKE_GAP_MULTIPLIER: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetSettings {
    /// Budget granted at startup. Also the furthest a reward can push the budget ahead of now.
    pub initial_grace_period: Duration,
    pub reward_extension: Duration,
    pub check_interval: Duration,
    /// Budget guaranteed after a detected wake.
    pub wake_grace_period: Duration,
    /// When set, a reward that brings the clock back into budget clears the expiry latch, so the
    /// next lapse notifies again. Off by default, which notifies about expiry only once per run.
    pub rearm_grace_notification: bool,
}

impl BudgetSettings {
    pub fn wake_gap_threshold(&self) -> Duration {
        self.check_interval
            .checked_mul(WAKE_GAP_MULTIPLIER)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            initial_grace_period: Duration::minutes(15),
            reward_extension: Duration::minutes(5),
            check_interval: Duration::seconds(2),
            wake_grace_period: Duration::minutes(5),
            rearm_grace_notification: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetState {
    /// Instant until which blocked destinations stay reachable.
    pub allowed_until: DateTime<Utc>,
    pub grace_notification_sent: bool,
    pub last_observed_time: DateTime<Utc>,
}

/// What happened during a single tick. Flags are independent, several can be set at once.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub wake_detected: bool,
    pub grace_just_expired: bool,
    pub reward_granted: bool,
    pub should_block: bool,
}

pub struct BudgetClock {
    settings: BudgetSettings,
    state: BudgetState,
}

impl BudgetClock {
    pub fn new(settings: BudgetSettings, now: DateTime<Utc>) -> Self {
        let state = BudgetState {
            allowed_until: saturating_add(now, settings.initial_grace_period),
            grace_notification_sent: false,
            last_observed_time: now,
        };
        Self { settings, state }
    }

    pub fn settings(&self) -> &BudgetSettings {
        &self.settings
    }

    pub fn state(&self) -> &BudgetState {
        &self.state
    }

    /// Time left before blocking starts. Zero once the budget is exhausted.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.state.allowed_until - now).max(Duration::zero())
    }

    /// Advances the budget to `now`. The new state is computed on a copy and stored at the end, so
    /// an abandoned tick never leaves the state half updated.
    pub fn tick(&mut self, now: DateTime<Utc>, is_productive: bool) -> TickOutcome {
        let settings = &self.settings;
        let mut state = self.state.clone();
        let mut outcome = TickOutcome::default();

        // A clock that went backwards yields a negative gap and is never taken for a wake.
        if now - state.last_observed_time > settings.wake_gap_threshold() {
            state.allowed_until = state
                .allowed_until
                .max(saturating_add(now, settings.wake_grace_period));
            outcome.wake_detected = true;
        }
        state.last_observed_time = now;

        if now < state.allowed_until && !state.grace_notification_sent {
            debug!(
                "Grace period active. {} seconds remaining",
                (state.allowed_until - now).num_seconds()
            );
        } else if !state.grace_notification_sent && now >= state.allowed_until {
            state.grace_notification_sent = true;
            outcome.grace_just_expired = true;
        }

        if is_productive {
            // A stale deadline is moved up to now first, so the reward counts from the present.
            if state.allowed_until < now {
                state.allowed_until = now;
            }
            state.allowed_until = saturating_add(state.allowed_until, settings.reward_extension)
                .min(saturating_add(now, settings.initial_grace_period));
            if settings.rearm_grace_notification {
                state.grace_notification_sent = false;
            }
            outcome.reward_granted = true;
        }

        outcome.should_block = now > state.allowed_until;

        self.state = state;
        outcome
    }
}

/// Timestamps past the representable range stick to the last representable instant.
fn saturating_add(time: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    time.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
