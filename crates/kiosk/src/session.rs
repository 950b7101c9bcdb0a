//! Kiosk session state machine.
//!
//! Every method takes the current `Instant` so transitions are driven by the
//! caller's clock. The controller passes `Instant::now()`; tests pass
//! whatever they like.

use rewards_core::config::KioskConfig;
use rewards_core::error::{RewardsError, RewardsResult};
use rewards_core::types::{Customer, PendingCustomer, ResolvedCustomer};
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KioskState {
    /// Welcome screen.
    Idle,
    AwaitingPhone,
    AwaitingRegistration,
    ActiveSession,
    SuccessDisplay,
}

/// Transition taken by [`KioskSession::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    TimedOut,
    CountdownElapsed,
}

#[derive(Debug, Clone, Copy)]
pub struct KioskTimings {
    pub idle_timeout: Duration,
    pub success_display: Duration,
    pub retention: Duration,
}

impl From<&KioskConfig> for KioskTimings {
    fn from(config: &KioskConfig) -> Self {
        Self {
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            success_display: Duration::from_secs(config.success_display_secs),
            retention: Duration::from_secs(config.session_retention_secs),
        }
    }
}

impl Default for KioskTimings {
    fn default() -> Self {
        Self::from(&KioskConfig::default())
    }
}

#[derive(Debug)]
pub struct KioskSession {
    kiosk_id: String,
    state: KioskState,
    customer: Option<Customer>,
    pending: Option<PendingCustomer>,
    message: Option<String>,
    last_activity: Instant,
    success_since: Option<Instant>,
    timings: KioskTimings,
}

impl KioskSession {
    pub fn new(kiosk_id: impl Into<String>, timings: KioskTimings, now: Instant) -> Self {
        Self {
            kiosk_id: kiosk_id.into(),
            state: KioskState::Idle,
            customer: None,
            pending: None,
            message: None,
            last_activity: now,
            success_since: None,
            timings,
        }
    }

    pub fn kiosk_id(&self) -> &str {
        &self.kiosk_id
    }

    pub fn state(&self) -> KioskState {
        self.state
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingCustomer> {
        self.pending.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Fail unless the session is in `expected`.
    pub fn require(&self, expected: KioskState) -> RewardsResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RewardsError::InvalidTransition(format!(
                "kiosk {} is {:?}, expected {:?}",
                self.kiosk_id, self.state, expected
            )))
        }
    }

    fn enter(&mut self, state: KioskState, now: Instant) {
        self.state = state;
        self.last_activity = now;
        self.success_since = (state == KioskState::SuccessDisplay).then_some(now);
    }

    fn clear(&mut self) {
        self.customer = None;
        self.pending = None;
        self.message = None;
    }

    /// Register user activity without changing state.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    // ─── Transitions ───────────────────────────────────────────────────────

    /// Welcome screen tapped.
    pub fn start(&mut self, now: Instant) -> RewardsResult<()> {
        self.require(KioskState::Idle)?;
        self.clear();
        self.enter(KioskState::AwaitingPhone, now);
        Ok(())
    }

    /// Phone lookup finished. Known customers skip registration.
    pub fn phone_resolved(&mut self, resolved: ResolvedCustomer, now: Instant) -> RewardsResult<()> {
        self.require(KioskState::AwaitingPhone)?;
        match resolved {
            ResolvedCustomer::Existing(customer) => {
                self.customer = Some(customer);
                self.enter(KioskState::ActiveSession, now);
            }
            ResolvedCustomer::Pending(pending) => {
                self.pending = Some(pending);
                self.enter(KioskState::AwaitingRegistration, now);
            }
        }
        Ok(())
    }

    pub fn registered(&mut self, customer: Customer, now: Instant) -> RewardsResult<()> {
        self.require(KioskState::AwaitingRegistration)?;
        self.pending = None;
        self.customer = Some(customer);
        self.enter(KioskState::ActiveSession, now);
        Ok(())
    }

    /// Points awarded or reward redeemed: show the result and start the
    /// countdown back to the welcome screen.
    pub fn succeeded(&mut self, customer: Customer, message: String, now: Instant) -> RewardsResult<()> {
        self.require(KioskState::ActiveSession)?;
        self.customer = Some(customer);
        self.message = Some(message);
        self.enter(KioskState::SuccessDisplay, now);
        Ok(())
    }

    /// "Done / Next customer" on the success screen.
    pub fn done(&mut self, now: Instant) -> RewardsResult<()> {
        self.require(KioskState::SuccessDisplay)?;
        self.reset(now);
        Ok(())
    }

    /// Back to the welcome screen from any state.
    pub fn cancel(&mut self, now: Instant) {
        self.reset(now);
    }

    fn reset(&mut self, now: Instant) {
        self.clear();
        self.enter(KioskState::Idle, now);
    }

    // ─── Timers ────────────────────────────────────────────────────────────

    /// Apply any elapsed timers. Returns the transition taken, if any.
    pub fn tick(&mut self, now: Instant) -> Option<SessionEvent> {
        if self.state == KioskState::Idle {
            return None;
        }
        if let Some(since) = self.success_since {
            if now.saturating_duration_since(since) >= self.timings.success_display {
                self.reset(now);
                return Some(SessionEvent::CountdownElapsed);
            }
        }
        if now.saturating_duration_since(self.last_activity) >= self.timings.idle_timeout {
            self.reset(now);
            return Some(SessionEvent::TimedOut);
        }
        None
    }

    /// Idle and untouched for at least the retention window.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.state == KioskState::Idle
            && now.saturating_duration_since(self.last_activity) >= self.timings.retention
    }

    /// Whole seconds left on the success screen countdown.
    pub fn countdown_secs(&self, now: Instant) -> Option<u64> {
        let since = self.success_since?;
        let left = self
            .timings
            .success_display
            .saturating_sub(now.saturating_duration_since(since));
        // Round up so the screen never shows 0 while still visible.
        Some(left.as_secs() + u64::from(left.subsec_nanos() > 0))
    }
}
