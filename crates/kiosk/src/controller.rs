//! Kiosk controller: owns one session per kiosk id and drives the loyalty
//! engine on behalf of the tablet.

use crate::session::{KioskSession, KioskState, KioskTimings, SessionEvent};
use dashmap::DashMap;
use rewards_core::config::KioskConfig;
use rewards_core::error::{RewardsError, RewardsResult};
use rewards_core::types::{Customer, Reward};
use rewards_loyalty::{LoyaltyEngine, RegistrationForm};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_KIOSK_ID_LEN: usize = 64;

/// Everything the tablet needs to render its current screen.
#[derive(Debug, Clone, Serialize)]
pub struct KioskView {
    pub kiosk_id: String,
    pub state: KioskState,
    pub customer: Option<Customer>,
    /// Formatted phone awaiting registration.
    pub pending_phone: Option<String>,
    pub message: Option<String>,
    pub countdown_secs: Option<u64>,
    pub eligible_rewards: Vec<Reward>,
}

pub struct KioskController {
    engine: Arc<LoyaltyEngine>,
    sessions: DashMap<String, Arc<Mutex<KioskSession>>>,
    timings: KioskTimings,
}

impl KioskController {
    pub fn new(engine: Arc<LoyaltyEngine>, config: &KioskConfig) -> Self {
        let timings = KioskTimings::from(config);
        info!(
            idle_timeout_secs = timings.idle_timeout.as_secs(),
            success_display_secs = timings.success_display.as_secs(),
            "Kiosk controller initialized"
        );
        Self {
            engine,
            sessions: DashMap::new(),
            timings,
        }
    }

    pub fn engine(&self) -> &Arc<LoyaltyEngine> {
        &self.engine
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, kiosk_id: &str) -> RewardsResult<Arc<Mutex<KioskSession>>> {
        if kiosk_id.is_empty()
            || kiosk_id.len() > MAX_KIOSK_ID_LEN
            || !kiosk_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RewardsError::validation(format!(
                "Invalid kiosk id: {kiosk_id:?}"
            )));
        }
        let timings = self.timings;
        let session = self
            .sessions
            .entry(kiosk_id.to_string())
            .or_insert_with(|| {
                debug!(kiosk_id, "Kiosk session created");
                Arc::new(Mutex::new(KioskSession::new(kiosk_id, timings, Instant::now())))
            })
            .value()
            .clone();
        Ok(session)
    }

    /// Current customer in an active session.
    fn active_customer(session: &KioskSession) -> RewardsResult<Customer> {
        session.require(KioskState::ActiveSession)?;
        session
            .customer()
            .cloned()
            .ok_or_else(|| RewardsError::InvalidTransition("active session has no customer".into()))
    }

    /// Build the screen for `session`. The transition has already been
    /// committed, so a failed reward lookup shows an empty list instead of
    /// failing the request.
    async fn render(&self, session: &KioskSession) -> KioskView {
        let eligible_rewards = match (session.state(), session.customer()) {
            (KioskState::ActiveSession, Some(customer)) => {
                match self.engine.load_eligible_rewards(customer).await {
                    Ok(rewards) => rewards,
                    Err(e) => {
                        metrics::counter!("kiosk.reward_lookup_failures").increment(1);
                        warn!(kiosk_id = %session.kiosk_id(), error = %e, "Eligible rewards unavailable");
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };
        KioskView {
            kiosk_id: session.kiosk_id().to_string(),
            state: session.state(),
            customer: session.customer().cloned(),
            pending_phone: session.pending().map(|p| p.phone.display()),
            message: session.message().map(str::to_string),
            countdown_secs: session.countdown_secs(Instant::now()),
            eligible_rewards,
        }
    }

    // ─── Operations ────────────────────────────────────────────────────────

    pub async fn view(&self, kiosk_id: &str) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        session.tick(Instant::now());
        Ok(self.render(&session).await)
    }

    pub async fn start(&self, kiosk_id: &str) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        let now = Instant::now();
        session.tick(now);
        session.start(now)?;
        metrics::counter!("kiosk.sessions_started").increment(1);
        Ok(self.render(&session).await)
    }

    pub async fn submit_phone(&self, kiosk_id: &str, raw_phone: &str) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        session.tick(Instant::now());
        session.require(KioskState::AwaitingPhone)?;
        session.touch(Instant::now());

        let resolved = self.engine.resolve_phone(raw_phone).await?;
        debug!(kiosk_id, pending = resolved.is_pending(), "Phone resolved");
        session.phone_resolved(resolved, Instant::now())?;
        Ok(self.render(&session).await)
    }

    pub async fn register(&self, kiosk_id: &str, form: RegistrationForm) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        session.tick(Instant::now());
        session.require(KioskState::AwaitingRegistration)?;
        session.touch(Instant::now());

        let pending = session
            .pending()
            .cloned()
            .ok_or_else(|| RewardsError::InvalidTransition("no pending registration".into()))?;
        let customer = self.engine.register(&pending, form).await?;
        session.registered(customer, Instant::now())?;
        Ok(self.render(&session).await)
    }

    pub async fn skip_registration(&self, kiosk_id: &str) -> RewardsResult<KioskView> {
        self.register(kiosk_id, RegistrationForm::skipped()).await
    }

    pub async fn add_points(&self, kiosk_id: &str, amount: u32) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        session.tick(Instant::now());
        let customer = Self::active_customer(&session)?;
        session.touch(Instant::now());

        let outcome = self.engine.add_points(customer.id, amount).await?;
        if !outcome.visit_logged {
            warn!(kiosk_id, customer_id = %customer.id, "Points added without a visit record");
        }
        session.succeeded(outcome.customer, outcome.message, Instant::now())?;
        Ok(self.render(&session).await)
    }

    pub async fn redeem(
        &self,
        kiosk_id: &str,
        reward_id: Uuid,
        staff_pin: Option<&str>,
    ) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        session.tick(Instant::now());
        let customer = Self::active_customer(&session)?;
        session.touch(Instant::now());

        let reward = self.engine.backend().get_reward(reward_id).await?;
        let outcome = self.engine.redeem(&customer, &reward, staff_pin).await?;
        session.succeeded(outcome.customer, outcome.message, Instant::now())?;
        Ok(self.render(&session).await)
    }

    pub async fn reset_points(&self, kiosk_id: &str, confirmed: bool) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        session.tick(Instant::now());
        let customer = Self::active_customer(&session)?;
        session.touch(Instant::now());

        let customer = self.engine.reset_points(customer.id, confirmed).await?;
        session.succeeded(customer, "Points reset to 0.".to_string(), Instant::now())?;
        Ok(self.render(&session).await)
    }

    pub async fn done(&self, kiosk_id: &str) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        let now = Instant::now();
        // A countdown that already elapsed has done the same thing.
        if session.tick(now).is_none() {
            session.done(now)?;
        }
        Ok(self.render(&session).await)
    }

    pub async fn cancel(&self, kiosk_id: &str) -> RewardsResult<KioskView> {
        let session = self.session(kiosk_id)?;
        let mut session = session.lock().await;
        session.cancel(Instant::now());
        Ok(self.render(&session).await)
    }

    // ─── Timers ────────────────────────────────────────────────────────────

    /// Apply elapsed timers to every idle-able session, then drop sessions
    /// that have sat on the welcome screen past the retention window.
    /// Sessions busy with an in-flight request are skipped; they are active
    /// by definition.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut transitions = 0;
        let mut stale = Vec::new();
        for entry in self.sessions.iter() {
            let Ok(mut session) = entry.value().try_lock() else {
                continue;
            };
            if session.is_stale(now) {
                stale.push(entry.key().clone());
                continue;
            }
            match session.tick(now) {
                Some(SessionEvent::TimedOut) => {
                    metrics::counter!("kiosk.idle_timeouts").increment(1);
                    info!(kiosk_id = %entry.key(), "Kiosk session timed out");
                    transitions += 1;
                }
                Some(SessionEvent::CountdownElapsed) => {
                    debug!(kiosk_id = %entry.key(), "Success screen countdown elapsed");
                    transitions += 1;
                }
                None => {}
            }
        }
        self.evict(&stale, now);
        transitions
    }

    fn evict(&self, kiosk_ids: &[String], now: Instant) {
        let mut evicted = 0u64;
        for kiosk_id in kiosk_ids {
            // A handle held outside the map means a request is about to lock it.
            let removed = self.sessions.remove_if(kiosk_id, |_, session| {
                Arc::strong_count(session) == 1
                    && session.try_lock().is_ok_and(|s| s.is_stale(now))
            });
            if removed.is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            metrics::counter!("kiosk.sessions_evicted").increment(evicted);
            debug!(evicted, remaining = self.sessions.len(), "Stale kiosk sessions evicted");
        }
    }

    /// Tick every session on a fixed interval for the life of the process.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                controller.sweep(Instant::now());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewards_core::config::LoyaltyConfig;
    use rewards_core::types::NewReward;
    use rewards_core::{RewardsBackend, Table};
    use rewards_store::MemoryBackend;

    fn controller() -> (Arc<MemoryBackend>, KioskController) {
        let backend = Arc::new(MemoryBackend::new());
        let engine = Arc::new(LoyaltyEngine::new(backend.clone(), &LoyaltyConfig::default()));
        (backend, KioskController::new(engine, &KioskConfig::default()))
    }

    #[tokio::test]
    async fn test_new_customer_flow() {
        let (_, kiosk) = controller();
        kiosk.start("front").await.unwrap();

        let view = kiosk.submit_phone("front", "555-867-5309").await.unwrap();
        assert_eq!(view.state, KioskState::AwaitingRegistration);
        assert_eq!(view.pending_phone.as_deref(), Some("(555) 867-5309"));

        let view = kiosk.skip_registration("front").await.unwrap();
        assert_eq!(view.state, KioskState::ActiveSession);
        assert_eq!(view.customer.as_ref().unwrap().first_name, "Customer");

        let view = kiosk.add_points("front", 12).await.unwrap();
        assert_eq!(view.state, KioskState::SuccessDisplay);
        assert_eq!(view.message.as_deref(), Some("You earned 12 Points!"));
        assert_eq!(view.countdown_secs, Some(15));

        let view = kiosk.done("front").await.unwrap();
        assert_eq!(view.state, KioskState::Idle);
        assert!(view.customer.is_none());
    }

    #[tokio::test]
    async fn test_invalid_phone_keeps_awaiting_phone() {
        let (backend, kiosk) = controller();
        kiosk.start("front").await.unwrap();
        let calls = backend.call_count();

        let err = kiosk.submit_phone("front", "0000000000").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.call_count(), calls);
        assert_eq!(kiosk.view("front").await.unwrap().state, KioskState::AwaitingPhone);
    }

    #[tokio::test]
    async fn test_active_session_lists_eligible_rewards_and_redeems() {
        let (backend, kiosk) = controller();
        backend.seed_demo_data();
        kiosk.start("front").await.unwrap();

        // John Smith holds 450 points in the demo data.
        let view = kiosk.submit_phone("front", "5551112222").await.unwrap();
        assert_eq!(view.state, KioskState::ActiveSession);
        assert!(view.eligible_rewards.iter().all(|r| r.points_cost <= 450));
        assert!(view.eligible_rewards.iter().all(|r| r.is_active));
        assert_eq!(view.eligible_rewards.len(), 5);

        let coffee = view
            .eligible_rewards
            .iter()
            .find(|r| r.name == "Free Coffee")
            .unwrap()
            .id;
        let view = kiosk.redeem("front", coffee, None).await.unwrap();
        assert_eq!(view.state, KioskState::SuccessDisplay);
        assert_eq!(view.customer.unwrap().available_points, 350);
        assert_eq!(view.message.as_deref(), Some("Enjoy your Free Coffee!"));
    }

    #[tokio::test]
    async fn test_redeem_unaffordable_reward_rejected() {
        let (backend, kiosk) = controller();
        kiosk.start("front").await.unwrap();
        kiosk.submit_phone("front", "5558675309").await.unwrap();
        kiosk.skip_registration("front").await.unwrap();
        let pricey = backend
            .insert_reward(NewReward {
                name: "Mug".to_string(),
                description: String::new(),
                points_cost: 75,
                is_active: true,
                start_date: None,
                end_date: None,
                redemption_limit: None,
                requires_approval: false,
            })
            .await
            .unwrap();

        let err = kiosk.redeem("front", pricey.id, None).await.unwrap_err();
        assert!(err.is_validation());
        assert!(backend.list_redemptions(None).await.unwrap().is_empty());
        assert_eq!(kiosk.view("front").await.unwrap().state, KioskState::ActiveSession);
    }

    #[tokio::test]
    async fn test_sweep_times_out_idle_kiosk() {
        let (_, kiosk) = controller();
        kiosk.start("front").await.unwrap();
        kiosk.submit_phone("front", "5558675309").await.unwrap();
        kiosk.start("back").await.unwrap();

        assert_eq!(kiosk.sweep(Instant::now()), 0);
        assert_eq!(kiosk.sweep(Instant::now() + Duration::from_secs(31)), 2);

        let view = kiosk.view("front").await.unwrap();
        assert_eq!(view.state, KioskState::Idle);
        assert!(view.pending_phone.is_none());
    }

    #[tokio::test]
    async fn test_operations_in_wrong_state_rejected() {
        let (_, kiosk) = controller();
        assert!(matches!(
            kiosk.add_points("front", 10).await,
            Err(RewardsError::InvalidTransition(_))
        ));
        assert!(kiosk.submit_phone("front", "5558675309").await.is_err());
        assert!(kiosk.start("bad id!").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_sweep_evicts_abandoned_sessions() {
        let (_, kiosk) = controller();
        for i in 0..200 {
            kiosk.view(&format!("k{i}")).await.unwrap();
        }
        kiosk.start("front").await.unwrap();
        assert_eq!(kiosk.session_count(), 201);

        // Inside the retention window nothing goes.
        kiosk.sweep(Instant::now() + Duration::from_secs(10));
        assert_eq!(kiosk.session_count(), 201);

        // "front" times out on the first sweep and is retained from then on.
        let later = Instant::now() + Duration::from_secs(3600);
        kiosk.sweep(later);
        assert_eq!(kiosk.session_count(), 1);
        kiosk.sweep(later + Duration::from_secs(600));
        assert_eq!(kiosk.session_count(), 0);

        // A returning tablet simply gets a fresh welcome screen.
        let view = kiosk.view("k7").await.unwrap();
        assert_eq!(view.state, KioskState::Idle);
        assert_eq!(kiosk.session_count(), 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_session_with_outstanding_handle() {
        let (_, kiosk) = controller();
        kiosk.view("front").await.unwrap();
        let held = kiosk.session("front").unwrap();

        kiosk.sweep(Instant::now() + Duration::from_secs(3600));
        assert_eq!(kiosk.session_count(), 1);

        drop(held);
        kiosk.sweep(Instant::now() + Duration::from_secs(3600));
        assert_eq!(kiosk.session_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_points_shows_success_screen() {
        let (backend, kiosk) = controller();
        backend.seed_demo_data();
        kiosk.start("front").await.unwrap();
        kiosk.submit_phone("front", "5551112222").await.unwrap();

        let err = kiosk.reset_points("front", false).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(kiosk.view("front").await.unwrap().state, KioskState::ActiveSession);

        let view = kiosk.reset_points("front", true).await.unwrap();
        assert_eq!(view.state, KioskState::SuccessDisplay);
        assert_eq!(view.message.as_deref(), Some("Points reset to 0."));
        assert_eq!(view.countdown_secs, Some(15));
        assert_eq!(view.customer.unwrap().available_points, 0);
        assert!(view.eligible_rewards.is_empty());
    }

    #[tokio::test]
    async fn test_register_survives_reward_lookup_failure() {
        let (backend, kiosk) = controller();
        backend.seed_demo_data();
        kiosk.start("front").await.unwrap();
        kiosk.submit_phone("front", "5558675309").await.unwrap();
        backend.inject_fault(Table::Rewards, "connection reset");

        let view = kiosk.skip_registration("front").await.unwrap();
        assert_eq!(view.state, KioskState::ActiveSession);
        assert!(view.customer.is_some());
        assert!(view.eligible_rewards.is_empty());

        backend.clear_faults();
        let view = kiosk.add_points("front", 5).await.unwrap();
        assert_eq!(view.state, KioskState::SuccessDisplay);
    }

    #[tokio::test]
    async fn test_cancel_returns_to_idle() {
        let (_, kiosk) = controller();
        kiosk.start("front").await.unwrap();
        kiosk.submit_phone("front", "5558675309").await.unwrap();
        let view = kiosk.cancel("front").await.unwrap();
        assert_eq!(view.state, KioskState::Idle);
        assert_eq!(kiosk.session_count(), 1);
    }
}
