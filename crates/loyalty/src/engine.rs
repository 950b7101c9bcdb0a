//! Core loyalty engine: phone lookup and registration, point accrual,
//! point resets, and reward redemption.

use chrono::{DateTime, NaiveDate, Utc};
use rewards_core::config::LoyaltyConfig;
use rewards_core::error::{BackendError, RewardsError, RewardsResult};
use rewards_core::phone::PhoneNumber;
use rewards_core::types::*;
use rewards_core::RewardsBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// First name used when a customer skips the registration form.
pub const SKIPPED_REGISTRATION_NAME: &str = "Customer";

/// Registration form submitted from the kiosk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default = "default_sms_opt_in")]
    pub sms_opt_in: bool,
    #[serde(default)]
    pub email_opt_in: bool,
}

fn default_sms_opt_in() -> bool {
    true
}

impl RegistrationForm {
    /// Minimal profile for a customer who skips the form.
    pub fn skipped() -> Self {
        Self {
            first_name: SKIPPED_REGISTRATION_NAME.to_string(),
            last_name: String::new(),
            email: None,
            birth_date: None,
            sms_opt_in: false,
            email_opt_in: false,
        }
    }

    fn validate(&self) -> RewardsResult<()> {
        if self.first_name.trim().is_empty() {
            return Err(RewardsError::validation("Please enter your first name"));
        }
        let email = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
        if let Some(email) = email {
            if !is_plausible_email(email) {
                return Err(RewardsError::validation("Please enter a valid email address"));
            }
        }
        if self.email_opt_in && email.is_none() {
            return Err(RewardsError::validation(
                "Email updates require an email address",
            ));
        }
        Ok(())
    }
}

/// `local@domain.tld` with no whitespace.
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Result of a kiosk check-in.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInOutcome {
    pub customer: Customer,
    pub points_added: u32,
    /// False when the points landed but the visit record did not.
    pub visit_logged: bool,
    pub message: String,
}

/// Result of a successful redemption.
#[derive(Debug, Clone, Serialize)]
pub struct RedeemOutcome {
    pub customer: Customer,
    pub redemption: Redemption,
    pub message: String,
}

/// Loyalty program engine. Holds no customer state of its own: every
/// mutation goes through the backend and the updated row is returned.
pub struct LoyaltyEngine {
    backend: Arc<dyn RewardsBackend>,
    config: LoyaltyConfig,
}

impl LoyaltyEngine {
    pub fn new(backend: Arc<dyn RewardsBackend>, config: &LoyaltyConfig) -> Self {
        info!(
            max_points = config.max_points_per_checkin,
            authoritative_redemption = config.server_authoritative_redemption,
            "Loyalty engine initialized"
        );
        Self {
            backend,
            config: config.clone(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn RewardsBackend> {
        &self.backend
    }

    pub fn config(&self) -> &LoyaltyConfig {
        &self.config
    }

    // ─── Identity ──────────────────────────────────────────────────────────

    /// Look a customer up by phone. Invalid input is rejected without
    /// touching the backend; a miss yields an unsaved pending profile.
    pub async fn resolve_phone(&self, raw: &str) -> RewardsResult<ResolvedCustomer> {
        let phone = PhoneNumber::parse(raw)?;
        match self.backend.find_customer_by_phone(&phone).await {
            Ok(Some(customer)) => {
                debug!(customer_id = %customer.id, "Phone matched existing customer");
                Ok(ResolvedCustomer::Existing(customer))
            }
            Ok(None) => {
                debug!(phone = %phone, "Phone not registered");
                Ok(ResolvedCustomer::Pending(PendingCustomer { phone }))
            }
            Err(e) => {
                error!(error = %e, "Customer lookup failed");
                Err(e.into())
            }
        }
    }

    /// Persist a pending profile. A phone that is already registered returns
    /// the existing customer instead of inserting a duplicate.
    pub async fn register(
        &self,
        pending: &PendingCustomer,
        form: RegistrationForm,
    ) -> RewardsResult<Customer> {
        form.validate()?;

        if let Some(existing) = self.backend.find_customer_by_phone(&pending.phone).await? {
            info!(customer_id = %existing.id, "Registration matched existing customer");
            return Ok(existing);
        }

        let email = form
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        let new = NewCustomer {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            phone: pending.phone.clone(),
            email,
            birth_date: form.birth_date,
            sms_opt_in: form.sms_opt_in,
            email_opt_in: form.email_opt_in,
        };

        match self.backend.insert_customer(new).await {
            Ok(customer) => {
                metrics::counter!("loyalty.registrations").increment(1);
                info!(customer_id = %customer.id, "Customer registered");
                Ok(customer)
            }
            // Lost a race with another kiosk registering the same phone.
            Err(BackendError::UniqueViolation { .. }) => self
                .backend
                .find_customer_by_phone(&pending.phone)
                .await?
                .ok_or_else(|| RewardsError::NotFound(format!("customer {}", pending.phone))),
            Err(e) => {
                error!(error = %e, "Error registering customer");
                Err(e.into())
            }
        }
    }

    // ─── Points ledger ─────────────────────────────────────────────────────

    /// Amounts the keypad accepts: whole numbers in `1..=max`.
    pub fn validate_points(&self, amount: u32) -> RewardsResult<()> {
        if amount == 0 || amount > self.config.max_points_per_checkin {
            return Err(RewardsError::validation(format!(
                "Points must be between 1 and {}",
                self.config.max_points_per_checkin
            )));
        }
        Ok(())
    }

    /// Award points for a visit and log the check-in.
    ///
    /// The balance update and the check-in insert are separate writes. If the
    /// insert fails the points stay applied and `visit_logged` is false.
    pub async fn add_points(&self, customer_id: Uuid, amount: u32) -> RewardsResult<CheckInOutcome> {
        self.validate_points(amount)?;

        let customer = self
            .backend
            .apply_points(customer_id, PointsUpdate::check_in(amount))
            .await
            .map_err(|e| {
                error!(customer_id = %customer_id, error = %e, "Error updating customer points");
                e
            })?;

        let visit_logged = match self
            .backend
            .insert_checkin(NewCheckIn {
                customer_id,
                points: amount,
            })
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(customer_id = %customer_id, error = %e, "Error inserting check-in");
                metrics::counter!("loyalty.checkin_log_failures").increment(1);
                false
            }
        };

        metrics::counter!("loyalty.checkins").increment(1);
        metrics::counter!("loyalty.points_issued").increment(amount as u64);
        info!(
            customer_id = %customer_id,
            points = amount,
            balance = customer.available_points,
            visit_logged,
            "Points added"
        );

        Ok(CheckInOutcome {
            customer,
            points_added: amount,
            visit_logged,
            message: format!(
                "You earned {} Point{}!",
                amount,
                if amount == 1 { "" } else { "s" }
            ),
        })
    }

    /// Zero the available balance. Lifetime points are untouched.
    pub async fn reset_points(&self, customer_id: Uuid, confirmed: bool) -> RewardsResult<Customer> {
        if !confirmed {
            return Err(RewardsError::validation(
                "Resetting points requires confirmation",
            ));
        }
        let patch = CustomerPatch {
            available_points: Some(0),
            ..Default::default()
        };
        let customer = self.backend.update_customer(customer_id, patch).await?;
        metrics::counter!("loyalty.point_resets").increment(1);
        warn!(customer_id = %customer_id, "Customer points reset to 0");
        Ok(customer)
    }

    /// Manual grant from the admin dashboard. Not a visit, so no check-in
    /// and no lifetime credit.
    pub async fn adjust_points(&self, customer_id: Uuid, amount: u32) -> RewardsResult<Customer> {
        self.validate_points(amount)?;
        let customer = self
            .backend
            .apply_points(customer_id, PointsUpdate::grant(amount))
            .await?;
        metrics::counter!("loyalty.points_granted").increment(amount as u64);
        info!(customer_id = %customer_id, points = amount, "Points granted");
        Ok(customer)
    }

    // ─── Redemption ────────────────────────────────────────────────────────

    /// Rewards the customer can redeem right now, cheapest first.
    pub fn eligible_rewards(customer: &Customer, rewards: &[Reward], now: DateTime<Utc>) -> Vec<Reward> {
        let mut eligible: Vec<Reward> = rewards
            .iter()
            .filter(|r| r.is_available(now) && r.points_cost <= customer.available_points)
            .cloned()
            .collect();
        eligible.sort_by(|a, b| a.points_cost.cmp(&b.points_cost).then_with(|| a.name.cmp(&b.name)));
        eligible
    }

    pub async fn load_eligible_rewards(&self, customer: &Customer) -> RewardsResult<Vec<Reward>> {
        let rewards = self.backend.list_rewards().await?;
        Ok(Self::eligible_rewards(customer, &rewards, Utc::now()))
    }

    /// Check the redemption precondition without touching the backend.
    pub fn check_redeemable(customer: &Customer, reward: &Reward, now: DateTime<Utc>) -> RewardsResult<()> {
        if !reward.is_active {
            return Err(RewardsError::validation(format!(
                "{} is not currently available",
                reward.name
            )));
        }
        if !reward.is_available(now) {
            return Err(RewardsError::validation(format!(
                "{} is outside its redemption window or limit",
                reward.name
            )));
        }
        if reward.points_cost > customer.available_points {
            return Err(RewardsError::validation(format!(
                "Insufficient points: need {}, have {}",
                reward.points_cost, customer.available_points
            )));
        }
        Ok(())
    }

    /// Exchange points for a reward.
    ///
    /// `customer` is the balance the kiosk is showing. Eligibility is checked
    /// against it before any backend call; the debit and the redemption
    /// record are then committed in one backend transaction.
    pub async fn redeem(
        &self,
        customer: &Customer,
        reward: &Reward,
        staff_pin: Option<&str>,
    ) -> RewardsResult<RedeemOutcome> {
        Self::check_redeemable(customer, reward, Utc::now())?;

        let business = self.backend.get_business().await?;
        if let Some(business) = business {
            if !business.settings.pin_accepted(staff_pin) {
                metrics::counter!("loyalty.redemption_pin_rejections").increment(1);
                return Err(RewardsError::Unauthorized(
                    "A valid staff PIN is required to redeem rewards".to_string(),
                ));
            }
        }

        let write = RedemptionWrite {
            customer_id: customer.id,
            reward_id: reward.id,
            points_cost: reward.points_cost,
            observed_balance: customer.available_points,
            authoritative: self.config.server_authoritative_redemption,
        };
        let (updated, redemption) = self.backend.redeem(write).await.map_err(|e| {
            error!(customer_id = %customer.id, reward_id = %reward.id, error = %e, "Redemption failed");
            e
        })?;

        metrics::counter!("loyalty.redemptions").increment(1);
        metrics::counter!("loyalty.points_redeemed").increment(reward.points_cost as u64);
        info!(
            customer_id = %customer.id,
            reward = %reward.name,
            cost = reward.points_cost,
            new_balance = updated.available_points,
            "Reward redeemed"
        );

        Ok(RedeemOutcome {
            customer: updated,
            redemption,
            message: format!("Enjoy your {}!", reward.name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewards_core::Table;
    use rewards_store::MemoryBackend;

    fn engine_with(backend: Arc<MemoryBackend>) -> LoyaltyEngine {
        LoyaltyEngine::new(backend, &LoyaltyConfig::default())
    }

    async fn registered(engine: &LoyaltyEngine, phone: &str) -> Customer {
        let pending = PendingCustomer {
            phone: PhoneNumber::parse(phone).unwrap(),
        };
        engine
            .register(&pending, RegistrationForm::skipped())
            .await
            .unwrap()
    }

    async fn reward(backend: &MemoryBackend, cost: u32, active: bool) -> Reward {
        backend
            .insert_reward(NewReward {
                name: format!("Reward {cost}"),
                description: String::new(),
                points_cost: cost,
                is_active: active,
                start_date: None,
                end_date: None,
                redemption_limit: None,
                requires_approval: false,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_phone_makes_no_backend_call() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());

        let err = engine.resolve_phone("0000000000").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_miss_returns_pending_profile() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend);

        let resolved = engine.resolve_phone("(555) 867-5309").await.unwrap();
        assert!(resolved.is_pending());
        assert_eq!(resolved.phone().as_str(), "5558675309");
    }

    #[tokio::test]
    async fn test_register_then_resolve_existing() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend);
        let customer = registered(&engine, "5558675309").await;
        assert_eq!(customer.first_name, SKIPPED_REGISTRATION_NAME);
        assert!(!customer.sms_opt_in);

        match engine.resolve_phone("555-867-5309").await.unwrap() {
            ResolvedCustomer::Existing(found) => assert_eq!(found.id, customer.id),
            other => panic!("expected existing customer, got {other:?}"),
        }

        // Registering the same phone again returns the same row.
        let again = registered(&engine, "5558675309").await;
        assert_eq!(again.id, customer.id);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let pending = PendingCustomer {
            phone: PhoneNumber::parse("5558675309").unwrap(),
        };

        let mut form = RegistrationForm::skipped();
        form.first_name = "   ".to_string();
        assert!(engine.register(&pending, form).await.unwrap_err().is_validation());

        let mut form = RegistrationForm::skipped();
        form.email_opt_in = true;
        assert!(engine.register(&pending, form).await.unwrap_err().is_validation());

        let mut form = RegistrationForm::skipped();
        form.email = Some("not-an-email".to_string());
        assert!(engine.register(&pending, form).await.unwrap_err().is_validation());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_add_points_increments_exactly() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;

        for n in [1u32, 42, 999] {
            let before = backend.get_customer(customer.id).await.unwrap();
            let outcome = engine.add_points(customer.id, n).await.unwrap();
            assert_eq!(outcome.customer.available_points, before.available_points + n);
            assert_eq!(outcome.customer.lifetime_points, before.lifetime_points + n as u64);
            assert_eq!(outcome.customer.visit_count, before.visit_count + 1);
            assert!(outcome.visit_logged);
        }
        assert_eq!(backend.list_checkins(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_add_points_rejects_out_of_range() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;

        assert!(engine.add_points(customer.id, 0).await.unwrap_err().is_validation());
        assert!(engine.add_points(customer.id, 1000).await.unwrap_err().is_validation());
        assert_eq!(backend.get_customer(customer.id).await.unwrap().available_points, 0);
    }

    #[tokio::test]
    async fn test_checkin_log_failure_keeps_points() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;

        backend.inject_fault(Table::Checkins, "timeout");
        let outcome = engine.add_points(customer.id, 25).await.unwrap();
        assert!(!outcome.visit_logged);
        assert_eq!(outcome.customer.available_points, 25);
        assert_eq!(backend.get_customer(customer.id).await.unwrap().available_points, 25);
        assert!(backend.list_checkins(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_points_skips_visit() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;

        let adjusted = engine.adjust_points(customer.id, 40).await.unwrap();
        assert_eq!(adjusted.available_points, 40);
        assert_eq!(adjusted.lifetime_points, 0);
        assert_eq!(adjusted.visit_count, 0);
        assert!(backend.list_checkins(None).await.unwrap().is_empty());
        assert!(engine.adjust_points(customer.id, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_requires_confirmation() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;
        engine.add_points(customer.id, 300).await.unwrap();

        assert!(engine.reset_points(customer.id, false).await.is_err());
        let reset = engine.reset_points(customer.id, true).await.unwrap();
        assert_eq!(reset.available_points, 0);
        assert_eq!(reset.lifetime_points, 300);
    }

    #[tokio::test]
    async fn test_redeem_insufficient_rejected_before_write() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;
        let customer = engine.add_points(customer.id, 50).await.unwrap().customer;
        let reward = reward(&backend, 75, true).await;

        let calls = backend.call_count();
        let err = engine.redeem(&customer, &reward, None).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.call_count(), calls);
        assert!(backend.list_redemptions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redeem_inactive_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;
        let customer = engine.add_points(customer.id, 500).await.unwrap().customer;
        let reward = reward(&backend, 100, false).await;

        assert!(engine.redeem(&customer, &reward, None).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_redeem_deducts_exact_cost() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;
        let customer = engine.add_points(customer.id, 180).await.unwrap().customer;
        let reward = reward(&backend, 100, true).await;

        let outcome = engine.redeem(&customer, &reward, None).await.unwrap();
        assert_eq!(outcome.customer.available_points, 80);
        assert_eq!(outcome.customer.lifetime_points, 180);
        assert_eq!(outcome.redemption.points_used, 100);
        assert_eq!(outcome.message, "Enjoy your Reward 100!");
    }

    #[tokio::test]
    async fn test_redeem_requires_staff_pin_when_enabled() {
        let backend = Arc::new(MemoryBackend::new());
        let mut business = Business::default();
        business.settings.require_staff_pin_for_redemption = true;
        business.settings.set_staff_pin("2468");
        backend.upsert_business(business).await.unwrap();

        let engine = engine_with(backend.clone());
        let customer = registered(&engine, "5558675309").await;
        let customer = engine.add_points(customer.id, 200).await.unwrap().customer;
        let reward = reward(&backend, 100, true).await;

        let err = engine.redeem(&customer, &reward, Some("1111")).await.unwrap_err();
        assert!(matches!(err, RewardsError::Unauthorized(_)));
        assert!(engine.redeem(&customer, &reward, Some("2468")).await.is_ok());
    }

    #[test]
    fn test_eligible_rewards_filters_and_sorts() {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: String::new(),
            phone: PhoneNumber::parse("5558675309").unwrap(),
            email: None,
            birth_date: None,
            available_points: 120,
            lifetime_points: 120,
            visit_count: 1,
            sms_opt_in: false,
            email_opt_in: false,
            last_visit_at: None,
            created_at: now,
            updated_at: now,
        };
        let make = |name: &str, cost: u32, active: bool| Reward {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            points_cost: cost,
            is_active: active,
            start_date: None,
            end_date: None,
            redemption_limit: None,
            current_redemptions: 0,
            requires_approval: false,
            created_at: now,
            updated_at: now,
        };
        let rewards = vec![
            make("Coffee", 100, true),
            make("Pastry", 75, true),
            make("Tasting", 300, true),
            make("Retired", 10, false),
        ];

        let eligible = LoyaltyEngine::eligible_rewards(&customer, &rewards, now);
        let names: Vec<&str> = eligible.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Pastry", "Coffee"]);
    }

    #[test]
    fn test_plausible_email() {
        assert!(is_plausible_email("ada@example.com"));
        assert!(!is_plausible_email("ada@example"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ada @example.com"));
    }
}
