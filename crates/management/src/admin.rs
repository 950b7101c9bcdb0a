//! Customer database, reward catalog and business settings screens.

use crate::models::*;
use crate::store::ManagementStore;
use chrono::Utc;
use rewards_core::error::{RewardsError, RewardsResult};
use rewards_core::phone::PhoneNumber;
use rewards_core::types::*;
use rewards_core::RewardsBackend;
use rewards_loyalty::engine::is_plausible_email;
use rewards_loyalty::LoyaltyEngine;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const STAFF_PIN_DIGITS: usize = 4;

pub struct AdminService {
    store: Arc<ManagementStore>,
    engine: Arc<LoyaltyEngine>,
}

impl AdminService {
    pub fn new(store: Arc<ManagementStore>, engine: Arc<LoyaltyEngine>) -> Self {
        Self { store, engine }
    }

    fn backend(&self) -> &Arc<dyn RewardsBackend> {
        self.engine.backend()
    }

    // ─── Customers ─────────────────────────────────────────────────────────

    pub async fn list_customers(&self, query: &CustomerQuery) -> RewardsResult<Vec<Customer>> {
        let customers = self.backend().list_customers().await?;
        Ok(filter_customers(customers, query))
    }

    pub async fn get_customer(&self, id: Uuid) -> RewardsResult<Customer> {
        Ok(self.backend().get_customer(id).await?)
    }

    pub async fn create_customer(&self, req: CreateCustomerRequest, user: &str) -> RewardsResult<Customer> {
        if req.first_name.trim().is_empty() {
            return Err(RewardsError::validation("First name is required"));
        }
        let phone = PhoneNumber::parse(&req.phone)?;
        let email = validate_optional_email(req.email)?;
        if req.email_opt_in && email.is_none() {
            return Err(RewardsError::validation("Email updates require an email address"));
        }

        let new = NewCustomer {
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            phone,
            email,
            birth_date: req.birth_date,
            sms_opt_in: req.sms_opt_in,
            email_opt_in: req.email_opt_in,
        };
        let customer = self.backend().insert_customer(new).await?;
        self.store.log_audit(user, AuditAction::Create, "customer", &customer.id.to_string(), serde_json::json!({}));
        info!(customer_id = %customer.id, "Customer created from dashboard");
        Ok(customer)
    }

    pub async fn update_customer(&self, id: Uuid, req: UpdateCustomerRequest, user: &str) -> RewardsResult<Customer> {
        if req.first_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(RewardsError::validation("First name is required"));
        }
        let phone = req.phone.as_deref().map(PhoneNumber::parse).transpose()?;
        let email = match req.email {
            Some(email) => Some(validate_optional_email(email)?),
            None => None,
        };

        // Email updates need an address on the row as it will be saved.
        let current = self.backend().get_customer(id).await?;
        let has_email = match &email {
            Some(email) => email.is_some(),
            None => current.email.is_some(),
        };
        let email_opt_in = match req.email_opt_in {
            Some(true) if !has_email => {
                return Err(RewardsError::validation("Email updates require an email address"));
            }
            None if current.email_opt_in && !has_email => Some(false),
            other => other,
        };

        let patch = CustomerPatch {
            first_name: req.first_name.map(|n| n.trim().to_string()),
            last_name: req.last_name.map(|n| n.trim().to_string()),
            phone,
            email,
            birth_date: req.birth_date,
            sms_opt_in: req.sms_opt_in,
            email_opt_in,
            available_points: None,
        };
        let customer = self.backend().update_customer(id, patch).await?;
        self.store.log_audit(user, AuditAction::Update, "customer", &id.to_string(), serde_json::json!({}));
        Ok(customer)
    }

    pub async fn grant_points(&self, id: Uuid, points: u32, user: &str) -> RewardsResult<Customer> {
        let customer = self.engine.adjust_points(id, points).await?;
        self.store.log_audit(user, AuditAction::GrantPoints, "customer", &id.to_string(), serde_json::json!({"points": points}));
        Ok(customer)
    }

    // ─── Rewards ───────────────────────────────────────────────────────────

    pub async fn list_rewards(&self, query: &RewardQuery) -> RewardsResult<Vec<Reward>> {
        let rewards = self.backend().list_rewards().await?;
        Ok(filter_rewards(rewards, query))
    }

    pub async fn create_reward(&self, new: NewReward, user: &str) -> RewardsResult<Reward> {
        validate_reward(&new.name, new.points_cost, new.start_date, new.end_date)?;
        let new = NewReward {
            name: new.name.trim().to_string(),
            ..new
        };
        let reward = self.backend().insert_reward(new).await?;
        self.store.log_audit(user, AuditAction::Create, "reward", &reward.id.to_string(), serde_json::json!({"name": &reward.name}));
        metrics::counter!("management.rewards.created").increment(1);
        Ok(reward)
    }

    pub async fn update_reward(&self, id: Uuid, patch: RewardPatch, user: &str) -> RewardsResult<Reward> {
        let current = self.backend().get_reward(id).await?;
        validate_reward(
            patch.name.as_deref().unwrap_or(&current.name),
            patch.points_cost.unwrap_or(current.points_cost),
            patch.start_date.unwrap_or(current.start_date),
            patch.end_date.unwrap_or(current.end_date),
        )?;
        let reward = self.backend().update_reward(id, patch).await?;
        self.store.log_audit(user, AuditAction::Update, "reward", &id.to_string(), serde_json::json!({}));
        Ok(reward)
    }

    pub async fn toggle_reward(&self, id: Uuid, user: &str) -> RewardsResult<Reward> {
        let current = self.backend().get_reward(id).await?;
        let patch = RewardPatch {
            is_active: Some(!current.is_active),
            ..Default::default()
        };
        let reward = self.backend().update_reward(id, patch).await?;
        self.store.log_audit(user, AuditAction::Update, "reward", &id.to_string(), serde_json::json!({"is_active": reward.is_active}));
        info!(reward_id = %id, active = reward.is_active, "Reward toggled");
        Ok(reward)
    }

    /// Rewards with redemption history are kept for reporting.
    pub async fn delete_reward(&self, id: Uuid, user: &str) -> RewardsResult<()> {
        let redemptions = self.backend().redemptions_for_reward(id).await?;
        if !redemptions.is_empty() {
            return Err(RewardsError::InvalidTransition(format!(
                "This reward has been redeemed {} time(s) and cannot be deleted. Deactivate it instead.",
                redemptions.len()
            )));
        }
        self.backend().delete_reward(id).await?;
        self.store.log_audit(user, AuditAction::Delete, "reward", &id.to_string(), serde_json::json!({}));
        metrics::counter!("management.rewards.deleted").increment(1);
        Ok(())
    }

    // ─── Segments ──────────────────────────────────────────────────────────

    pub async fn list_segments(&self) -> RewardsResult<Vec<SegmentSummary>> {
        let customers = self.backend().list_customers().await?;
        let now = Utc::now();
        Ok(self
            .store
            .list_segments()
            .into_iter()
            .map(|segment| SegmentSummary {
                customer_count: segment.rule.count(&customers, now),
                segment,
            })
            .collect())
    }

    // ─── Business settings ─────────────────────────────────────────────────

    pub async fn get_settings(&self) -> RewardsResult<Business> {
        Ok(self.backend().get_business().await?.unwrap_or_default())
    }

    pub async fn update_settings(&self, req: SettingsRequest, user: &str) -> RewardsResult<Business> {
        if req.name.trim().is_empty() {
            return Err(RewardsError::validation("Business name is required"));
        }
        let contact_email = validate_optional_email(req.contact_email)?;
        if let Some(pin) = req.staff_pin.as_deref() {
            if pin.len() != STAFF_PIN_DIGITS || !pin.chars().all(|c| c.is_ascii_digit()) {
                return Err(RewardsError::validation("Staff PIN must be exactly 4 digits"));
            }
        }

        let mut business = self.backend().get_business().await?.unwrap_or_default();
        if req.require_staff_pin_for_redemption
            && req.staff_pin.is_none()
            && business.settings.staff_pin_hash.is_none()
        {
            return Err(RewardsError::validation(
                "A staff PIN is required when PIN protection is enabled",
            ));
        }

        business.name = req.name.trim().to_string();
        business.description = req.description;
        business.contact_email = contact_email;
        business.contact_phone = req.contact_phone;
        business.address = req.address;
        if let Some(color) = req.primary_color {
            business.primary_color = color;
        }
        if let Some(color) = req.secondary_color {
            business.secondary_color = color;
        }
        business.settings.enable_sms = req.enable_sms;
        business.settings.enable_email = req.enable_email;
        business.settings.welcome_message = req.welcome_message;
        business.settings.require_staff_pin_for_redemption = req.require_staff_pin_for_redemption;
        if let Some(pin) = req.staff_pin.as_deref() {
            business.settings.set_staff_pin(pin);
        }

        let business = self.backend().upsert_business(business).await?;
        self.store.log_audit(user, AuditAction::Update, "business", &business.id.to_string(), serde_json::json!({}));
        info!(business = %business.name, "Business settings saved");
        Ok(business)
    }
}

fn validate_optional_email(email: Option<String>) -> RewardsResult<Option<String>> {
    match email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        Some(email) if !is_plausible_email(&email) => {
            Err(RewardsError::validation("Please enter a valid email address"))
        }
        other => Ok(other),
    }
}

fn validate_reward(
    name: &str,
    points_cost: u32,
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
) -> RewardsResult<()> {
    if name.trim().is_empty() {
        return Err(RewardsError::validation("Reward name is required"));
    }
    if points_cost == 0 {
        return Err(RewardsError::validation("Points cost must be greater than zero"));
    }
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(RewardsError::validation("End date must be after the start date"));
        }
    }
    Ok(())
}

/// Search by name, phone or email, then sort. Missing visit dates sort first.
pub fn filter_customers(customers: Vec<Customer>, query: &CustomerQuery) -> Vec<Customer> {
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let digits = needle
        .as_deref()
        .map(rewards_core::phone::normalize_digits)
        .filter(|d| !d.is_empty());

    let mut customers: Vec<Customer> = customers
        .into_iter()
        .filter(|c| match &needle {
            None => true,
            Some(needle) => {
                c.full_name().to_lowercase().contains(needle.as_str())
                    || c.email.as_deref().is_some_and(|e| e.to_lowercase().contains(needle.as_str()))
                    || digits.as_deref().is_some_and(|d| c.phone.as_str().contains(d))
            }
        })
        .collect();

    // Names read A-Z by default; everything else newest/largest first.
    let order = query.order.unwrap_or(match query.sort {
        CustomerSortField::Name => SortOrder::Asc,
        _ => SortOrder::Desc,
    });
    customers.sort_by(|a, b| {
        let ord = match query.sort {
            CustomerSortField::LastVisit => a.last_visit_at.cmp(&b.last_visit_at),
            CustomerSortField::Created => a.created_at.cmp(&b.created_at),
            CustomerSortField::Name => a
                .full_name()
                .to_lowercase()
                .cmp(&b.full_name().to_lowercase()),
            CustomerSortField::Points => a.available_points.cmp(&b.available_points),
        };
        apply_order(ord, order)
    });
    customers
}

pub fn filter_rewards(rewards: Vec<Reward>, query: &RewardQuery) -> Vec<Reward> {
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut rewards: Vec<Reward> = rewards
        .into_iter()
        .filter(|r| query.active.map_or(true, |active| r.is_active == active))
        .filter(|r| {
            needle.as_deref().map_or(true, |n| {
                r.name.to_lowercase().contains(n) || r.description.to_lowercase().contains(n)
            })
        })
        .collect();
    rewards.sort_by(|a, b| {
        let ord = match query.sort {
            RewardSortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            RewardSortField::Cost => a.points_cost.cmp(&b.points_cost),
        };
        apply_order(ord, query.order)
    });
    rewards
}

fn apply_order(ord: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewards_core::config::LoyaltyConfig;
    use rewards_core::error::BackendError;
    use rewards_store::MemoryBackend;

    fn service() -> (Arc<MemoryBackend>, AdminService) {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_demo_data();
        let engine = Arc::new(LoyaltyEngine::new(backend.clone(), &LoyaltyConfig::default()));
        let store = Arc::new(ManagementStore::new());
        store.seed_demo_data();
        (backend, AdminService::new(store, engine))
    }

    #[tokio::test]
    async fn test_customer_search_and_sort() {
        let (_, admin) = service();
        let query = CustomerQuery {
            search: Some("(555) 111".to_string()),
            ..Default::default()
        };
        let found = admin.list_customers(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "John");

        let query = CustomerQuery {
            sort: CustomerSortField::Points,
            order: Some(SortOrder::Desc),
            ..Default::default()
        };
        let sorted = admin.list_customers(&query).await.unwrap();
        assert_eq!(sorted[0].first_name, "Michael");

        let query = CustomerQuery {
            search: Some("EMMA".to_string()),
            ..Default::default()
        };
        assert_eq!(admin.list_customers(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_customer_rejects_duplicate_phone() {
        let (_, admin) = service();
        let req = CreateCustomerRequest {
            first_name: "Jon".to_string(),
            last_name: String::new(),
            phone: "555-111-2222".to_string(),
            email: None,
            birth_date: None,
            sms_opt_in: true,
            email_opt_in: false,
        };
        let err = admin.create_customer(req, "admin").await.unwrap_err();
        assert!(matches!(
            err,
            RewardsError::Backend(BackendError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_customer_email_and_opt_in() {
        let (_, admin) = service();
        let req = CreateCustomerRequest {
            first_name: "Dana".to_string(),
            last_name: "Lee".to_string(),
            phone: "555-303-4040".to_string(),
            email: Some("dana@example.com".to_string()),
            birth_date: Some(chrono::NaiveDate::from_ymd_opt(1992, 4, 1).unwrap()),
            sms_opt_in: true,
            email_opt_in: true,
        };
        let dana = admin.create_customer(req, "admin").await.unwrap();

        // Opting in while removing the address is rejected outright.
        let req = UpdateCustomerRequest {
            email: Some(Some(String::new())),
            email_opt_in: Some(true),
            ..Default::default()
        };
        assert!(admin.update_customer(dana.id, req, "admin").await.unwrap_err().is_validation());

        // An empty email clears it and drops the stale opt-in with it.
        let req: UpdateCustomerRequest = serde_json::from_str(r#"{"email":"","birth_date":null}"#).unwrap();
        let updated = admin.update_customer(dana.id, req, "admin").await.unwrap();
        assert_eq!(updated.email, None);
        assert_eq!(updated.birth_date, None);
        assert!(!updated.email_opt_in);
        assert!(updated.sms_opt_in);

        // Opting back in is checked against the saved row.
        let req = UpdateCustomerRequest {
            email_opt_in: Some(true),
            ..Default::default()
        };
        assert!(admin.update_customer(dana.id, req, "admin").await.unwrap_err().is_validation());

        let req = UpdateCustomerRequest {
            email: Some(Some(" dana@lee.example ".to_string())),
            email_opt_in: Some(true),
            ..Default::default()
        };
        let updated = admin.update_customer(dana.id, req, "admin").await.unwrap();
        assert_eq!(updated.email.as_deref(), Some("dana@lee.example"));
        assert!(updated.email_opt_in);
    }

    #[tokio::test]
    async fn test_update_reward_clears_window_and_limit() {
        let (backend, admin) = service();
        let today = Utc::now().date_naive();
        let reward = admin
            .create_reward(
                NewReward {
                    name: "Summer Special".to_string(),
                    description: String::new(),
                    points_cost: 125,
                    is_active: true,
                    start_date: Some(today - chrono::Duration::days(30)),
                    end_date: Some(today - chrono::Duration::days(1)),
                    redemption_limit: Some(50),
                    requires_approval: false,
                },
                "admin",
            )
            .await
            .unwrap();
        assert!(!reward.is_available(Utc::now()));

        // Moving the end before the stored start is still rejected.
        let patch = RewardPatch {
            end_date: Some(Some(today - chrono::Duration::days(60))),
            ..Default::default()
        };
        assert!(admin.update_reward(reward.id, patch, "admin").await.unwrap_err().is_validation());

        let patch: RewardPatch =
            serde_json::from_str(r#"{"end_date":null,"redemption_limit":null}"#).unwrap();
        let updated = admin.update_reward(reward.id, patch, "admin").await.unwrap();
        assert_eq!(updated.end_date, None);
        assert_eq!(updated.redemption_limit, None);
        assert_eq!(updated.start_date, reward.start_date);
        assert!(updated.is_available(Utc::now()));
        assert!(backend.get_reward(reward.id).await.unwrap().is_available(Utc::now()));
    }

    #[tokio::test]
    async fn test_grant_points() {
        let (backend, admin) = service();
        let john = backend
            .find_customer_by_phone(&PhoneNumber::parse("5551112222").unwrap())
            .await
            .unwrap()
            .unwrap();
        let updated = admin.grant_points(john.id, 50, "admin").await.unwrap();
        assert_eq!(updated.available_points, john.available_points + 50);
        assert_eq!(updated.lifetime_points, john.lifetime_points);
    }

    #[tokio::test]
    async fn test_reward_filters() {
        let (_, admin) = service();
        let query = RewardQuery {
            active: Some(true),
            sort: RewardSortField::Cost,
            ..Default::default()
        };
        let rewards = admin.list_rewards(&query).await.unwrap();
        assert_eq!(rewards.len(), 5);
        assert_eq!(rewards[0].name, "50% Off Pastry");

        let query = RewardQuery {
            search: Some("tasting".to_string()),
            ..Default::default()
        };
        let rewards = admin.list_rewards(&query).await.unwrap();
        assert_eq!(rewards.len(), 1);
        assert!(!rewards[0].is_active);
    }

    #[tokio::test]
    async fn test_toggle_and_delete_reward() {
        let (backend, admin) = service();
        let reward = admin
            .create_reward(
                NewReward {
                    name: " Sticker ".to_string(),
                    description: String::new(),
                    points_cost: 10,
                    is_active: true,
                    start_date: None,
                    end_date: None,
                    redemption_limit: None,
                    requires_approval: false,
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(reward.name, "Sticker");

        let toggled = admin.toggle_reward(reward.id, "admin").await.unwrap();
        assert!(!toggled.is_active);

        backend.put_redemption(Redemption {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            reward_id: reward.id,
            points_used: 10,
            redeemed_at: Utc::now(),
        });
        let err = admin.delete_reward(reward.id, "admin").await.unwrap_err();
        assert!(matches!(err, RewardsError::InvalidTransition(_)));
        assert!(backend.get_reward(reward.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_reward_validation() {
        let (_, admin) = service();
        let new = NewReward {
            name: "Free Muffin".to_string(),
            description: String::new(),
            points_cost: 0,
            is_active: true,
            start_date: None,
            end_date: None,
            redemption_limit: None,
            requires_approval: false,
        };
        assert!(admin.create_reward(new, "admin").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_segment_counts_are_live() {
        let (_, admin) = service();
        let segments = admin.list_segments().await.unwrap();
        let count = |name: &str| {
            segments
                .iter()
                .find(|s| s.segment.name == name)
                .unwrap()
                .customer_count
        };
        assert_eq!(count("All Customers"), 6);
        assert_eq!(count("High Value"), 3);
        // Sarah, last seen 45 days ago.
        assert_eq!(count("At Risk"), 1);
    }

    fn settings(require_pin: bool, pin: Option<&str>) -> SettingsRequest {
        SettingsRequest {
            name: "Coffee & Co.".to_string(),
            description: String::new(),
            contact_email: Some("owner@coffee.example".to_string()),
            contact_phone: None,
            address: None,
            primary_color: None,
            secondary_color: None,
            enable_sms: true,
            enable_email: false,
            welcome_message: "Welcome!".to_string(),
            require_staff_pin_for_redemption: require_pin,
            staff_pin: pin.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_settings_validation() {
        let (_, admin) = service();

        let mut req = settings(false, None);
        req.name = " ".to_string();
        assert!(admin.update_settings(req, "admin").await.unwrap_err().is_validation());

        let mut req = settings(false, None);
        req.contact_email = Some("nope".to_string());
        assert!(admin.update_settings(req, "admin").await.unwrap_err().is_validation());

        assert!(admin
            .update_settings(settings(true, None), "admin")
            .await
            .unwrap_err()
            .is_validation());
        assert!(admin
            .update_settings(settings(true, Some("12a4")), "admin")
            .await
            .unwrap_err()
            .is_validation());

        let saved = admin.update_settings(settings(true, Some("2468")), "admin").await.unwrap();
        assert!(saved.settings.pin_accepted(Some("2468")));
        assert_eq!(saved.settings.welcome_message, "Welcome!");

        // The stored PIN survives a save that omits it.
        let saved = admin.update_settings(settings(true, None), "admin").await.unwrap();
        assert!(saved.settings.pin_accepted(Some("2468")));
    }
}
