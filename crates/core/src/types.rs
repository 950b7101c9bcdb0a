//! Rewards domain types shared by the kiosk and the admin dashboard.

use crate::phone::PhoneNumber;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ─── Customer ──────────────────────────────────────────────────────────────

/// A registered loyalty member, keyed by phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: Uuid,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: PhoneNumber,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub available_points: u32,
    pub lifetime_points: u64,
    pub visit_count: u32,
    pub sms_opt_in: bool,
    pub email_opt_in: bool,
    pub last_visit_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// Unsaved profile handed to the registration step when a phone lookup misses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingCustomer {
    pub phone: PhoneNumber,
}

/// Outcome of resolving a phone number at the kiosk.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "profile", rename_all = "snake_case")]
pub enum ResolvedCustomer {
    Existing(Customer),
    Pending(PendingCustomer),
}

impl ResolvedCustomer {
    pub fn phone(&self) -> &PhoneNumber {
        match self {
            ResolvedCustomer::Existing(c) => &c.phone,
            ResolvedCustomer::Pending(p) => &p.phone,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ResolvedCustomer::Pending(_))
    }
}

/// Insert payload for the `customers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: PhoneNumber,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub sms_opt_in: bool,
    #[serde(default)]
    pub email_opt_in: bool,
}

/// Serde helper for patch fields on nullable columns. A missing key stays
/// `None` (unchanged) and an explicit `null` becomes `Some(None)` (cleared).
pub mod nullable {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Partial update for the `customers` table. `None` leaves a column
/// unchanged; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<PhoneNumber>,
    #[serde(default, deserialize_with = "nullable::deserialize", skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<Option<NaiveDate>>,
    pub sms_opt_in: Option<bool>,
    pub email_opt_in: Option<bool>,
    pub available_points: Option<u32>,
}

/// Atomic counter update applied to a single customer row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointsUpdate {
    pub available_delta: i64,
    pub lifetime_delta: u64,
    /// Count this write as a visit: bumps `visit_count` and `last_visit_at`.
    pub record_visit: bool,
}

impl PointsUpdate {
    pub fn check_in(points: u32) -> Self {
        Self {
            available_delta: points as i64,
            lifetime_delta: points as u64,
            record_visit: true,
        }
    }

    pub fn grant(points: u32) -> Self {
        Self {
            available_delta: points as i64,
            lifetime_delta: 0,
            record_visit: false,
        }
    }
}

// ─── Rewards ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reward {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub points_cost: u32,
    pub is_active: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub redemption_limit: Option<u32>,
    #[serde(default)]
    pub current_redemptions: u32,
    #[serde(default)]
    pub requires_approval: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    /// Active, inside its schedule window and under its redemption limit.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        let today = now.date_naive();
        if self.start_date.is_some_and(|start| today < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| today > end) {
            return false;
        }
        self.redemption_limit
            .map_or(true, |limit| self.current_redemptions < limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReward {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub points_cost: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub redemption_limit: Option<u32>,
    #[serde(default)]
    pub requires_approval: bool,
}

fn default_true() -> bool {
    true
}

/// Partial update for the `rewards` table. Same conventions as
/// [`CustomerPatch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub points_cost: Option<u32>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "nullable::deserialize", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable::deserialize", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable::deserialize", skip_serializing_if = "Option::is_none")]
    pub redemption_limit: Option<Option<u32>>,
    pub requires_approval: Option<bool>,
}

// ─── Ledger records ────────────────────────────────────────────────────────

/// Append-only record of points exchanged for a reward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Redemption {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub reward_id: Uuid,
    pub points_used: u32,
    pub redeemed_at: DateTime<Utc>,
}

/// Everything the backend needs to commit a redemption in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionWrite {
    pub customer_id: Uuid,
    pub reward_id: Uuid,
    pub points_cost: u32,
    /// Balance the caller saw when it checked eligibility.
    pub observed_balance: u32,
    /// Re-check the stored balance instead of trusting `observed_balance`.
    pub authoritative: bool,
}

/// Append-only visit record written after points are awarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckIn {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub points: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCheckIn {
    pub customer_id: Uuid,
    pub points: u32,
}

/// Inclusive timestamp range for report queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

// ─── Business ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_secondary_color")]
    pub secondary_color: String,
    #[serde(default)]
    pub settings: BusinessSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_primary_color() -> String {
    "#4F46E5".to_string()
}

fn default_secondary_color() -> String {
    "#10B981".to_string()
}

impl Default for Business {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: "Rewards".to_string(),
            description: String::new(),
            contact_email: None,
            contact_phone: None,
            address: None,
            primary_color: default_primary_color(),
            secondary_color: default_secondary_color(),
            settings: BusinessSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessSettings {
    #[serde(default = "default_true")]
    pub enable_sms: bool,
    #[serde(default = "default_true")]
    pub enable_email: bool,
    #[serde(default)]
    pub welcome_message: String,
    #[serde(default)]
    pub require_staff_pin_for_redemption: bool,
    /// SHA-256 hex digest of the staff PIN. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub staff_pin_hash: Option<String>,
}

impl Default for BusinessSettings {
    fn default() -> Self {
        Self {
            enable_sms: true,
            enable_email: true,
            welcome_message: String::new(),
            require_staff_pin_for_redemption: false,
            staff_pin_hash: None,
        }
    }
}

impl BusinessSettings {
    pub fn set_staff_pin(&mut self, pin: &str) {
        self.staff_pin_hash = Some(hash_pin(pin));
    }

    /// True when no PIN is required or `pin` matches the stored digest.
    pub fn pin_accepted(&self, pin: Option<&str>) -> bool {
        if !self.require_staff_pin_for_redemption {
            return true;
        }
        match (&self.staff_pin_hash, pin) {
            (Some(hash), Some(pin)) => *hash == hash_pin(pin),
            _ => false,
        }
    }
}

pub fn hash_pin(pin: &str) -> String {
    hex::encode(Sha256::digest(pin.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reward() -> Reward {
        let now = Utc::now();
        Reward {
            id: Uuid::new_v4(),
            name: "Free Coffee".to_string(),
            description: String::new(),
            points_cost: 100,
            is_active: true,
            start_date: None,
            end_date: None,
            redemption_limit: None,
            current_redemptions: 0,
            requires_approval: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_reward_availability_window() {
        let now = Utc::now();
        let mut r = reward();
        assert!(r.is_available(now));

        r.start_date = Some((now + Duration::days(2)).date_naive());
        assert!(!r.is_available(now));

        r.start_date = None;
        r.end_date = Some((now - Duration::days(1)).date_naive());
        assert!(!r.is_available(now));
    }

    #[test]
    fn test_reward_limit_and_inactive() {
        let now = Utc::now();
        let mut r = reward();
        r.redemption_limit = Some(2);
        r.current_redemptions = 2;
        assert!(!r.is_available(now));

        let mut r = reward();
        r.is_active = false;
        assert!(!r.is_available(now));
    }

    #[test]
    fn test_staff_pin() {
        let mut settings = BusinessSettings::default();
        assert!(settings.pin_accepted(None));

        settings.require_staff_pin_for_redemption = true;
        assert!(!settings.pin_accepted(Some("1234")));

        settings.set_staff_pin("1234");
        assert!(settings.pin_accepted(Some("1234")));
        assert!(!settings.pin_accepted(Some("4321")));
        assert!(!settings.pin_accepted(None));

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("staff_pin_hash"));
    }
}
