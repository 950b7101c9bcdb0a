//! Data-access boundary consumed by the loyalty core and the admin dashboard.
//!
//! Every operation either returns data or a structured [`BackendError`]; none
//! of them retry. Writes return the row as stored so callers never need a
//! follow-up read to learn the new state.

use crate::error::BackendResult;
use crate::phone::PhoneNumber;
use crate::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Named tables behind the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Customers,
    Rewards,
    Redemptions,
    Checkins,
    Business,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Customers => "customers",
            Table::Rewards => "rewards",
            Table::Redemptions => "redemptions",
            Table::Checkins => "checkins",
            Table::Business => "business",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait RewardsBackend: Send + Sync {
    // ─── customers ─────────────────────────────────────────────────────────

    async fn find_customer_by_phone(&self, phone: &PhoneNumber) -> BackendResult<Option<Customer>>;

    async fn get_customer(&self, id: Uuid) -> BackendResult<Customer>;

    async fn list_customers(&self) -> BackendResult<Vec<Customer>>;

    /// Fails with `UniqueViolation` when the phone is already registered.
    async fn insert_customer(&self, customer: NewCustomer) -> BackendResult<Customer>;

    async fn update_customer(&self, id: Uuid, patch: CustomerPatch) -> BackendResult<Customer>;

    /// Apply counter deltas to one row atomically. Fails with `Conflict` if
    /// the available balance would drop below zero.
    async fn apply_points(&self, id: Uuid, update: PointsUpdate) -> BackendResult<Customer>;

    // ─── rewards ───────────────────────────────────────────────────────────

    async fn list_rewards(&self) -> BackendResult<Vec<Reward>>;

    async fn get_reward(&self, id: Uuid) -> BackendResult<Reward>;

    async fn insert_reward(&self, reward: NewReward) -> BackendResult<Reward>;

    async fn update_reward(&self, id: Uuid, patch: RewardPatch) -> BackendResult<Reward>;

    async fn delete_reward(&self, id: Uuid) -> BackendResult<()>;

    // ─── ledger ────────────────────────────────────────────────────────────

    /// Debit the customer and append the redemption as one transaction.
    /// Either both writes land or neither does.
    async fn redeem(&self, write: RedemptionWrite) -> BackendResult<(Customer, Redemption)>;

    async fn list_redemptions(&self, range: Option<TimeRange>) -> BackendResult<Vec<Redemption>>;

    async fn redemptions_for_reward(&self, reward_id: Uuid) -> BackendResult<Vec<Redemption>>;

    async fn insert_checkin(&self, checkin: NewCheckIn) -> BackendResult<CheckIn>;

    async fn list_checkins(&self, range: Option<TimeRange>) -> BackendResult<Vec<CheckIn>>;

    // ─── business ──────────────────────────────────────────────────────────

    /// `None` when no business row has been configured yet.
    async fn get_business(&self) -> BackendResult<Option<Business>>;

    async fn upsert_business(&self, business: Business) -> BackendResult<Business>;
}
