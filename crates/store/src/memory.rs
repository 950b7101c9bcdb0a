//! In-memory rewards backend backed by DashMap.
//!
//! Production: replace with a hosted relational store exposing the same
//! tables. This provides the same API surface for development and testing.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use rewards_core::backend::{RewardsBackend, Table};
use rewards_core::error::{BackendError, BackendResult};
use rewards_core::phone::PhoneNumber;
use rewards_core::types::*;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Thread-safe in-memory tables. Row writes hold the row's shard lock, so
/// counter updates and the redemption transaction are atomic per customer.
pub struct MemoryBackend {
    customers: DashMap<Uuid, Customer>,
    /// phone -> customer id; the unique constraint on `customers.phone`.
    phone_index: DashMap<PhoneNumber, Uuid>,
    rewards: DashMap<Uuid, Reward>,
    redemptions: DashMap<Uuid, Redemption>,
    checkins: DashMap<Uuid, CheckIn>,
    business: RwLock<Option<Business>>,
    /// Tables whose writes currently fail, for exercising error paths.
    faults: DashMap<Table, String>,
    calls: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        info!("Rewards backend initialized (in-memory, development mode)");
        Self {
            customers: DashMap::new(),
            phone_index: DashMap::new(),
            rewards: DashMap::new(),
            redemptions: DashMap::new(),
            checkins: DashMap::new(),
            business: RwLock::new(None),
            faults: DashMap::new(),
            calls: AtomicU64::new(0),
        }
    }

    /// Make every subsequent write to `table` fail with `Unavailable`.
    /// Reward listings honor it too.
    pub fn inject_fault(&self, table: Table, reason: impl Into<String>) {
        self.faults.insert(table, reason.into());
    }

    pub fn clear_faults(&self) {
        self.faults.clear();
    }

    /// Number of backend operations served so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn touch(&self, table: Table, op: &'static str) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("backend.calls", "table" => table.as_str(), "op" => op).increment(1);
        debug!(table = %table, op, "Backend call");
    }

    fn check_fault(&self, table: Table) -> BackendResult<()> {
        match self.faults.get(&table) {
            Some(reason) => {
                warn!(table = %table, reason = %reason.value(), "Injected backend fault");
                Err(BackendError::Unavailable {
                    table,
                    reason: reason.value().clone(),
                })
            }
            None => Ok(()),
        }
    }

    fn sorted<T: Clone, K: Ord>(rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
        let mut rows = rows;
        rows.sort_by_key(|r| key(r));
        rows
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RewardsBackend for MemoryBackend {
    // ─── Customers ─────────────────────────────────────────────────────────

    async fn find_customer_by_phone(&self, phone: &PhoneNumber) -> BackendResult<Option<Customer>> {
        self.touch(Table::Customers, "select");
        let Some(id) = self.phone_index.get(phone).map(|r| *r.value()) else {
            return Ok(None);
        };
        Ok(self.customers.get(&id).map(|r| r.value().clone()))
    }

    async fn get_customer(&self, id: Uuid) -> BackendResult<Customer> {
        self.touch(Table::Customers, "select");
        self.customers
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| BackendError::not_found(Table::Customers, id))
    }

    async fn list_customers(&self) -> BackendResult<Vec<Customer>> {
        self.touch(Table::Customers, "select");
        let rows = self.customers.iter().map(|r| r.value().clone()).collect();
        Ok(Self::sorted(rows, |c: &Customer| std::cmp::Reverse(c.created_at)))
    }

    async fn insert_customer(&self, new: NewCustomer) -> BackendResult<Customer> {
        self.touch(Table::Customers, "insert");
        self.check_fault(Table::Customers)?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            email: new.email,
            birth_date: new.birth_date,
            available_points: 0,
            lifetime_points: 0,
            visit_count: 0,
            sms_opt_in: new.sms_opt_in,
            email_opt_in: new.email_opt_in,
            last_visit_at: None,
            created_at: now,
            updated_at: now,
        };

        // Claim the phone first so two concurrent inserts cannot both succeed.
        match self.phone_index.entry(customer.phone.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(BackendError::UniqueViolation {
                    table: Table::Customers,
                    column: "phone",
                })
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(customer.id);
            }
        }
        self.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(&self, id: Uuid, patch: CustomerPatch) -> BackendResult<Customer> {
        self.touch(Table::Customers, "update");
        self.check_fault(Table::Customers)?;

        let mut entry = self
            .customers
            .get_mut(&id)
            .ok_or_else(|| BackendError::not_found(Table::Customers, id))?;
        let c = entry.value_mut();

        if let Some(phone) = patch.phone {
            if phone != c.phone {
                match self.phone_index.entry(phone.clone()) {
                    dashmap::mapref::entry::Entry::Occupied(_) => {
                        return Err(BackendError::UniqueViolation {
                            table: Table::Customers,
                            column: "phone",
                        })
                    }
                    dashmap::mapref::entry::Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
                self.phone_index.remove(&c.phone);
                c.phone = phone;
            }
        }
        if let Some(first) = patch.first_name { c.first_name = first; }
        if let Some(last) = patch.last_name { c.last_name = last; }
        if let Some(email) = patch.email { c.email = email; }
        if let Some(birth) = patch.birth_date { c.birth_date = birth; }
        if let Some(sms) = patch.sms_opt_in { c.sms_opt_in = sms; }
        if let Some(opt) = patch.email_opt_in { c.email_opt_in = opt; }
        if let Some(points) = patch.available_points { c.available_points = points; }
        c.updated_at = Utc::now();
        Ok(c.clone())
    }

    async fn apply_points(&self, id: Uuid, update: PointsUpdate) -> BackendResult<Customer> {
        self.touch(Table::Customers, "update");
        self.check_fault(Table::Customers)?;

        let mut entry = self
            .customers
            .get_mut(&id)
            .ok_or_else(|| BackendError::not_found(Table::Customers, id))?;
        let c = entry.value_mut();

        let available = c.available_points as i64 + update.available_delta;
        if available < 0 {
            return Err(BackendError::Conflict {
                table: Table::Customers,
                reason: format!(
                    "available points would become {} (balance {}, delta {})",
                    available, c.available_points, update.available_delta
                ),
            });
        }
        let now = Utc::now();
        c.available_points = u32::try_from(available).unwrap_or(u32::MAX);
        c.lifetime_points += update.lifetime_delta;
        if update.record_visit {
            c.visit_count += 1;
            c.last_visit_at = Some(now);
        }
        c.updated_at = now;
        Ok(c.clone())
    }

    // ─── Rewards ───────────────────────────────────────────────────────────

    async fn list_rewards(&self) -> BackendResult<Vec<Reward>> {
        self.touch(Table::Rewards, "select");
        self.check_fault(Table::Rewards)?;
        let rows = self.rewards.iter().map(|r| r.value().clone()).collect();
        Ok(Self::sorted(rows, |r: &Reward| r.created_at))
    }

    async fn get_reward(&self, id: Uuid) -> BackendResult<Reward> {
        self.touch(Table::Rewards, "select");
        self.rewards
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| BackendError::not_found(Table::Rewards, id))
    }

    async fn insert_reward(&self, new: NewReward) -> BackendResult<Reward> {
        self.touch(Table::Rewards, "insert");
        self.check_fault(Table::Rewards)?;

        let now = Utc::now();
        let reward = Reward {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            points_cost: new.points_cost,
            is_active: new.is_active,
            start_date: new.start_date,
            end_date: new.end_date,
            redemption_limit: new.redemption_limit,
            current_redemptions: 0,
            requires_approval: new.requires_approval,
            created_at: now,
            updated_at: now,
        };
        self.rewards.insert(reward.id, reward.clone());
        Ok(reward)
    }

    async fn update_reward(&self, id: Uuid, patch: RewardPatch) -> BackendResult<Reward> {
        self.touch(Table::Rewards, "update");
        self.check_fault(Table::Rewards)?;

        let mut entry = self
            .rewards
            .get_mut(&id)
            .ok_or_else(|| BackendError::not_found(Table::Rewards, id))?;
        let r = entry.value_mut();
        if let Some(name) = patch.name { r.name = name; }
        if let Some(description) = patch.description { r.description = description; }
        if let Some(cost) = patch.points_cost { r.points_cost = cost; }
        if let Some(active) = patch.is_active { r.is_active = active; }
        if let Some(start) = patch.start_date { r.start_date = start; }
        if let Some(end) = patch.end_date { r.end_date = end; }
        if let Some(limit) = patch.redemption_limit { r.redemption_limit = limit; }
        if let Some(approval) = patch.requires_approval { r.requires_approval = approval; }
        r.updated_at = Utc::now();
        Ok(r.clone())
    }

    async fn delete_reward(&self, id: Uuid) -> BackendResult<()> {
        self.touch(Table::Rewards, "delete");
        self.check_fault(Table::Rewards)?;
        self.rewards
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| BackendError::not_found(Table::Rewards, id))
    }

    // ─── Ledger ────────────────────────────────────────────────────────────

    async fn redeem(&self, write: RedemptionWrite) -> BackendResult<(Customer, Redemption)> {
        self.touch(Table::Redemptions, "transaction");
        // Faults are checked before any lock is taken: the transaction either
        // starts clean or does nothing.
        self.check_fault(Table::Customers)?;
        self.check_fault(Table::Redemptions)?;

        // Lock order: reward row, then customer row.
        let mut reward = self
            .rewards
            .get_mut(&write.reward_id)
            .ok_or_else(|| BackendError::not_found(Table::Rewards, write.reward_id))?;
        let mut customer = self
            .customers
            .get_mut(&write.customer_id)
            .ok_or_else(|| BackendError::not_found(Table::Customers, write.customer_id))?;

        let basis = if write.authoritative {
            customer.available_points
        } else {
            write.observed_balance
        };
        let new_balance = basis.checked_sub(write.points_cost).ok_or_else(|| {
            BackendError::Conflict {
                table: Table::Customers,
                reason: format!(
                    "balance {} is below reward cost {}",
                    basis, write.points_cost
                ),
            }
        })?;

        let now = Utc::now();
        let redemption = Redemption {
            id: Uuid::new_v4(),
            customer_id: write.customer_id,
            reward_id: write.reward_id,
            points_used: write.points_cost,
            redeemed_at: now,
        };

        customer.available_points = new_balance;
        customer.updated_at = now;
        reward.current_redemptions += 1;
        self.redemptions.insert(redemption.id, redemption.clone());

        Ok((customer.value().clone(), redemption))
    }

    async fn list_redemptions(&self, range: Option<TimeRange>) -> BackendResult<Vec<Redemption>> {
        self.touch(Table::Redemptions, "select");
        let rows = self
            .redemptions
            .iter()
            .filter(|r| range.map_or(true, |range| range.contains(r.redeemed_at)))
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::sorted(rows, |r: &Redemption| r.redeemed_at))
    }

    async fn redemptions_for_reward(&self, reward_id: Uuid) -> BackendResult<Vec<Redemption>> {
        self.touch(Table::Redemptions, "select");
        let rows = self
            .redemptions
            .iter()
            .filter(|r| r.reward_id == reward_id)
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::sorted(rows, |r: &Redemption| r.redeemed_at))
    }

    async fn insert_checkin(&self, new: NewCheckIn) -> BackendResult<CheckIn> {
        self.touch(Table::Checkins, "insert");
        self.check_fault(Table::Checkins)?;

        let checkin = CheckIn {
            id: Uuid::new_v4(),
            customer_id: new.customer_id,
            points: new.points,
            created_at: Utc::now(),
        };
        self.checkins.insert(checkin.id, checkin.clone());
        Ok(checkin)
    }

    async fn list_checkins(&self, range: Option<TimeRange>) -> BackendResult<Vec<CheckIn>> {
        self.touch(Table::Checkins, "select");
        let rows = self
            .checkins
            .iter()
            .filter(|c| range.map_or(true, |range| range.contains(c.created_at)))
            .map(|c| c.value().clone())
            .collect();
        Ok(Self::sorted(rows, |c: &CheckIn| c.created_at))
    }

    // ─── Business ──────────────────────────────────────────────────────────

    async fn get_business(&self) -> BackendResult<Option<Business>> {
        self.touch(Table::Business, "select");
        Ok(self.business.read().clone())
    }

    async fn upsert_business(&self, business: Business) -> BackendResult<Business> {
        self.touch(Table::Business, "upsert");
        self.check_fault(Table::Business)?;
        let mut business = business;
        business.updated_at = Utc::now();
        *self.business.write() = Some(business.clone());
        Ok(business)
    }
}

impl MemoryBackend {
    /// Insert a fully formed customer row, bypassing the registration
    /// defaults. Used for seeding and fixtures.
    pub fn put_customer(&self, customer: Customer) -> BackendResult<()> {
        if self.phone_index.contains_key(&customer.phone) {
            return Err(BackendError::UniqueViolation {
                table: Table::Customers,
                column: "phone",
            });
        }
        self.phone_index.insert(customer.phone.clone(), customer.id);
        self.customers.insert(customer.id, customer);
        Ok(())
    }

    pub(crate) fn business_slot(&self) -> parking_lot::RwLockWriteGuard<'_, Option<Business>> {
        self.business.write()
    }

    pub fn put_reward(&self, reward: Reward) {
        self.rewards.insert(reward.id, reward);
    }

    pub fn put_checkin(&self, checkin: CheckIn) {
        self.checkins.insert(checkin.id, checkin);
    }

    pub fn put_redemption(&self, redemption: Redemption) {
        self.redemptions.insert(redemption.id, redemption);
    }
}
