//! Management domain types: campaigns, segments, reports and the audit log.

use chrono::{DateTime, NaiveDate, Utc};
use rewards_core::types::{nullable, Customer, Reward};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Campaign ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub channel: CampaignChannel,
    pub segment_id: Uuid,
    pub message_template: String,
    #[serde(default)]
    pub reward_id: Option<Uuid>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    pub recipient_count: u64,
    #[serde(default)]
    pub stats: CampaignStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Cancelled,
    /// Always-on campaign. No manual action applies to it.
    Active,
}

impl CampaignStatus {
    /// States that never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Cancelled | CampaignStatus::Active
        )
    }

    pub fn is_editable(self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Scheduled)
    }

    pub fn is_deletable(self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignChannel {
    #[default]
    Sms,
    Email,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignStats {
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
}

/// An action that moves a campaign between states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignAction {
    /// Draft -> Scheduled
    Schedule,
    /// Scheduled -> Draft, when the send time is cleared or moved into the past
    Unschedule,
    /// Draft | Scheduled -> Sending
    Send,
    /// Sending -> Completed
    Complete,
    /// Scheduled -> Cancelled
    Cancel,
}

/// A recorded transition in a campaign's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignTransition {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub from_status: CampaignStatus,
    pub to_status: CampaignStatus,
    pub action: CampaignAction,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

// ─── Segment ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rule: SegmentRule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentRule {
    AllActive,
    MinPoints { points: u32 },
    RegisteredWithinDays { days: i64 },
    LastVisitOlderThanDays { days: i64 },
    BirthdayThisMonth,
}

/// Segment with its live membership count.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    #[serde(flatten)]
    pub segment: Segment,
    pub customer_count: u64,
}

// ─── Reports ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportPeriod {
    #[serde(rename = "last7")]
    Last7Days,
    #[default]
    #[serde(rename = "last30")]
    Last30Days,
    #[serde(rename = "last90")]
    Last90Days,
    #[serde(rename = "lastYear")]
    LastYear,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub period: ReportPeriod,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_visits: u64,
    pub daily_visits: Vec<DailyCount>,
    /// Points awarded by check-ins on each day.
    pub daily_points: Vec<DailyCount>,
    /// Sum of every customer's lifetime points.
    pub points_issued: u64,
    pub new_customers: u64,
    /// Customers with at least two check-ins inside the period.
    pub returning_customers: u64,
    pub total_redemptions: u64,
    pub most_popular_reward: Option<String>,
    pub top_rewards: Vec<Reward>,
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Transition,
    GrantPoints,
    Login,
}

// ─── API Request/Response types ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel: CampaignChannel,
    pub segment_id: Option<Uuid>,
    pub message_template: String,
    #[serde(default)]
    pub reward_id: Option<Uuid>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub message_template: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub preview: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSortField {
    #[default]
    LastVisit,
    Created,
    Name,
    Points,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: CustomerSortField,
    #[serde(default)]
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardSortField {
    #[default]
    Name,
    Cost,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewardQuery {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: RewardSortField,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCustomerRequest {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub sms_opt_in: bool,
    #[serde(default)]
    pub email_opt_in: bool,
}

/// Omitted fields are left alone. `email` and `birth_date` clear on `null`,
/// and an empty email clears too.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCustomerRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub birth_date: Option<Option<NaiveDate>>,
    pub sms_opt_in: Option<bool>,
    pub email_opt_in: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPointsRequest {
    pub points: u32,
}

#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub phone_display: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub enable_sms: bool,
    #[serde(default)]
    pub enable_email: bool,
    #[serde(default)]
    pub welcome_message: String,
    #[serde(default)]
    pub require_staff_pin_for_redemption: bool,
    /// New 4-digit staff PIN. Omit to keep the current one.
    #[serde(default)]
    pub staff_pin: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
