//! In-memory management store backed by DashMap.
//!
//! Production: replace with tables on the rewards backend.
//! This provides the same API surface for development and testing.

use crate::campaigns::next_status;
use crate::models::*;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rewards_core::error::{RewardsError, RewardsResult};
use tracing::info;
use uuid::Uuid;

/// Authenticated dashboard session.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub user: String,
    pub expires_at: DateTime<Utc>,
}

/// Thread-safe in-memory store for campaigns, their history, segments,
/// dashboard sessions, and the audit log.
pub struct ManagementStore {
    campaigns: DashMap<Uuid, Campaign>,
    history: DashMap<Uuid, Vec<CampaignTransition>>,
    segments: DashMap<Uuid, Segment>,
    sessions: DashMap<String, AdminSession>,
    audit_log: DashMap<Uuid, AuditLogEntry>,
}

impl ManagementStore {
    pub fn new() -> Self {
        info!("Management store initialized (in-memory, development mode)");
        Self {
            campaigns: DashMap::new(),
            history: DashMap::new(),
            segments: DashMap::new(),
            sessions: DashMap::new(),
            audit_log: DashMap::new(),
        }
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn list_campaigns(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self.campaigns.iter().map(|r| r.value().clone()).collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    pub fn get_campaign(&self, id: Uuid) -> RewardsResult<Campaign> {
        self.campaigns
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| RewardsError::NotFound(format!("campaign {id}")))
    }

    /// Store a new campaign. One created with a future send time is logged
    /// as scheduled straight out of DRAFT.
    pub fn insert_campaign(&self, campaign: Campaign, user: &str) -> Campaign {
        let id = campaign.id;
        self.campaigns.insert(id, campaign.clone());
        self.history.insert(id, Vec::new());
        self.log_audit(user, AuditAction::Create, "campaign", &id.to_string(), serde_json::json!({"name": &campaign.name}));
        if campaign.status == CampaignStatus::Scheduled {
            self.record(id, CampaignStatus::Draft, CampaignStatus::Scheduled, CampaignAction::Schedule, user);
        }
        campaign
    }

    /// Apply an edit and settle the status implied by the new send time.
    /// Only DRAFT and SCHEDULED campaigns are editable.
    pub fn update_campaign(
        &self,
        id: Uuid,
        req: &CampaignRequest,
        segment_id: Uuid,
        recipient_count: u64,
        user: &str,
    ) -> RewardsResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| RewardsError::NotFound(format!("campaign {id}")))?;
        let c = entry.value_mut();
        if !c.status.is_editable() {
            return Err(RewardsError::InvalidTransition(format!(
                "campaign in status {:?} cannot be edited",
                c.status
            )));
        }

        let now = Utc::now();
        let wants = initial_status(req.scheduled_date, now);
        let action = match (c.status, wants) {
            (CampaignStatus::Draft, CampaignStatus::Scheduled) => Some(CampaignAction::Schedule),
            (CampaignStatus::Scheduled, CampaignStatus::Draft) => Some(CampaignAction::Unschedule),
            _ => None,
        };
        if let Some(action) = action {
            let to = next_status(c.status, action)?;
            self.record(id, c.status, to, action, user);
            c.status = to;
        }

        c.name = req.name.trim().to_string();
        c.description = req.description.clone();
        c.channel = req.channel;
        c.segment_id = segment_id;
        c.message_template = req.message_template.clone();
        c.reward_id = req.reward_id;
        c.scheduled_date = req.scheduled_date;
        c.recipient_count = recipient_count;
        c.updated_at = now;
        self.log_audit(user, AuditAction::Update, "campaign", &id.to_string(), serde_json::json!({}));
        Ok(c.clone())
    }

    /// Move a campaign through `action`, recording the transition.
    pub fn transition(&self, id: Uuid, action: CampaignAction, user: &str) -> RewardsResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| RewardsError::NotFound(format!("campaign {id}")))?;
        let c = entry.value_mut();
        let to = next_status(c.status, action)?;
        self.record(id, c.status, to, action, user);
        c.status = to;
        c.updated_at = Utc::now();
        Ok(c.clone())
    }

    /// SENDING -> COMPLETED with delivery counters filled in.
    pub fn complete_delivery(&self, id: Uuid, delivered: u64, user: &str) -> RewardsResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| RewardsError::NotFound(format!("campaign {id}")))?;
        let c = entry.value_mut();
        let to = next_status(c.status, CampaignAction::Complete)?;
        self.record(id, c.status, to, CampaignAction::Complete, user);
        c.status = to;
        c.stats.sent = c.recipient_count;
        c.stats.delivered = delivered.min(c.recipient_count);
        c.updated_at = Utc::now();
        Ok(c.clone())
    }

    /// Set the audience size, e.g. right before sending.
    pub fn set_recipient_count(&self, id: Uuid, recipient_count: u64) -> RewardsResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| RewardsError::NotFound(format!("campaign {id}")))?;
        entry.recipient_count = recipient_count;
        Ok(entry.value().clone())
    }

    /// Only DRAFT and CANCELLED campaigns can be deleted.
    pub fn delete_campaign(&self, id: Uuid, user: &str) -> RewardsResult<()> {
        let status = self.get_campaign(id)?.status;
        if self
            .campaigns
            .remove_if(&id, |_, c| c.status.is_deletable())
            .is_none()
        {
            return Err(RewardsError::InvalidTransition(format!(
                "campaign in status {status:?} cannot be deleted"
            )));
        }
        self.history.remove(&id);
        self.log_audit(user, AuditAction::Delete, "campaign", &id.to_string(), serde_json::json!({}));
        Ok(())
    }

    pub fn campaign_history(&self, id: Uuid) -> Vec<CampaignTransition> {
        self.history.get(&id).map(|h| h.value().clone()).unwrap_or_default()
    }

    fn record(&self, id: Uuid, from: CampaignStatus, to: CampaignStatus, action: CampaignAction, user: &str) {
        let transition = CampaignTransition {
            id: Uuid::new_v4(),
            campaign_id: id,
            from_status: from,
            to_status: to,
            action,
            actor: user.to_string(),
            timestamp: Utc::now(),
        };
        self.history.entry(id).or_default().push(transition);
        metrics::counter!("management.campaign_transitions", "to" => format!("{to:?}")).increment(1);
        self.log_audit(user, AuditAction::Transition, "campaign", &id.to_string(), serde_json::json!({"from": from, "to": to}));
    }

    // ─── Segments ──────────────────────────────────────────────────────────

    pub fn list_segments(&self) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self.segments.iter().map(|r| r.value().clone()).collect();
        segments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        segments
    }

    pub fn get_segment(&self, id: Uuid) -> RewardsResult<Segment> {
        self.segments
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| RewardsError::NotFound(format!("segment {id}")))
    }

    pub fn insert_segment(&self, segment: Segment) -> Segment {
        self.segments.insert(segment.id, segment.clone());
        segment
    }

    // ─── Sessions ──────────────────────────────────────────────────────────

    pub fn insert_session(&self, token: String, session: AdminSession) {
        self.sessions.insert(token, session);
    }

    /// The session for `token`, if it exists and has not expired.
    pub fn session(&self, token: &str, now: DateTime<Utc>) -> Option<AdminSession> {
        let session = self.sessions.get(token).map(|s| s.value().clone())?;
        if session.expires_at <= now {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    // ─── Audit Log ─────────────────────────────────────────────────────────

    pub fn get_audit_log(&self) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self.audit_log.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn log_audit(&self, user: &str, action: AuditAction, resource_type: &str, resource_id: &str, details: serde_json::Value) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            user: user.to_string(),
            action,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
        };
        self.audit_log.insert(entry.id, entry);
    }

    // ─── Seed data ─────────────────────────────────────────────────────────

    /// Default segments and a few campaigns in every status.
    pub fn seed_demo_data(&self) {
        let now = Utc::now();
        let segment = |name: &str, description: &str, rule: SegmentRule| {
            self.insert_segment(Segment {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: description.to_string(),
                rule,
                created_at: now,
                updated_at: now,
            })
            .id
        };
        let all = segment("All Customers", "All active customers", SegmentRule::AllActive);
        let high_value = segment(
            "High Value",
            "Customers with 400+ points",
            SegmentRule::MinPoints { points: 400 },
        );
        let new = segment(
            "New Customers",
            "Customers registered in the last 90 days",
            SegmentRule::RegisteredWithinDays { days: 90 },
        );
        let at_risk = segment(
            "At Risk",
            "Customers who haven't visited in 30+ days",
            SegmentRule::LastVisitOlderThanDays { days: 30 },
        );
        let birthday = segment(
            "Birthday This Month",
            "Customers with birthdays this month",
            SegmentRule::BirthdayThisMonth,
        );

        let campaign = |name: &str, description: &str, segment_id: Uuid, template: &str, status: CampaignStatus, scheduled: Option<DateTime<Utc>>, recipients: u64, stats: CampaignStats| Campaign {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            channel: CampaignChannel::Sms,
            segment_id,
            message_template: template.to_string(),
            reward_id: None,
            scheduled_date: scheduled,
            status,
            recipient_count: recipients,
            stats,
            created_at: now,
            updated_at: now,
        };

        let campaigns = vec![
            campaign(
                "Welcome Campaign",
                "Sent to new customers after registration",
                new,
                "Welcome to Coffee & Co, {{firstName}}! Show this message for 10% off your next purchase.",
                CampaignStatus::Active,
                None,
                2,
                CampaignStats { sent: 2, delivered: 2, opened: 2, clicked: 1 },
            ),
            campaign(
                "Iced Coffee Special",
                "Promotion for our summer specials",
                all,
                "Hi {{firstName}}! Beat the heat with our new iced coffee specials. Show this message to get double points this weekend!",
                CampaignStatus::Scheduled,
                Some(now + Duration::days(7)),
                6,
                CampaignStats::default(),
            ),
            campaign(
                "High Value Thank You",
                "Appreciation message for our best customers",
                high_value,
                "{{firstName}}, thank you for being one of our most valued customers! Enjoy a free coffee on us - just show this message.",
                CampaignStatus::Completed,
                Some(now - Duration::days(20)),
                3,
                CampaignStats { sent: 3, delivered: 3, opened: 2, clicked: 2 },
            ),
            campaign(
                "We Miss You",
                "Re-engagement campaign for at-risk customers",
                at_risk,
                "We miss you, {{firstName}}! It's been a while since your last visit. Come back and enjoy 50 bonus points with any purchase!",
                CampaignStatus::Draft,
                None,
                1,
                CampaignStats::default(),
            ),
            campaign(
                "Birthday Reward",
                "Special offer for customers' birthdays",
                birthday,
                "Happy Birthday, {{firstName}}! Celebrate with a free item of your choice. Valid during your birthday month.",
                CampaignStatus::Active,
                None,
                1,
                CampaignStats { sent: 1, delivered: 1, opened: 1, clicked: 1 },
            ),
        ];
        for c in campaigns {
            self.campaigns.insert(c.id, c.clone());
            self.history.insert(c.id, Vec::new());
        }

        info!(segments = 5, campaigns = 5, "Seeded management demo data");
    }
}

impl Default for ManagementStore {
    fn default() -> Self {
        Self::new()
    }
}

/// SCHEDULED when the send time is in the future, DRAFT otherwise.
pub fn initial_status(scheduled_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CampaignStatus {
    match scheduled_date {
        Some(at) if at > now => CampaignStatus::Scheduled,
        _ => CampaignStatus::Draft,
    }
}
