//! Campaign lifecycle: validation, the status state machine, and simulated
//! delivery.

use crate::models::*;
use crate::store::{initial_status, ManagementStore};
use chrono::Utc;
use rewards_core::config::CampaignConfig;
use rewards_core::error::{RewardsError, RewardsResult};
use rewards_core::templates;
use rewards_core::RewardsBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Validate that `action` is allowed from `current` and return the target status.
pub fn next_status(current: CampaignStatus, action: CampaignAction) -> RewardsResult<CampaignStatus> {
    match (current, action) {
        (CampaignStatus::Draft, CampaignAction::Schedule) => Ok(CampaignStatus::Scheduled),
        (CampaignStatus::Scheduled, CampaignAction::Unschedule) => Ok(CampaignStatus::Draft),
        (CampaignStatus::Draft, CampaignAction::Send)
        | (CampaignStatus::Scheduled, CampaignAction::Send) => Ok(CampaignStatus::Sending),
        (CampaignStatus::Sending, CampaignAction::Complete) => Ok(CampaignStatus::Completed),
        (CampaignStatus::Scheduled, CampaignAction::Cancel) => Ok(CampaignStatus::Cancelled),
        _ => Err(RewardsError::InvalidTransition(format!(
            "cannot {:?} a campaign in status {:?}",
            action, current
        ))),
    }
}

/// Messages delivered out of `recipients` at the given success rate.
pub fn delivered_count(recipients: u64, rate: f64) -> u64 {
    let rate = rate.clamp(0.0, 1.0);
    (recipients as f64 * rate).floor() as u64
}

fn validate(req: &CampaignRequest) -> RewardsResult<Uuid> {
    if req.name.trim().is_empty() {
        return Err(RewardsError::validation("Campaign name is required"));
    }
    if req.message_template.trim().is_empty() {
        return Err(RewardsError::validation("Message template is required"));
    }
    req.segment_id
        .ok_or_else(|| RewardsError::validation("Please select a customer segment"))
}

/// Campaign operations for the dashboard.
pub struct CampaignManager {
    store: Arc<ManagementStore>,
    backend: Arc<dyn RewardsBackend>,
    config: CampaignConfig,
}

impl CampaignManager {
    pub fn new(store: Arc<ManagementStore>, backend: Arc<dyn RewardsBackend>, config: &CampaignConfig) -> Self {
        Self {
            store,
            backend,
            config: config.clone(),
        }
    }

    /// Current membership of a segment.
    async fn audience(&self, segment_id: Uuid) -> RewardsResult<Vec<rewards_core::types::Customer>> {
        let segment = self.store.get_segment(segment_id)?;
        let customers = self.backend.list_customers().await?;
        let now = Utc::now();
        Ok(customers
            .into_iter()
            .filter(|c| segment.rule.matches(c, now))
            .collect())
    }

    pub async fn create(&self, req: CampaignRequest, user: &str) -> RewardsResult<Campaign> {
        let segment_id = validate(&req)?;
        let recipients = self.audience(segment_id).await?.len() as u64;
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            description: req.description,
            channel: req.channel,
            segment_id,
            message_template: req.message_template,
            reward_id: req.reward_id,
            scheduled_date: req.scheduled_date,
            status: initial_status(req.scheduled_date, now),
            recipient_count: recipients,
            stats: CampaignStats::default(),
            created_at: now,
            updated_at: now,
        };
        metrics::counter!("management.campaigns.created").increment(1);
        info!(campaign_id = %campaign.id, status = ?campaign.status, recipients, "Campaign created");
        Ok(self.store.insert_campaign(campaign, user))
    }

    pub async fn update(&self, id: Uuid, req: CampaignRequest, user: &str) -> RewardsResult<Campaign> {
        let segment_id = validate(&req)?;
        let recipients = self.audience(segment_id).await?.len() as u64;
        self.store.update_campaign(id, &req, segment_id, recipients, user)
    }

    pub fn cancel(&self, id: Uuid, user: &str) -> RewardsResult<Campaign> {
        let campaign = self.store.transition(id, CampaignAction::Cancel, user)?;
        info!(campaign_id = %id, "Campaign cancelled");
        Ok(campaign)
    }

    pub fn delete(&self, id: Uuid, user: &str) -> RewardsResult<()> {
        self.store.delete_campaign(id, user)?;
        metrics::counter!("management.campaigns.deleted").increment(1);
        Ok(())
    }

    /// Move the campaign to SENDING and return it. Delivery runs in the
    /// background and completes the campaign after the configured delay.
    pub async fn send(self: &Arc<Self>, id: Uuid, user: &str) -> RewardsResult<(Campaign, JoinHandle<()>)> {
        let campaign = self.store.get_campaign(id)?;
        // Reject before touching the audience so terminal campaigns stay put.
        next_status(campaign.status, CampaignAction::Send)?;

        let audience = self.audience(campaign.segment_id).await?;
        self.store.set_recipient_count(id, audience.len() as u64)?;
        let campaign = self.store.transition(id, CampaignAction::Send, user)?;
        info!(campaign_id = %id, recipients = campaign.recipient_count, "Campaign sending");

        let manager = Arc::clone(self);
        let template = campaign.message_template.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(manager.config.delivery_delay_ms)).await;
            for customer in &audience {
                let message = templates::render_for(&template, customer);
                debug!(campaign_id = %id, customer_id = %customer.id, len = message.len(), "Message rendered");
            }
            if let Err(e) = manager.finish_delivery(id) {
                error!(campaign_id = %id, error = %e, "Failed to complete campaign delivery");
            }
        });
        Ok((campaign, handle))
    }

    /// SENDING -> COMPLETED using the configured delivery rate.
    pub fn finish_delivery(&self, id: Uuid) -> RewardsResult<Campaign> {
        let campaign = self.store.get_campaign(id)?;
        let delivered = delivered_count(campaign.recipient_count, self.config.delivery_rate);
        let campaign = self.store.complete_delivery(id, delivered, "system")?;
        metrics::counter!("management.campaigns.completed").increment(1);
        info!(
            campaign_id = %id,
            sent = campaign.stats.sent,
            delivered = campaign.stats.delivered,
            "Campaign delivery completed"
        );
        Ok(campaign)
    }

    pub fn preview(template: &str) -> String {
        templates::preview(template)
    }
}
