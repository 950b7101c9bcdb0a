//! Back-office for the rewards program: customers, rewards, segments,
//! campaigns, reports, business settings and the audit log.
//!
//! Provides REST API endpoints for the management dashboard UI.
//! Campaign, segment and session data live in DashMap; customer and reward
//! records go through the shared [`rewards_core::RewardsBackend`].

pub mod admin;
pub mod auth;
pub mod campaigns;
pub mod error;
pub mod handlers;
pub mod models;
pub mod reports;
pub mod router;
pub mod segments;
pub mod store;

pub use admin::AdminService;
pub use campaigns::CampaignManager;
pub use error::ApiError;
pub use handlers::ManagementState;
pub use router::management_router;
pub use store::ManagementStore;
