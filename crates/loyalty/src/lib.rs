//! Loyalty core: phone identity resolution, the points ledger, and reward
//! redemption on top of a [`rewards_core::RewardsBackend`].

pub mod engine;

pub use engine::{CheckInOutcome, LoyaltyEngine, RedeemOutcome, RegistrationForm};
