pub mod backend;
pub mod config;
pub mod error;
pub mod phone;
pub mod templates;
pub mod types;

pub use backend::{RewardsBackend, Table};
pub use config::AppConfig;
pub use error::{BackendError, BackendResult, RewardsError, RewardsResult};
pub use phone::PhoneNumber;
