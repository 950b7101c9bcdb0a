#![warn(clippy::unwrap_used)]

pub mod kiosk_rest;
pub mod rest;
pub mod server;

pub use server::{build_app, ApiServer};
