//! Kiosk front-end state: one session per tablet, idle timeouts, and the
//! success-screen countdown.

pub mod controller;
pub mod session;

pub use controller::{KioskController, KioskView};
pub use session::{KioskSession, KioskState, KioskTimings, SessionEvent};
