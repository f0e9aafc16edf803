//! Core building blocks shared by the exgate crates.
//!
//! This crate holds the pieces every other exgate crate depends on: the
//! [`AuthConfig`] loaded from environment variables, the [`Clock`]
//! abstraction used for all time-dependent checks, and the core error type.

mod clock;
mod config;
mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, MAX_KEY_ROTATION_DAYS};
pub use error::{ExgateError, ExgateResult};
