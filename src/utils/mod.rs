// Shared constants and validation helpers
pub mod constants;
mod timeout;

pub use timeout::{
    MAX_NAVIGATION_TIMEOUT_MS, MAX_SETTLE_WAIT_MS, validate_navigation_timeout,
    validate_settle_wait,
};
