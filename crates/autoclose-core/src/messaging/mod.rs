//! Outbound system notifications and the inbound message model.

pub mod port;
pub mod throttled;
pub mod types;
