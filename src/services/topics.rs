//! Bus topic names (spec §6).

pub const ORDER_INITIATED: &str = "payment.order.initiated.v1";
pub const ORDER_SUCCEEDED: &str = "payment.order.succeeded.v1";
pub const ORDER_FAILED: &str = "payment.order.failed.v1";
pub const ORDER_TIMEOUT: &str = "payment.order.timeout.v1";
pub const PROVIDER_EVENTS: &str = "payment.provider-events.v1";
