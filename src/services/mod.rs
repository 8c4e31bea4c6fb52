pub mod cancel_payment;
pub mod context;
pub mod create_payment;
pub mod failure_payment;
pub mod handle_timeout;
pub mod resolve_payment;
pub mod success_payment;
pub mod topics;
