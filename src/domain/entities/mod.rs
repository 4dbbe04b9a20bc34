pub mod checkout;
pub mod execution_mode;
pub mod paypal_event;
pub mod subscription;
