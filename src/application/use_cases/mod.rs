pub mod checkout;
pub mod paypal_webhook;
pub mod session;
pub mod subscription;
pub mod user;
