pub mod email;
pub mod http;
pub mod paypal;
pub mod persistence;
