pub mod client;

pub use client::PaypalClient;
