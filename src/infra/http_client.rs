//! Outbound HTTP client with the timeouts every provider call uses.

use std::time::Duration;

use reqwest::Client;

use super::InfraError;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// PayPal and Resend calls are expected to finish within seconds.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub fn build_client() -> Result<Client, InfraError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(InfraError::HttpClient)
}
