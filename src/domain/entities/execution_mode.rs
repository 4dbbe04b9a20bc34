use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// How payment callbacks are treated. Resolved once at startup from
/// `PAYMENT_EXECUTION_MODE` and injected; never inferred from a request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExecutionMode {
    /// Production: signatures verified, custom payload mandatory.
    #[default]
    Live,
    /// Provider sandbox / simulator: no signature check, missing payloads
    /// fall back to the configured fake user. Writes are persisted.
    Sandbox,
    /// Events are validated and mapped but nothing is written.
    DryRun,
}

impl ExecutionMode {
    pub fn verifies_signatures(&self) -> bool {
        matches!(self, ExecutionMode::Live)
    }

    pub fn allows_fallback_user(&self) -> bool {
        matches!(self, ExecutionMode::Sandbox)
    }

    pub fn persists_writes(&self) -> bool {
        !matches!(self, ExecutionMode::DryRun)
    }
}
