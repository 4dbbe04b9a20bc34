//! Test utilities.
//!
//! - Test data factories with sensible defaults
//! - In-memory repository and port implementations
//! - `TestAppStateBuilder` for HTTP-level tests

mod app_state_builder;
mod factories;
mod mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use mocks::*;
