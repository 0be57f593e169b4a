//! Integration tests for healthbuddy-remote
//!
//! Uses wiremock to simulate the HealthBuddy API and verifies routing,
//! idempotency headers and outcome classification of the HttpDispatcher.

mod common;

mod test_dispatch;
mod test_fetch;
