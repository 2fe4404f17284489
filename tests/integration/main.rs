//! Integration test binary: runner and scheduler exercised through the
//! public API with in-memory collaborators.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod helpers;

mod digest_flow;
mod runner_flow;
