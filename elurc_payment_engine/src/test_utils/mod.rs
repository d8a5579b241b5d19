//! Helpers for tests, in this crate and downstream. Enabled with the `test_utils` feature.
pub mod fake_chain;
pub mod fixtures;
pub mod prepare_env;
