//! Common test utilities for blazer integration tests

#[allow(dead_code)]
pub mod fake_storage;
#[allow(dead_code)]
pub mod fixtures;

pub use fake_storage::*;
#[allow(unused_imports)]
pub use fixtures::*;
