//! Testing utilities for nimbus-storage
//!
//! Enabled with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! nimbus-storage = { path = "../nimbus-storage", features = ["testing"] }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::TaskRecordBuilder;
pub use mocks::{mock_errors, MockTaskRepo};
