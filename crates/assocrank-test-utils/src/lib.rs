//! assocrank-test-utils — Fixtures and fault-injecting wrappers shared by
//! the workspace's tests.

pub mod faults;
pub mod fixtures;

pub use faults::{FailingSink, FlakyRepository};
pub use pretty_assertions::assert_eq;
