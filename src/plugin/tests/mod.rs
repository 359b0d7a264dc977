//! Plugin System Tests
//!
//! Contract tests driving the mock plugins through the outer operations and
//! the runner.


#[cfg(test)]
pub mod import_tests;
