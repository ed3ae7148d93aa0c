//! Utilities for tests and manual checks.
pub mod mock;
