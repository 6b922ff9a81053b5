//! Error codes shared by every syncguard crate.
//!
//! Library error enums expose an `error_code()` mapping onto
//! [`ErrorCode`], so the same `SG-Exxx` code shows up in logs, CLI output,
//! and the retryable errors handed back to the scheduler.

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};
