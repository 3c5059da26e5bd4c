//! Tracing/logging setup shared by the stockledger binaries.

pub mod subscriber;

pub use subscriber::{LogFormat, init, init_with};
