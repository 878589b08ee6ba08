//! Utility modules: retry policy and token timeouts.

pub mod retry;
pub mod timeout;
