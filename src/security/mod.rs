//! Request admission policies.
//!
//! Policies here plug into the session as dispatch gates, so they run after
//! the head is parsed and before any processor sees the request.

pub mod rate_limit;

pub use rate_limit::RateLimitGate;
