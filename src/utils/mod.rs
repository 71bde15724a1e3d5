//! Shared helpers

pub mod throttle;

pub use throttle::LogThrottler;
