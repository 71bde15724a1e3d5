//! Capture source registry
//!
//! This module provides:
//! - Device and selection types
//! - Enumeration with infra-red filtering
//! - Label-based device resolution that survives re-enumeration

pub mod registry;
pub mod types;

pub use registry::{DeviceLists, SecondaryResolution, SourceRegistry};
pub use types::{Device, DeviceKind, SelectionSlot, SourceMatcher, SourceSelection};
