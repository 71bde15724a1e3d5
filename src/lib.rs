//! View Coordinator - client-side view state for multi-party video sessions
//!
//! This crate keeps the mapping between session entities (local sources,
//! remote participants, their streams and capabilities) and presentation
//! state (which tile shows what, which icons are visible, which view is
//! enlarged), under concurrent updates from the local user, remote peers
//! and the host application.

pub mod capabilities;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod devices;
pub mod directory;
pub mod error;
pub mod events;
pub mod exclusive;
pub mod host;
pub mod primary_view;
pub mod signaling;
pub mod tiles;
pub mod utils;

pub use coordinator::{Coordinator, Input, SessionSnapshot, UserAction};
pub use error::{AppError, Result};
