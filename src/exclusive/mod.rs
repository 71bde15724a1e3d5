//! Mutually exclusive local modes
//!
//! Screen sharing and the secondary local source both occupy local tile 2,
//! so at most one of them can be on. Enabling flips the flag right away;
//! the caller rolls it back if the capture request fails.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::directory::StreamName;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalMode {
    ScreenSharing,
    SecondarySource,
}

impl LocalMode {
    pub fn other(&self) -> LocalMode {
        match self {
            Self::ScreenSharing => Self::SecondarySource,
            Self::SecondarySource => Self::ScreenSharing,
        }
    }

    /// Stream published on local tile 2 while this mode is on
    pub fn stream(&self) -> StreamName {
        match self {
            Self::ScreenSharing => StreamName::ScreenShare,
            Self::SecondarySource => StreamName::Secondary,
        }
    }
}

impl fmt::Display for LocalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScreenSharing => f.write_str("screen sharing"),
            Self::SecondarySource => f.write_str("secondary source"),
        }
    }
}

/// Button affordances that depend on the active mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeAffordances {
    /// Share-screen button on local tile 1 may be offered
    pub share_screen_button: bool,
    /// Second-source button on local tile 1 may be offered
    pub second_source_button: bool,
    /// Mic/video/speaker status icons on local tile 2
    pub secondary_status_controls: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExclusiveModes {
    screen_sharing: bool,
    secondary_source: bool,
}

impl ExclusiveModes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, mode: LocalMode) -> bool {
        match mode {
            LocalMode::ScreenSharing => self.screen_sharing,
            LocalMode::SecondarySource => self.secondary_source,
        }
    }

    pub fn active(&self) -> Option<LocalMode> {
        if self.screen_sharing {
            Some(LocalMode::ScreenSharing)
        } else if self.secondary_source {
            Some(LocalMode::SecondarySource)
        } else {
            None
        }
    }

    fn set(&mut self, mode: LocalMode, on: bool) {
        match mode {
            LocalMode::ScreenSharing => self.screen_sharing = on,
            LocalMode::SecondarySource => self.secondary_source = on,
        }
    }

    /// Check the preconditions and turn `mode` on
    ///
    /// Rejects with `ModeConflict` while the other mode is on and with
    /// `CapacityExceeded` once `remote_streams` reaches `limit`. Neither
    /// rejection changes any flag.
    pub fn begin_enable(&mut self, mode: LocalMode, remote_streams: usize, limit: usize) -> Result<()> {
        if self.is_active(mode.other()) {
            warn!("Trying to enable {} while {} is active", mode, mode.other());
            return Err(AppError::ModeConflict {
                requested: mode,
                active: mode.other(),
            });
        }

        if remote_streams >= limit {
            return Err(AppError::CapacityExceeded { limit });
        }

        self.set(mode, true);
        debug!("Local mode {} enabled", mode);
        Ok(())
    }

    /// Undo a `begin_enable` after the capture request failed
    pub fn rollback(&mut self, mode: LocalMode) {
        self.set(mode, false);
        debug!("Local mode {} rolled back", mode);
    }

    /// Turn `mode` off, returning whether it was on
    pub fn disable(&mut self, mode: LocalMode) -> bool {
        let was_active = self.is_active(mode);
        self.set(mode, false);
        was_active
    }

    pub fn affordances(&self, secondary_configured: bool) -> ModeAffordances {
        ModeAffordances {
            share_screen_button: !self.secondary_source,
            second_source_button: secondary_configured && !self.screen_sharing,
            secondary_status_controls: !self.screen_sharing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_leaves_flags_untouched() {
        let mut modes = ExclusiveModes::new();
        modes.begin_enable(LocalMode::SecondarySource, 0, 4).unwrap();

        let err = modes
            .begin_enable(LocalMode::ScreenSharing, 0, 4)
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::ModeConflict {
                requested: LocalMode::ScreenSharing,
                active: LocalMode::SecondarySource,
            }
        ));
        assert!(modes.is_active(LocalMode::SecondarySource));
        assert!(!modes.is_active(LocalMode::ScreenSharing));
    }

    #[test]
    fn test_capacity_checked_after_conflict() {
        let mut modes = ExclusiveModes::new();
        let err = modes.begin_enable(LocalMode::ScreenSharing, 4, 4).unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded { limit: 4 }));
        assert_eq!(modes.active(), None);

        modes.begin_enable(LocalMode::ScreenSharing, 3, 4).unwrap();
        assert_eq!(modes.active(), Some(LocalMode::ScreenSharing));
    }

    #[test]
    fn test_rollback_and_disable() {
        let mut modes = ExclusiveModes::new();
        modes.begin_enable(LocalMode::ScreenSharing, 0, 4).unwrap();
        modes.rollback(LocalMode::ScreenSharing);
        assert_eq!(modes.active(), None);

        modes.begin_enable(LocalMode::SecondarySource, 0, 4).unwrap();
        assert!(modes.disable(LocalMode::SecondarySource));
        assert!(!modes.disable(LocalMode::SecondarySource));
    }

    #[test]
    fn test_affordances_hide_the_other_button() {
        let mut modes = ExclusiveModes::new();
        let idle = modes.affordances(true);
        assert!(idle.share_screen_button && idle.second_source_button);
        assert!(!modes.affordances(false).second_source_button);

        modes.begin_enable(LocalMode::ScreenSharing, 0, 4).unwrap();
        let sharing = modes.affordances(true);
        assert!(sharing.share_screen_button);
        assert!(!sharing.second_source_button);
        assert!(!sharing.secondary_status_controls);

        modes.disable(LocalMode::ScreenSharing);
        modes.begin_enable(LocalMode::SecondarySource, 0, 4).unwrap();
        let secondary = modes.affordances(true);
        assert!(!secondary.share_screen_button);
        assert!(secondary.secondary_status_controls);
    }
}
