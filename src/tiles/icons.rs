//! Per-tile icon visibility
//!
//! Idle tiles hide their controls, except indicators whose feature is
//! itself in an "on" state (a muted microphone, a lit star, a running
//! screen share) which stay visible regardless.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileIcon {
    Mic,
    Speaker,
    Video,
    Star,
    Swap,
    ShareScreen,
    SecondSource,
    Config,
    Ptz,
}

/// Everything icon visibility depends on for one tile
#[derive(Debug, Clone, Copy, Default)]
pub struct IconContext {
    pub active: bool,
    pub privileged: bool,
    pub mic_muted: bool,
    pub speaker_muted: bool,
    pub video_muted: bool,
    /// Status icons may be hidden entirely (screen share tiles)
    pub status_controls: bool,
    pub star_lit: bool,
    pub pointer_unset: bool,
    /// Tile carries the share-screen and second-source buttons
    pub source_buttons: bool,
    pub screen_sharing: bool,
    pub secondary_source: bool,
    pub secondary_configured: bool,
    pub ptz: bool,
}

pub fn visible_icons(ctx: &IconContext) -> Vec<TileIcon> {
    let mut icons = Vec::new();

    if ctx.status_controls {
        for (icon, muted) in [
            (TileIcon::Mic, ctx.mic_muted),
            (TileIcon::Speaker, ctx.speaker_muted),
            (TileIcon::Video, ctx.video_muted),
        ] {
            if muted || ctx.active {
                icons.push(icon);
            }
        }
    }

    if ctx.star_lit || ctx.active {
        icons.push(TileIcon::Star);
    }

    let swap = if ctx.privileged {
        ctx.active
    } else {
        ctx.active && ctx.pointer_unset
    };
    if swap {
        icons.push(TileIcon::Swap);
    }

    if ctx.source_buttons {
        if ctx.screen_sharing || (ctx.active && !ctx.secondary_source) {
            icons.push(TileIcon::ShareScreen);
        }
        if ctx.secondary_configured
            && (ctx.secondary_source || (ctx.active && !ctx.screen_sharing))
        {
            icons.push(TileIcon::SecondSource);
        }
    }

    if ctx.active {
        icons.push(TileIcon::Config);
        if ctx.ptz {
            icons.push(TileIcon::Ptz);
        }
    }

    icons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> IconContext {
        IconContext {
            status_controls: true,
            pointer_unset: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_idle_tile_hides_everything_off() {
        assert!(visible_icons(&base()).is_empty());
    }

    #[test]
    fn test_muted_indicators_stay_visible() {
        let ctx = IconContext {
            mic_muted: true,
            star_lit: true,
            ..base()
        };
        assert_eq!(visible_icons(&ctx), vec![TileIcon::Mic, TileIcon::Star]);
    }

    #[test]
    fn test_active_tile_shows_controls() {
        let ctx = IconContext {
            active: true,
            ..base()
        };
        let icons = visible_icons(&ctx);
        assert!(icons.contains(&TileIcon::Mic));
        assert!(icons.contains(&TileIcon::Swap));
        assert!(icons.contains(&TileIcon::Config));
        assert!(!icons.contains(&TileIcon::Ptz));
        assert!(!icons.contains(&TileIcon::ShareScreen));
    }

    #[test]
    fn test_participant_swap_hidden_under_remote_pointer() {
        let ctx = IconContext {
            active: true,
            pointer_unset: false,
            ..base()
        };
        assert!(!visible_icons(&ctx).contains(&TileIcon::Swap));

        let ctx = IconContext {
            privileged: true,
            ..ctx
        };
        assert!(visible_icons(&ctx).contains(&TileIcon::Swap));
    }

    #[test]
    fn test_source_buttons_follow_modes() {
        let ctx = IconContext {
            active: true,
            source_buttons: true,
            secondary_configured: true,
            ..base()
        };
        let icons = visible_icons(&ctx);
        assert!(icons.contains(&TileIcon::ShareScreen));
        assert!(icons.contains(&TileIcon::SecondSource));

        let sharing = IconContext {
            active: false,
            screen_sharing: true,
            ..ctx
        };
        assert_eq!(visible_icons(&sharing), vec![TileIcon::ShareScreen]);

        let unconfigured = IconContext {
            secondary_configured: false,
            ..ctx
        };
        assert!(!visible_icons(&unconfigured).contains(&TileIcon::SecondSource));
    }

    #[test]
    fn test_ptz_only_while_active() {
        let ctx = IconContext {
            ptz: true,
            ..base()
        };
        assert!(!visible_icons(&ctx).contains(&TileIcon::Ptz));
        let ctx = IconContext { active: true, ..ctx };
        assert!(visible_icons(&ctx).contains(&TileIcon::Ptz));
    }
}
