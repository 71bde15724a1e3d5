//! Coordinator inputs
//!
//! Everything that can change session state arrives as one of these, from
//! the local user, a peer, or the host application.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::state::SessionSnapshot;
use crate::devices::{DeviceKind, SourceMatcher};
use crate::directory::{MuteKind, StatusUpdate, TileId};
use crate::error::Result;
use crate::host::HostCommand;
use crate::signaling::PeerMessage;

/// Local user interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    /// Retry affordance for a failed enumeration
    RefreshDevices,
    /// Hover or tap on a tile
    Interact { tile: TileId },
    /// Star button on a tile
    TogglePrimary { tile: TileId },
    ToggleScreenShare,
    ToggleSecondSource,
    ToggleMuteAll { kind: MuteKind },
    SelectSource {
        kind: DeviceKind,
        #[serde(default)]
        matcher: SourceMatcher,
    },
    /// Local mic/speaker/video mute buttons
    SetLocalStatus { status: StatusUpdate },
}

/// One inbound event for the coordinator queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "message", rename_all = "snake_case")]
pub enum Input {
    Host(HostCommand),
    Peer(PeerMessage),
    User(UserAction),
}

impl Input {
    pub fn describe(&self) -> String {
        match self {
            Self::Host(cmd) => format!("host {}", cmd.name()),
            Self::Peer(msg) => format!("peer {} from {}", msg.kind(), msg.peer_id()),
            Self::User(action) => format!("user {:?}", action),
        }
    }
}

impl From<HostCommand> for Input {
    fn from(cmd: HostCommand) -> Self {
        Self::Host(cmd)
    }
}

impl From<PeerMessage> for Input {
    fn from(msg: PeerMessage) -> Self {
        Self::Peer(msg)
    }
}

impl From<UserAction> for Input {
    fn from(action: UserAction) -> Self {
        Self::User(action)
    }
}

pub(crate) enum Command {
    Input {
        input: Input,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_inputs() {
        let input: Input = serde_json::from_str(
            r#"{"source":"user","message":{"action":"interact","tile":{"side":"remote","slot":2}}}"#,
        )
        .unwrap();
        assert_eq!(
            input,
            Input::User(UserAction::Interact {
                tile: TileId::remote(2)
            })
        );

        let input: Input = serde_json::from_str(
            r#"{"source":"user","message":{"action":"select_source","kind":"video","matcher":{"name":"BRIO"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            input,
            Input::User(UserAction::SelectSource {
                kind: DeviceKind::Video,
                ..
            })
        ));

        let input: Input = serde_json::from_str(
            r#"{"source":"peer","message":{"type":"peer_left","peer_id":"p9"}}"#,
        )
        .unwrap();
        assert!(input.describe().contains("peer_left"));
    }
}
