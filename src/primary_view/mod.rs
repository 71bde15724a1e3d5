//! Primary-view election
//!
//! One pointer per session names the stream every client should show
//! enlarged. Remote elections always overwrite the local value; the star
//! indicator is derived from the pointer so at most one tile is lit.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::directory::{Directory, PeerId, StreamKey, StreamName, TileId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimaryView {
    /// No override, default grid layout
    #[default]
    Unset,
    Stream { peer_id: PeerId, stream: StreamName },
}

impl PrimaryView {
    pub fn stream(peer_id: PeerId, stream: StreamName) -> Self {
        Self::Stream { peer_id, stream }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn targets(&self, key: &StreamKey) -> bool {
        matches!(self, Self::Stream { peer_id, stream } if *peer_id == key.peer_id && *stream == key.stream)
    }

    pub fn targets_peer(&self, peer: &PeerId) -> bool {
        matches!(self, Self::Stream { peer_id, .. } if peer_id == peer)
    }
}

impl From<StreamKey> for PrimaryView {
    fn from(key: StreamKey) -> Self {
        Self::Stream {
            peer_id: key.peer_id,
            stream: key.stream,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionOrigin {
    Local,
    Remote,
}

/// Star indicator transition on one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarChange {
    pub tile: TileId,
    pub lit: bool,
}

/// Result of a local toggle request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Pointer changed; peers must be told
    Elected(PrimaryView),
    /// Local enlargement only, nothing to broadcast
    Enlarged(Option<TileId>),
    /// Rejected while a remote-dictated pointer is in force
    Locked,
}

#[derive(Debug, Default)]
pub struct PrimaryViewElection {
    pointer: PrimaryView,
    origin: Option<ElectionOrigin>,
    lit: Option<TileId>,
    enlarged: Option<TileId>,
}

impl PrimaryViewElection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer(&self) -> &PrimaryView {
        &self.pointer
    }

    pub fn origin(&self) -> Option<ElectionOrigin> {
        self.origin
    }

    pub fn lit(&self) -> Option<TileId> {
        self.lit
    }

    pub fn enlarged(&self) -> Option<TileId> {
        self.enlarged
    }

    pub fn is_remote_dictated(&self) -> bool {
        self.origin == Some(ElectionOrigin::Remote) && !self.pointer.is_unset()
    }

    /// Overwrite the pointer, last write wins
    pub fn set_primary_view(&mut self, view: PrimaryView, origin: ElectionOrigin) {
        debug!(?view, ?origin, "Primary view set");
        self.pointer = view;
        self.origin = Some(origin);
    }

    /// Star or unstar `tile`, which currently shows `key`
    ///
    /// Privileged viewers move the shared pointer. Everyone else only
    /// toggles a local enlargement and leaves the pointer unattributed.
    pub fn toggle_as_primary(&mut self, tile: TileId, key: &StreamKey, privileged: bool) -> ToggleOutcome {
        if privileged {
            let view = if self.pointer.targets(key) {
                PrimaryView::Unset
            } else {
                PrimaryView::from(key.clone())
            };
            info!(%tile, ?view, "Primary view elected");
            self.set_primary_view(view.clone(), ElectionOrigin::Local);
            return ToggleOutcome::Elected(view);
        }

        if self.is_remote_dictated() {
            debug!(%tile, "Primary view is set remotely, ignoring local toggle");
            return ToggleOutcome::Locked;
        }

        self.set_primary_view(PrimaryView::Unset, ElectionOrigin::Local);
        self.enlarged = if self.enlarged == Some(tile) { None } else { Some(tile) };
        ToggleOutcome::Enlarged(self.enlarged)
    }

    /// Recompute which tile carries the star
    pub fn reflect(&mut self, directory: &Directory) -> Vec<StarChange> {
        let target = match &self.pointer {
            PrimaryView::Unset => None,
            PrimaryView::Stream { peer_id, stream } => directory.index_for_peer_stream(peer_id, *stream),
        };

        if target == self.lit {
            return Vec::new();
        }

        let mut changes = Vec::with_capacity(2);
        if let Some(tile) = self.lit {
            changes.push(StarChange { tile, lit: false });
        }
        if let Some(tile) = target {
            changes.push(StarChange { tile, lit: true });
        }
        self.lit = target;
        changes
    }

    /// Move the enlargement onto the starred tile; returns whether it moved
    pub fn enlarge_lit(&mut self) -> bool {
        self.set_enlarged(self.lit)
    }

    /// Layout after a remote election; returns whether the enlargement changed
    ///
    /// Moderators enlarge the starred tile, participants drop their local
    /// enlargement.
    pub fn follow_remote(&mut self, privileged: bool) -> bool {
        if privileged {
            self.enlarge_lit()
        } else {
            self.set_enlarged(None)
        }
    }

    pub fn set_enlarged(&mut self, tile: Option<TileId>) -> bool {
        let changed = self.enlarged != tile;
        self.enlarged = tile;
        changed
    }

    /// Forget a tile that no longer shows anything
    pub fn tile_released(&mut self, tile: TileId) -> bool {
        if self.lit == Some(tile) {
            self.lit = None;
        }
        if self.enlarged == Some(tile) {
            self.enlarged = None;
            return true;
        }
        false
    }

    /// Reset a pointer aimed at a departed peer
    pub fn clear_for_peer(&mut self, peer: &PeerId) -> bool {
        if !self.pointer.targets_peer(peer) {
            return false;
        }
        info!(%peer, "Primary view target left, resetting");
        self.pointer = PrimaryView::Unset;
        self.origin = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Directory, PrimaryViewElection) {
        let mut dir = Directory::new(PeerId::new("me"), 4);
        dir.assign_tile(&PeerId::new("me"), StreamName::Default).unwrap();
        dir.assign_tile(&PeerId::new("a"), StreamName::Default).unwrap();
        dir.assign_tile(&PeerId::new("b"), StreamName::Default).unwrap();
        dir.assign_tile(&PeerId::new("a"), StreamName::ScreenShare).unwrap();
        (dir, PrimaryViewElection::new())
    }

    fn lit_count(dir: &Directory, election: &PrimaryViewElection) -> usize {
        dir.occupied_tiles()
            .iter()
            .filter(|(tile, _)| election.lit() == Some(*tile))
            .count()
    }

    #[test]
    fn test_privileged_toggle_sets_and_clears() {
        let (dir, mut election) = setup();
        let key = dir.stream_at(TileId::remote(1)).unwrap();

        let outcome = election.toggle_as_primary(TileId::remote(1), &key, true);
        assert_eq!(
            outcome,
            ToggleOutcome::Elected(PrimaryView::stream(PeerId::new("a"), StreamName::Default))
        );

        let outcome = election.toggle_as_primary(TileId::remote(1), &key, true);
        assert_eq!(outcome, ToggleOutcome::Elected(PrimaryView::Unset));
        assert!(election.pointer().is_unset());
    }

    #[test]
    fn test_participant_toggle_is_local() {
        let (dir, mut election) = setup();
        let key = dir.stream_at(TileId::remote(2)).unwrap();

        let outcome = election.toggle_as_primary(TileId::remote(2), &key, false);
        assert_eq!(outcome, ToggleOutcome::Enlarged(Some(TileId::remote(2))));
        assert!(election.pointer().is_unset());

        let outcome = election.toggle_as_primary(TileId::remote(2), &key, false);
        assert_eq!(outcome, ToggleOutcome::Enlarged(None));
    }

    #[test]
    fn test_participant_toggle_locked_by_remote_pointer() {
        let (dir, mut election) = setup();
        election.set_primary_view(
            PrimaryView::stream(PeerId::new("b"), StreamName::Default),
            ElectionOrigin::Remote,
        );
        let key = dir.stream_at(TileId::remote(1)).unwrap();
        assert_eq!(
            election.toggle_as_primary(TileId::remote(1), &key, false),
            ToggleOutcome::Locked
        );
    }

    #[test]
    fn test_remote_election_drops_participant_enlargement() {
        let (dir, mut election) = setup();
        let key = dir.stream_at(TileId::remote(1)).unwrap();
        election.toggle_as_primary(TileId::remote(1), &key, false);
        assert_eq!(election.enlarged(), Some(TileId::remote(1)));

        election.set_primary_view(
            PrimaryView::stream(PeerId::new("b"), StreamName::Default),
            ElectionOrigin::Remote,
        );
        election.reflect(&dir);
        assert!(election.follow_remote(false));
        assert_eq!(election.lit(), Some(TileId::remote(2)));
        assert_eq!(election.enlarged(), None);

        // Still locked, but nothing is left enlarged
        assert_eq!(
            election.toggle_as_primary(TileId::remote(1), &key, false),
            ToggleOutcome::Locked
        );
        assert_eq!(election.enlarged(), None);
    }

    #[test]
    fn test_remote_election_enlarges_for_moderator() {
        let (dir, mut election) = setup();
        election.set_primary_view(
            PrimaryView::stream(PeerId::new("a"), StreamName::ScreenShare),
            ElectionOrigin::Remote,
        );
        election.reflect(&dir);
        assert!(election.follow_remote(true));
        assert_eq!(election.enlarged(), Some(TileId::remote(3)));
        assert!(!election.follow_remote(true));
    }

    #[test]
    fn test_star_is_unique_across_elections() {
        let (dir, mut election) = setup();
        let views = [
            PrimaryView::stream(PeerId::new("a"), StreamName::Default),
            PrimaryView::stream(PeerId::new("me"), StreamName::Default),
            PrimaryView::stream(PeerId::new("a"), StreamName::ScreenShare),
            PrimaryView::stream(PeerId::new("nobody"), StreamName::Default),
            PrimaryView::Unset,
            PrimaryView::stream(PeerId::new("b"), StreamName::Default),
        ];

        for (i, view) in views.into_iter().enumerate() {
            let origin = if i % 2 == 0 {
                ElectionOrigin::Remote
            } else {
                ElectionOrigin::Local
            };
            let expected = match &view {
                PrimaryView::Unset => None,
                PrimaryView::Stream { peer_id, stream } => dir.index_for_peer_stream(peer_id, *stream),
            };
            election.set_primary_view(view, origin);
            election.reflect(&dir);
            assert_eq!(election.lit(), expected);
            assert!(lit_count(&dir, &election) <= 1);
        }
        assert_eq!(election.lit(), Some(TileId::remote(2)));
    }

    #[test]
    fn test_reflect_reports_transitions() {
        let (dir, mut election) = setup();
        election.set_primary_view(
            PrimaryView::stream(PeerId::new("a"), StreamName::Default),
            ElectionOrigin::Remote,
        );
        assert_eq!(
            election.reflect(&dir),
            vec![StarChange { tile: TileId::remote(1), lit: true }]
        );
        assert!(election.reflect(&dir).is_empty());

        election.set_primary_view(
            PrimaryView::stream(PeerId::new("me"), StreamName::Default),
            ElectionOrigin::Remote,
        );
        assert_eq!(
            election.reflect(&dir),
            vec![
                StarChange { tile: TileId::remote(1), lit: false },
                StarChange { tile: TileId::LOCAL_PRIMARY, lit: true },
            ]
        );
    }

    #[test]
    fn test_departed_peer_clears_pointer() {
        let (_, mut election) = setup();
        election.set_primary_view(
            PrimaryView::stream(PeerId::new("a"), StreamName::ScreenShare),
            ElectionOrigin::Remote,
        );
        assert!(!election.clear_for_peer(&PeerId::new("b")));
        assert!(election.clear_for_peer(&PeerId::new("a")));
        assert!(election.pointer().is_unset());
        assert!(!election.is_remote_dictated());
    }

    #[test]
    fn test_wire_format() {
        let view = PrimaryView::stream(PeerId::new("a"), StreamName::ScreenShare);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "stream", "peer_id": "a", "stream": "screenshare"})
        );
        let unset: PrimaryView = serde_json::from_str(r#"{"kind":"unset"}"#).unwrap();
        assert!(unset.is_unset());
    }
}
