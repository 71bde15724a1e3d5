//! Tile activity state machine
//!
//! Each populated tile is either active (controls shown) or idle. An
//! interaction makes it active and (re)arms a one-shot idle timer. Timers
//! are spawned tasks that report back through a channel; every arm bumps a
//! generation counter so an expiry that raced with a cancel is discarded.

pub mod icons;

pub use icons::{visible_icons, IconContext, TileIcon};

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::directory::TileId;
use crate::error::{AppError, Result};

/// Idle timer expiry delivered to the coordinator queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileExpiry {
    pub tile: TileId,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TileActivity {
    active: bool,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl TileActivity {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Activity state of every populated tile
pub struct TileBoard {
    tiles: HashMap<TileId, TileActivity>,
    dwell: Duration,
    next_generation: u64,
    expiry_tx: mpsc::Sender<TileExpiry>,
}

impl TileBoard {
    pub fn new(dwell: Duration, expiry_tx: mpsc::Sender<TileExpiry>) -> Self {
        Self {
            tiles: HashMap::new(),
            dwell,
            next_generation: 0,
            expiry_tx,
        }
    }

    /// Start tracking a tile that just received a stream (idle)
    pub fn populate(&mut self, tile: TileId) {
        self.tiles.entry(tile).or_default();
    }

    pub fn is_populated(&self, tile: TileId) -> bool {
        self.tiles.contains_key(&tile)
    }

    pub fn is_active(&self, tile: TileId) -> bool {
        self.tiles.get(&tile).is_some_and(|state| state.active)
    }

    /// Whether an idle timer is armed for `tile`
    pub fn has_pending_timer(&self, tile: TileId) -> bool {
        self.tiles
            .get(&tile)
            .and_then(|state| state.timer.as_ref())
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Register an interaction: cancel the pending timer, arm a new one
    ///
    /// Returns `true` when the tile went from idle to active.
    pub fn interact(&mut self, tile: TileId) -> Result<bool> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let dwell = self.dwell;
        let tx = self.expiry_tx.clone();

        let state = self
            .tiles
            .get_mut(&tile)
            .ok_or(AppError::TileNotPopulated(tile))?;
        state.cancel_timer();

        let became_active = !state.active;
        state.active = true;
        state.generation = generation;
        let deadline = Instant::now() + dwell;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(TileExpiry { tile, generation }).await;
        }));

        trace!(%tile, generation, "Idle timer armed");
        Ok(became_active)
    }

    /// Apply a timer expiry; returns `true` when the tile went idle
    pub fn expire(&mut self, expiry: TileExpiry) -> bool {
        let Some(state) = self.tiles.get_mut(&expiry.tile) else {
            debug!(tile = %expiry.tile, "Expiry for released tile ignored");
            return false;
        };
        if state.generation != expiry.generation || !state.active {
            trace!(tile = %expiry.tile, "Stale expiry ignored");
            return false;
        }

        state.active = false;
        state.timer = None;
        true
    }

    /// Stop tracking a tile whose stream ended
    pub fn teardown(&mut self, tile: TileId) -> bool {
        match self.tiles.remove(&tile) {
            Some(mut state) => {
                state.cancel_timer();
                true
            }
            None => false,
        }
    }

    pub fn populated(&self) -> impl Iterator<Item = TileId> + '_ {
        self.tiles.keys().copied()
    }
}

impl Drop for TileBoard {
    fn drop(&mut self) {
        for state in self.tiles.values_mut() {
            state.cancel_timer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    const DWELL: Duration = Duration::from_millis(3000);

    fn board() -> (TileBoard, mpsc::Receiver<TileExpiry>) {
        let (tx, rx) = mpsc::channel(16);
        (TileBoard::new(DWELL, tx), rx)
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_goes_idle_after_dwell() {
        let (mut board, mut rx) = board();
        let tile = TileId::remote(1);
        board.populate(tile);

        assert!(board.interact(tile).unwrap());
        tokio::time::advance(Duration::from_millis(2999)).await;
        settle().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(board.is_active(tile));

        tokio::time::advance(Duration::from_millis(2)).await;
        let expiry = rx.recv().await.unwrap();
        assert!(board.expire(expiry));
        assert!(!board.is_active(tile));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interaction_resets_window() {
        let (mut board, mut rx) = board();
        let tile = TileId::LOCAL_PRIMARY;
        board.populate(tile);

        board.interact(tile).unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(!board.interact(tile).unwrap());

        // t = 3500: the first timer would have fired by now
        tokio::time::advance(Duration::from_millis(2500)).await;
        settle().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        // t = 4001
        tokio::time::advance(Duration::from_millis(501)).await;
        let expiry = rx.recv().await.unwrap();
        assert!(board.expire(expiry));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_ignored() {
        let (mut board, _rx) = board();
        let tile = TileId::remote(2);
        board.populate(tile);
        board.interact(tile).unwrap();
        board.interact(tile).unwrap();

        assert!(!board.expire(TileExpiry { tile, generation: 1 }));
        assert!(board.is_active(tile));
        assert!(board.expire(TileExpiry { tile, generation: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_timer() {
        let (mut board, mut rx) = board();
        let tile = TileId::remote(3);
        board.populate(tile);
        board.interact(tile).unwrap();
        assert!(board.has_pending_timer(tile));

        assert!(board.teardown(tile));
        tokio::time::advance(DWELL * 2).await;
        settle().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(!board.is_populated(tile));
    }

    #[tokio::test]
    async fn test_interact_requires_population() {
        let (mut board, _rx) = board();
        let err = board.interact(TileId::remote(4)).unwrap_err();
        assert!(matches!(err, AppError::TileNotPopulated(_)));
    }
}
