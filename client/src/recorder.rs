//! Best-effort persistence of a running match.
//!
//! The authority hands table snapshots to a background task that writes the
//! score and the game state row. The frame loop never waits on the store,
//! and a failed write is logged and skipped.

use game_core::TableState;
use lobby::{Backend, Matchmaker};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

pub struct MatchRecorder<B: Backend> {
    tx: mpsc::UnboundedSender<TableState>,
    task: JoinHandle<Matchmaker<B>>,
}

impl<B: Backend> MatchRecorder<B> {
    /// Take over the authority's matchmaker until [`finish`](Self::finish)
    pub fn spawn(matchmaker: Matchmaker<B>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_loop(matchmaker, rx));
        Self { tx, task }
    }

    /// Queue a snapshot. Never blocks.
    pub fn record(&self, table: &TableState) {
        if self.tx.send(table.clone()).is_err() {
            debug!("match recorder already stopped");
        }
    }

    /// Flush what is queued and hand the matchmaker back
    pub async fn finish(self) -> Result<Matchmaker<B>> {
        drop(self.tx);
        Ok(self.task.await?)
    }
}

async fn write_loop<B: Backend>(
    mut matchmaker: Matchmaker<B>,
    mut rx: mpsc::UnboundedReceiver<TableState>,
) -> Matchmaker<B> {
    while let Some(mut table) = rx.recv().await {
        // Only the newest snapshot matters
        while let Ok(newer) = rx.try_recv() {
            table = newer;
        }
        if let Err(e) = matchmaker.record_score(&table.score).await {
            warn!(error = %e, "could not persist score");
        }
        if let Err(e) = matchmaker.save_game_state(&table).await {
            warn!(error = %e, "could not persist game state");
        }
    }
    matchmaker
}
