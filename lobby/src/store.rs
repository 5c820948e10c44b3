//! Row storage with change notifications.
//!
//! The lobby only needs a narrow slice of the hosted database: insert, read,
//! compare-and-swap style conditional updates, conditional deletes, and a
//! filtered change feed per collection. [`Table`] captures that slice and
//! [`MemoryTable`] implements it in-process.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{LobbyError, Result};
use crate::records::{ChallengeRequest, GameStateRow, PresenceRecord, Session};

/// A row type stored in one collection
pub trait Record: Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn key(&self) -> &str;

    /// Validate replacing `old` with `new`. Errors describe why not.
    fn check_update(_old: &Self, _new: &Self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// A committed change to one row
#[derive(Debug, Clone, PartialEq)]
pub enum Change<R> {
    Inserted(R),
    Updated(R),
    Deleted(R),
}

impl<R: Record> Change<R> {
    pub fn row(&self) -> &R {
        match self {
            Change::Inserted(row) | Change::Updated(row) | Change::Deleted(row) => row,
        }
    }
}

/// Which changes a subscriber wants to hear about
#[derive(Clone)]
pub enum Filter<R> {
    All,
    Key(String),
    Where(Arc<dyn Fn(&R) -> bool + Send + Sync>),
}

impl<R: Record> Filter<R> {
    pub fn key(key: impl Into<String>) -> Self {
        Filter::Key(key.into())
    }

    pub fn matching(pred: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        Filter::Where(Arc::new(pred))
    }

    pub fn accepts(&self, row: &R) -> bool {
        match self {
            Filter::All => true,
            Filter::Key(key) => row.key() == key,
            Filter::Where(pred) => pred(row),
        }
    }
}

/// Filtered stream of changes to one collection
pub struct Subscription<R> {
    filter: Filter<R>,
    rx: broadcast::Receiver<Change<R>>,
}

impl<R: Record> Subscription<R> {
    pub fn new(filter: Filter<R>, rx: broadcast::Receiver<Change<R>>) -> Self {
        Self { filter, rx }
    }

    /// Next matching change, or `None` once the feed is gone.
    ///
    /// Notifications are best effort: if this subscriber falls behind, the
    /// skipped changes are lost and the caller sees the next one.
    pub async fn next(&mut self) -> Option<Change<R>> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.filter.accepts(change.row()) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(table = R::TABLE, skipped, "change feed lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// One collection of rows in the storage service
pub trait Table<R: Record>: Send + Sync {
    /// Insert a new row; fails with `Conflict` if the key exists
    fn insert(&self, row: R) -> impl Future<Output = Result<R>> + Send;

    /// Insert or replace a row without conditions
    fn upsert(&self, row: R) -> impl Future<Output = Result<R>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<R>>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<R>>> + Send;

    /// Apply `patch` only if `guard` holds for the row at write time.
    ///
    /// `NotFound` when the row is gone, `Conflict` when the guard fails,
    /// `IllegalTransition` when the patched row breaks the record's rules.
    fn update_if<G, P>(&self, key: &str, guard: G, patch: P) -> impl Future<Output = Result<R>> + Send
    where
        G: FnOnce(&R) -> bool + Send,
        P: FnOnce(&mut R) + Send;

    /// Delete the row only if `guard` holds. Deleting a missing row is `Ok(None)`.
    fn delete_if<G>(&self, key: &str, guard: G) -> impl Future<Output = Result<Option<R>>> + Send
    where
        G: FnOnce(&R) -> bool + Send;

    fn subscribe(&self, filter: Filter<R>) -> Subscription<R>;
}

/// The four collections the lobby works with
pub trait Backend: Send + Sync + 'static {
    type Sessions: Table<Session>;
    type GameStates: Table<GameStateRow>;
    type Presence: Table<PresenceRecord>;
    type Challenges: Table<ChallengeRequest>;

    fn sessions(&self) -> &Self::Sessions;
    fn game_states(&self) -> &Self::GameStates;
    fn presence(&self) -> &Self::Presence;
    fn challenges(&self) -> &Self::Challenges;
}

// ============================================================================
// In-memory implementation
// ============================================================================

const CHANGE_FEED_CAPACITY: usize = 256;

/// In-process table with a broadcast change feed
pub struct MemoryTable<R> {
    rows: Mutex<BTreeMap<String, R>>,
    changes: broadcast::Sender<Change<R>>,
}

impl<R: Record> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> MemoryTable<R> {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            rows: Mutex::new(BTreeMap::new()),
            changes,
        }
    }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<String, R>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Call with the rows lock held so each key's changes go out in commit order
    fn notify(&self, change: Change<R>) {
        // No subscribers is fine
        if self.changes.send(change).is_err() {
            debug!(table = R::TABLE, "change with no subscribers");
        }
    }

    fn conflict(key: &str) -> LobbyError {
        LobbyError::Conflict {
            table: R::TABLE,
            key: key.to_string(),
        }
    }
}

impl<R: Record> Table<R> for MemoryTable<R> {
    async fn insert(&self, row: R) -> Result<R> {
        let mut rows = self.rows();
        if rows.contains_key(row.key()) {
            return Err(Self::conflict(row.key()));
        }
        rows.insert(row.key().to_string(), row.clone());
        self.notify(Change::Inserted(row.clone()));
        Ok(row)
    }

    async fn upsert(&self, row: R) -> Result<R> {
        let mut rows = self.rows();
        let existed = rows.insert(row.key().to_string(), row.clone()).is_some();
        if existed {
            self.notify(Change::Updated(row.clone()));
        } else {
            self.notify(Change::Inserted(row.clone()));
        }
        Ok(row)
    }

    async fn get(&self, key: &str) -> Result<Option<R>> {
        Ok(self.rows().get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<R>> {
        Ok(self.rows().values().cloned().collect())
    }

    async fn update_if<G, P>(&self, key: &str, guard: G, patch: P) -> Result<R>
    where
        G: FnOnce(&R) -> bool + Send,
        P: FnOnce(&mut R) + Send,
    {
        let mut rows = self.rows();
        let current = rows.get_mut(key).ok_or_else(|| LobbyError::NotFound {
            table: R::TABLE,
            key: key.to_string(),
        })?;
        if !guard(current) {
            return Err(Self::conflict(key));
        }
        let mut next = current.clone();
        patch(&mut next);
        R::check_update(current, &next).map_err(|reason| LobbyError::IllegalTransition {
            table: R::TABLE,
            key: key.to_string(),
            reason,
        })?;
        *current = next.clone();
        self.notify(Change::Updated(next.clone()));
        Ok(next)
    }

    async fn delete_if<G>(&self, key: &str, guard: G) -> Result<Option<R>>
    where
        G: FnOnce(&R) -> bool + Send,
    {
        let mut rows = self.rows();
        let allowed = match rows.get(key) {
            None => return Ok(None),
            Some(row) => guard(row),
        };
        if !allowed {
            return Err(Self::conflict(key));
        }
        let removed = rows.remove(key);
        if let Some(row) = &removed {
            self.notify(Change::Deleted(row.clone()));
        }
        Ok(removed)
    }

    fn subscribe(&self, filter: Filter<R>) -> Subscription<R> {
        Subscription::new(filter, self.changes.subscribe())
    }
}

/// All lobby collections held in memory; share it between peers with an `Arc`
#[derive(Default)]
pub struct MemoryBackend {
    sessions: MemoryTable<Session>,
    game_states: MemoryTable<GameStateRow>,
    presence: MemoryTable<PresenceRecord>,
    challenges: MemoryTable<ChallengeRequest>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    type Sessions = MemoryTable<Session>;
    type GameStates = MemoryTable<GameStateRow>;
    type Presence = MemoryTable<PresenceRecord>;
    type Challenges = MemoryTable<ChallengeRequest>;

    fn sessions(&self) -> &Self::Sessions {
        &self.sessions
    }

    fn game_states(&self) -> &Self::GameStates {
        &self.game_states
    }

    fn presence(&self) -> &Self::Presence {
        &self.presence
    }

    fn challenges(&self) -> &Self::Challenges {
        &self.challenges
    }
}
