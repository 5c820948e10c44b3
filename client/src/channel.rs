//! Best-effort broadcast between the two peers of a session.
//!
//! Publishing never blocks and never waits for delivery. Messages can be lost
//! or reordered; the protocol repairs itself by resending state every tick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use proto::{Envelope, PlayerId, SyncMessage};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, Result};

/// Raw topic membership
pub trait Transport: Send {
    fn topic(&self) -> &str;

    /// Deliver to every other member. Never blocks.
    fn publish(&self, bytes: Vec<u8>) -> Result<()>;

    /// Next pending payload, without waiting
    fn try_recv(&mut self) -> Option<Vec<u8>>;

    /// Stop sending and receiving. Idempotent.
    fn leave(&mut self);
}

// ============================================================================
// In-memory hub
// ============================================================================

#[derive(Debug)]
struct Packet {
    origin: u64,
    bytes: Vec<u8>,
}

/// Named topics living in this process
#[derive(Clone)]
pub struct MemoryHub {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Arc<Packet>>>>>,
    next_member: Arc<AtomicU64>,
    capacity: usize,
}

impl MemoryHub {
    /// `capacity` bounds each member's queue; overflow drops the oldest
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            next_member: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<Arc<Packet>>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn join(&self, topic: &str) -> HubChannel {
        let sender = self
            .topics()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();
        let member = self.next_member.fetch_add(1, Ordering::Relaxed);
        debug!(topic, member, "joined topic");
        HubChannel {
            hub: self.clone(),
            topic: topic.to_string(),
            member,
            rx: Some(sender.subscribe()),
            sender,
        }
    }

    /// Members currently on a topic
    pub fn members(&self, topic: &str) -> usize {
        self.topics()
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn prune(&self, topic: &str) {
        let mut topics = self.topics();
        if topics.get(topic).is_some_and(|s| s.receiver_count() == 0) {
            topics.remove(topic);
            debug!(topic, "topic closed");
        }
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new(64)
    }
}

/// One member's handle on a [`MemoryHub`] topic
pub struct HubChannel {
    hub: MemoryHub,
    topic: String,
    member: u64,
    sender: broadcast::Sender<Arc<Packet>>,
    rx: Option<broadcast::Receiver<Arc<Packet>>>,
}

impl Transport for HubChannel {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, bytes: Vec<u8>) -> Result<()> {
        if self.rx.is_none() {
            return Err(ClientError::Channel {
                topic: self.topic.clone(),
                reason: "already left".to_string(),
            });
        }
        let packet = Arc::new(Packet {
            origin: self.member,
            bytes,
        });
        // Nobody else listening is not a failure for fire-and-forget
        if self.sender.send(packet).is_err() {
            trace!(topic = %self.topic, "published to empty topic");
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.try_recv() {
                Ok(packet) if packet.origin == self.member => continue,
                Ok(packet) => return Some(packet.bytes.clone()),
                Err(broadcast::error::TryRecvError::Lagged(dropped)) => {
                    debug!(topic = %self.topic, dropped, "receive queue overflowed");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    fn leave(&mut self) {
        if self.rx.take().is_some() {
            debug!(topic = %self.topic, member = self.member, "left topic");
            self.hub.prune(&self.topic);
        }
    }
}

impl Drop for HubChannel {
    fn drop(&mut self) {
        self.leave();
    }
}

// ============================================================================
// Typed channel
// ============================================================================

/// [`SyncMessage`] framing on top of a [`Transport`]
pub struct SyncChannel<T> {
    me: PlayerId,
    transport: T,
}

impl<T: Transport> SyncChannel<T> {
    pub fn new(me: PlayerId, transport: T) -> Self {
        Self { me, transport }
    }

    pub fn topic(&self) -> &str {
        self.transport.topic()
    }

    /// Fire and forget. Failures are logged and the message is dropped.
    pub fn send(&self, message: SyncMessage) {
        let kind = message.kind();
        let bytes = match Envelope::new(self.me.clone(), message).to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(?kind, error = %e, "failed to encode sync message");
                return;
            }
        };
        if let Err(e) = self.transport.publish(bytes) {
            debug!(?kind, error = %e, "dropped sync message");
        }
    }

    /// Everything that arrived since the last call. Undecodable payloads are skipped.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut received = Vec::new();
        while let Some(bytes) = self.transport.try_recv() {
            match Envelope::from_bytes(&bytes) {
                Ok(envelope) => received.push(envelope),
                Err(e) => warn!(topic = %self.transport.topic(), error = %e, "bad sync payload"),
            }
        }
        received
    }

    pub fn leave(&mut self) {
        self.transport.leave();
    }
}
