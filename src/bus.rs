// MIT License - Copyright (c) 2026 Peter Wright

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{DeviceKey, Message};

/// Outcome of a listener callback. Errors are logged and otherwise ignored.
pub type ListenerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receives notifications for one `(integration id, action)` key.
///
/// Called on the connection's read task, so implementations must not block.
pub trait Listener: Send + Sync {
    fn on_message(&self, message: &Message) -> ListenerResult;

    /// A closed listener is dropped from the bus after the next delivery.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> Listener for F
where
    F: Fn(&Message) -> ListenerResult + Send + Sync,
{
    fn on_message(&self, message: &Message) -> ListenerResult {
        self(message)
    }
}

/// Forwards messages into an unbounded channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Listener for ChannelListener {
    fn on_message(&self, message: &Message) -> ListenerResult {
        self.tx.send(message.clone())?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Identifies one registration; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    key: DeviceKey,
}

impl SubscriptionHandle {
    pub fn key(&self) -> DeviceKey {
        self.key
    }
}

type Entry = (u64, Arc<dyn Listener>);

/// Listener table keyed by device address. Survives reconnects.
#[derive(Default)]
pub struct NotificationBus {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<DeviceKey, Vec<Entry>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, key: DeviceKey, listener: Arc<dyn Listener>) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push((id, listener));
        debug!("Subscribed listener {} to {}", id, key);
        SubscriptionHandle { id, key }
    }

    /// Returns `false` when the handle was already removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = listeners.get_mut(&handle.key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != handle.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&handle.key);
        }
        removed
    }

    pub fn listener_count(&self, key: DeviceKey) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map_or(0, Vec::len)
    }

    /// Deliver `message` to every listener on its key, in registration order.
    ///
    /// Returns the number of listeners that accepted the message.
    pub fn publish(&self, message: &Message) -> usize {
        let key = message.key();
        let snapshot: Vec<Entry> = match self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            Some(entries) => entries.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, listener) in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_message(message))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!("Listener {} on {} failed: {}", id, key, e),
                Err(_) => warn!("Listener {} on {} panicked", id, key),
            }
            if listener.is_closed() {
                closed.push(SubscriptionHandle { id: *id, key });
            }
        }
        for handle in closed {
            debug!("Dropping closed listener {} on {}", handle.id, key);
            self.unsubscribe(handle);
        }
        delivered
    }
}
