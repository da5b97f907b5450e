// MIT License - Copyright (c) 2026 Peter Wright

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::time::{Duration, timeout};
use tracing::debug;

use crate::error::{LutronError, Result};
use crate::protocol::{DeviceKey, Message, MessageKind, Sigil};

/// Why outstanding queries are being failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailReason {
    ConnectionLost,
    Closed,
}

impl FailReason {
    fn to_error(self) -> LutronError {
        match self {
            Self::ConnectionLost => LutronError::ConnectionLost,
            Self::Closed => LutronError::Closed,
        }
    }
}

struct PendingEntry {
    token: u64,
    session: u64,
    tx: oneshot::Sender<Result<Message>>,
}

#[derive(Default)]
struct PendingTable {
    /// Session accepting queries; `None` while not Ready.
    current_session: Option<u64>,
    next_token: u64,
    entries: HashMap<DeviceKey, PendingEntry>,
}

/// Correlates query replies with the callers waiting on them.
///
/// At most one query is outstanding per `(integration id, action)`; a second
/// one on a busy key is rejected with [`LutronError::QueryInFlight`].
#[derive(Default)]
pub struct Dispatcher {
    table: Mutex<PendingTable>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accepting queries for `session`. Anything left over from an
    /// earlier session fails with `ConnectionLost`.
    pub(crate) fn open_session(&self, session: u64) -> usize {
        let stale = {
            let mut table = self.table();
            table.current_session = Some(session);
            let stale: Vec<DeviceKey> = table
                .entries
                .iter()
                .filter(|(_, entry)| entry.session != session)
                .map(|(key, _)| *key)
                .collect();
            stale
                .into_iter()
                .filter_map(|key| table.entries.remove(&key))
                .collect::<Vec<_>>()
        };
        let count = stale.len();
        for entry in stale {
            let _ = entry.tx.send(Err(LutronError::ConnectionLost));
        }
        count
    }

    /// Stop accepting queries and fail everything outstanding.
    pub(crate) fn close_session(&self, reason: FailReason) -> usize {
        let drained: Vec<PendingEntry> = {
            let mut table = self.table();
            table.current_session = None;
            table.entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        if count > 0 {
            debug!("Failing {} pending queries: {:?}", count, reason);
        }
        for entry in drained {
            let _ = entry.tx.send(Err(reason.to_error()));
        }
        count
    }

    pub fn current_session(&self) -> Option<u64> {
        self.table().current_session
    }

    pub fn pending_count(&self) -> usize {
        self.table().entries.len()
    }

    /// Register a query for `key` against the current session.
    pub(crate) fn register(self: &Arc<Self>, key: DeviceKey, command: String) -> Result<PendingQuery> {
        let (tx, rx) = oneshot::channel();
        let (token, session) = {
            let mut table = self.table();
            let session = table.current_session.ok_or(LutronError::NotConnected)?;
            if table.entries.contains_key(&key) {
                return Err(LutronError::QueryInFlight {
                    integration_id: key.integration_id,
                    action: key.action,
                });
            }
            table.next_token += 1;
            let token = table.next_token;
            table.entries.insert(key, PendingEntry { token, session, tx });
            (token, session)
        };
        Ok(PendingQuery {
            key,
            token,
            session,
            command,
            rx,
            dispatcher: Arc::clone(self),
            settled: false,
        })
    }

    /// Resolve the pending query matching `message`, if any.
    ///
    /// Returns the message back when nobody was waiting for it, so the
    /// caller can publish it as a notification.
    pub(crate) fn complete(&self, mut message: Message) -> Option<Message> {
        if message.sigil != Sigil::Response {
            return Some(message);
        }
        let entry = self.table().entries.remove(&message.key());
        match entry {
            Some(entry) => {
                message.kind = MessageKind::QueryReply;
                debug!("Resolved query {} (token {})", message.key(), entry.token);
                if let Err(Ok(message)) = entry.tx.send(Ok(message)) {
                    // Waiter gave up between lookup and send.
                    return Some(Message {
                        kind: MessageKind::Notification,
                        ..message
                    });
                }
                None
            }
            None => Some(message),
        }
    }

    fn remove(&self, key: DeviceKey, token: u64) {
        let mut table = self.table();
        if table.entries.get(&key).is_some_and(|entry| entry.token == token) {
            table.entries.remove(&key);
        }
    }
}

/// Handle for an outstanding query.
///
/// Dropping the handle (or calling [`cancel`](Self::cancel)) withdraws the
/// query; a late reply is then delivered to the bus as a notification.
pub struct PendingQuery {
    key: DeviceKey,
    token: u64,
    session: u64,
    command: String,
    rx: oneshot::Receiver<Result<Message>>,
    dispatcher: Arc<Dispatcher>,
    settled: bool,
}

impl PendingQuery {
    pub fn key(&self) -> DeviceKey {
        self.key
    }

    pub(crate) fn session(&self) -> u64 {
        self.session
    }

    /// Wait for the reply, or fail with `QueryTimeout` after `limit`.
    pub async fn wait(mut self, limit: Duration) -> Result<Message> {
        match timeout(limit, &mut self.rx).await {
            Ok(Ok(result)) => {
                self.settled = true;
                result
            }
            Ok(Err(_)) => {
                self.settled = true;
                Err(LutronError::ChannelClosed)
            }
            Err(_) => {
                debug!("Query timeout: {}", self.command);
                Err(LutronError::QueryTimeout {
                    command: self.command.clone(),
                })
            }
        }
    }

    pub fn cancel(self) {}
}

impl Drop for PendingQuery {
    fn drop(&mut self) {
        if !self.settled {
            self.dispatcher.remove(self.key, self.token);
        }
    }
}

impl std::fmt::Debug for PendingQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQuery")
            .field("key", &self.key)
            .field("session", &self.session)
            .field("command", &self.command)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    fn ready_dispatcher() -> Arc<Dispatcher> {
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.open_session(1);
        dispatcher
    }

    #[tokio::test]
    async fn test_reply_resolves_query() {
        let dispatcher = ready_dispatcher();
        let pending = dispatcher
            .register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string())
            .unwrap();
        assert_eq!(pending.session(), 1);

        let reply = decode("~OUTPUT,4,1,75.00").unwrap();
        assert!(dispatcher.complete(reply).is_none());

        let message = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(message.kind, MessageKind::QueryReply);
        assert_eq!(message.level().unwrap().percent(), 75);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_lines_pass_through() {
        let dispatcher = ready_dispatcher();
        let _pending = dispatcher
            .register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string())
            .unwrap();

        let other = decode("~OUTPUT,5,1,10").unwrap();
        let passed = dispatcher.complete(other).unwrap();
        assert_eq!(passed.kind, MessageKind::Notification);

        // Only `~` lines answer queries.
        let echo = decode("#OUTPUT,4,1,10").unwrap();
        assert!(dispatcher.complete(echo).is_some());
        assert_eq!(dispatcher.pending_count(), 1);
    }

    #[test]
    fn test_second_query_on_busy_key_rejected() {
        let dispatcher = ready_dispatcher();
        let _first = dispatcher
            .register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string())
            .unwrap();
        let second = dispatcher.register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string());
        assert!(matches!(
            second,
            Err(LutronError::QueryInFlight { integration_id: 4, action: 1 })
        ));
        assert!(dispatcher
            .register(DeviceKey::new(5, 1), "?OUTPUT,5,1".to_string())
            .is_ok());
    }

    #[test]
    fn test_register_without_session() {
        let dispatcher = Arc::new(Dispatcher::new());
        let result = dispatcher.register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string());
        assert!(matches!(result, Err(LutronError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_session_fails_all_pending() {
        let dispatcher = ready_dispatcher();
        let handles: Vec<PendingQuery> = (1..=3)
            .map(|id| {
                dispatcher
                    .register(DeviceKey::new(id, 1), format!("?OUTPUT,{id},1"))
                    .unwrap()
            })
            .collect();

        assert_eq!(dispatcher.close_session(FailReason::ConnectionLost), 3);
        for handle in handles {
            let result = handle.wait(Duration::from_secs(1)).await;
            assert!(matches!(result, Err(LutronError::ConnectionLost)));
        }
        assert_eq!(dispatcher.current_session(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let dispatcher = ready_dispatcher();
        let pending = dispatcher
            .register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string())
            .unwrap();
        let result = pending.wait(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(LutronError::QueryTimeout { .. })));
        assert_eq!(dispatcher.pending_count(), 0);

        // The late reply becomes a notification.
        let late = decode("~OUTPUT,4,1,75").unwrap();
        assert!(dispatcher.complete(late).is_some());
    }

    #[test]
    fn test_cancel_frees_key() {
        let dispatcher = ready_dispatcher();
        let pending = dispatcher
            .register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string())
            .unwrap();
        pending.cancel();
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(dispatcher
            .register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string())
            .is_ok());
    }

    #[tokio::test]
    async fn test_new_session_fails_stragglers() {
        let dispatcher = ready_dispatcher();
        let pending = dispatcher
            .register(DeviceKey::new(4, 1), "?OUTPUT,4,1".to_string())
            .unwrap();
        assert_eq!(dispatcher.open_session(2), 1);
        let result = pending.wait(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(LutronError::ConnectionLost)));
    }
}
