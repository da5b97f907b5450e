// MIT License - Copyright (c) 2026 Peter Wright

use std::time::Duration;

/// Connection lifecycle events emitted by the bridge.
///
/// Users subscribe via `bridge.events()` to receive a
/// `tokio::sync::broadcast::Receiver<BridgeEvent>`. The first session is
/// already Ready when `connect` returns, so only later transitions are
/// events. Device notifications go through the notification bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Ready session lost; pending queries have been failed
    Disconnected,
    /// About to retry after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// A new session is ready. Re-issue any state queries.
    Reconnected,
    /// Login failed on reconnect (rejected or timed out); no further retries
    AuthFailed,
    /// `close()` completed
    Closed,
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<BridgeEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<BridgeEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
