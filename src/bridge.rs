// MIT License - Copyright (c) 2026 Peter Wright

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::bus::{ChannelListener, Listener, NotificationBus, SubscriptionHandle};
use crate::config::BridgeConfig;
use crate::dispatch::{Dispatcher, FailReason, PendingQuery};
use crate::error::{LutronError, Result};
use crate::event::{BridgeEvent, EventReceiver, EventSender, event_channel};
use crate::protocol::{Command, DeviceKey, Message, encode};
use crate::transport::session::{
    Session, SessionEnd, SessionState, authenticate, open_socket, read_loop,
};
use crate::transport::writer::{Outbound, OutboundQueue, WriterOptions, run_writer};

/// The main public API for talking to a Lutron bridge.
///
/// # Example
///
/// ```no_run
/// use lutron_lan_bridge::{BridgeConfig, Command, Level, LutronBridge};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = BridgeConfig::builder().host("192.168.1.10").build();
///     let bridge = LutronBridge::connect(config).await?;
///
///     let (_handle, mut rx) = bridge.subscribe_channel(4, 1);
///     tokio::spawn(async move {
///         while let Some(message) = rx.recv().await {
///             println!("Output 4 now at {:?}", message.level());
///         }
///     });
///
///     bridge
///         .send_command(&Command::set_level(4, Level::from_percent(50).unwrap(), None, None))
///         .await?;
///     let reply = bridge.send_query(&Command::query_output(4), None).await?;
///     println!("Reply: {:?}", reply);
///
///     tokio::signal::ctrl_c().await?;
///     bridge.close().await?;
///     Ok(())
/// }
/// ```
pub struct LutronBridge {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the public handle and the supervisor task.
struct Shared {
    config: BridgeConfig,
    dispatcher: Arc<Dispatcher>,
    bus: NotificationBus,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: OutboundQueue,
    state: watch::Sender<SessionState>,
    events: EventSender,
    next_session: AtomicU64,
}

impl LutronBridge {
    /// Connect and log in. Returns once the first session is Ready; after
    /// that, drops are recovered in the background.
    pub async fn connect(config: BridgeConfig) -> Result<Self> {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);
        let (events, _) = event_channel(config.event_capacity);
        let (state, _) = watch::channel(SessionState::Connecting);
        let shared = Arc::new(Shared {
            config,
            dispatcher: Arc::new(Dispatcher::new()),
            bus: NotificationBus::new(),
            outbound_tx,
            outbound_rx: Arc::new(tokio::sync::Mutex::new(outbound_rx)),
            state,
            events,
            next_session: AtomicU64::new(0),
        });

        let session = match shared.establish().await {
            Ok(session) => session,
            Err(e) => {
                let state = match e {
                    LutronError::Auth(_) => SessionState::Failed,
                    _ => SessionState::Closed,
                };
                shared.set_state(state);
                return Err(e);
            }
        };
        info!("Connection to bridge successfully established");

        let cancel = CancellationToken::new();
        let supervisor = tokio::spawn(supervise(Arc::clone(&shared), session, cancel.clone()));

        Ok(Self {
            shared,
            cancel,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Subscribe to lifecycle events.
    pub fn events(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// Queue a command without waiting for any reply.
    pub async fn send_command(&self, command: &Command) -> Result<()> {
        self.ensure_open()?;
        let session = self
            .shared
            .dispatcher
            .current_session()
            .ok_or(LutronError::NotConnected)?;
        self.enqueue(encode(command), session).await
    }

    /// Queue a query and return a handle for its reply.
    pub async fn begin_query(&self, command: &Command) -> Result<PendingQuery> {
        self.ensure_open()?;
        let line = encode(command);
        let pending = self.shared.dispatcher.register(command.key(), line.clone())?;
        self.enqueue(line, pending.session()).await?;
        Ok(pending)
    }

    /// Send a query and wait for the reply (`query_timeout` when `None`).
    pub async fn send_query(&self, command: &Command, timeout: Option<Duration>) -> Result<Message> {
        let pending = self.begin_query(command).await?;
        pending
            .wait(timeout.unwrap_or(self.shared.config.query_timeout))
            .await
    }

    pub fn subscribe<L>(&self, integration_id: u32, action: u32, listener: L) -> SubscriptionHandle
    where
        L: Listener + 'static,
    {
        self.shared
            .bus
            .subscribe(DeviceKey::new(integration_id, action), Arc::new(listener))
    }

    /// Subscribe with an unbounded channel as the listener.
    pub fn subscribe_channel(
        &self,
        integration_id: u32,
        action: u32,
    ) -> (SubscriptionHandle, mpsc::UnboundedReceiver<Message>) {
        let (listener, rx) = ChannelListener::new();
        (self.subscribe(integration_id, action, listener), rx)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.shared.bus.unsubscribe(handle)
    }

    pub fn pending_queries(&self) -> usize {
        self.shared.dispatcher.pending_count()
    }

    /// Shut the connection down. Pending queries fail with `Closed`.
    pub async fn close(&self) -> Result<()> {
        let state = self.state();
        if matches!(state, SessionState::Closing | SessionState::Closed) {
            return Ok(());
        }
        info!("Closing bridge connection");
        let failed = state == SessionState::Failed;
        if !failed {
            self.shared.set_state(SessionState::Closing);
        }

        self.cancel.cancel();
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(supervisor) = supervisor {
            if let Err(e) = supervisor.await {
                warn!("Supervisor task ended abnormally: {}", e);
            }
        }
        self.shared.dispatcher.close_session(FailReason::Closed);

        if !failed {
            self.shared.set_state(SessionState::Closed);
            self.shared.emit(BridgeEvent::Closed);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state() {
            SessionState::Closing | SessionState::Closed => Err(LutronError::Closed),
            SessionState::Failed => Err(LutronError::NotConnected),
            _ => Ok(()),
        }
    }

    async fn enqueue(&self, line: String, session: u64) -> Result<()> {
        debug!("Queued: {}", line);
        self.shared
            .outbound_tx
            .send(Outbound { line, session })
            .await
            .map_err(|_| LutronError::ChannelClosed)
    }
}

impl Drop for LutronBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("State {:?} -> {:?}", previous, state);
        }
    }

    fn emit(&self, event: BridgeEvent) {
        let _ = self.events.send(event);
    }

    /// Connect, log in and make the new session current.
    async fn establish(&self) -> Result<Session> {
        self.set_state(SessionState::Connecting);
        let stream = open_socket(&self.config).await?;
        self.set_state(SessionState::Authenticating);
        let id = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        let session = authenticate(stream, &self.config, id).await?;

        let stale = self.dispatcher.open_session(id);
        if stale > 0 {
            warn!("Failed {} queries left over from an earlier session", stale);
        }
        self.set_state(SessionState::Ready);
        Ok(session)
    }

    /// Drive one session until it ends. The reader runs here; the writer
    /// is its own task so slow listeners never stall outbound traffic.
    async fn run_session(&self, session: Session, cancel: &CancellationToken) -> SessionEnd {
        let Session {
            id,
            mut reader,
            writer,
        } = session;
        let session_cancel = cancel.child_token();
        let options = WriterOptions {
            session: id,
            keepalive: self.config.keepalive_interval,
            spacing: self.config.command_spacing,
        };
        let mut writer_task = tokio::spawn(run_writer(
            Arc::clone(&self.outbound_rx),
            writer,
            options,
            session_cancel.clone(),
        ));

        let end = tokio::select! {
            end = read_loop(&mut reader, &self.dispatcher, &self.bus) => end,
            joined = &mut writer_task => {
                return match joined {
                    Ok(Ok(())) => SessionEnd::Cancelled,
                    Ok(Err(e)) => SessionEnd::WriteFailed(e),
                    Err(_) => SessionEnd::WriterGone,
                };
            }
        };
        session_cancel.cancel();
        let _ = writer_task.await;
        end
    }
}

/// Run sessions back to back, reconnecting with backoff after each drop.
async fn supervise(shared: Arc<Shared>, mut session: Session, cancel: CancellationToken) {
    let mut backoff = Backoff::new(
        shared.config.reconnect_delay,
        shared.config.max_reconnect_delay,
    );

    loop {
        let id = session.id;
        let end = shared.run_session(session, &cancel).await;
        if cancel.is_cancelled() {
            debug!("Session {} stopped: {}", id, end);
            shared.dispatcher.close_session(FailReason::Closed);
            return;
        }

        warn!("Session {} lost: {}", id, end);
        shared.dispatcher.close_session(FailReason::ConnectionLost);
        shared.set_state(SessionState::Connecting);
        shared.emit(BridgeEvent::Disconnected);

        session = loop {
            let delay = backoff.next_delay();
            let attempt = backoff.attempt();
            info!("Reconnecting in {:.1}s (attempt {})", delay.as_secs_f64(), attempt);
            shared.emit(BridgeEvent::Reconnecting { attempt, delay });

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(delay) => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = shared.establish() => result,
            };
            match result {
                Ok(session) => break session,
                Err(LutronError::Auth(failure)) => {
                    error!("Reconnect failed: {}; giving up", failure);
                    shared.set_state(SessionState::Failed);
                    shared.emit(BridgeEvent::AuthFailed);
                    return;
                }
                Err(e) => {
                    warn!("Reconnect attempt {} failed: {}", attempt, e);
                    shared.set_state(SessionState::Connecting);
                }
            }
        };

        backoff.reset();
        info!("Reconnected (session {})", session.id);
        shared.emit(BridgeEvent::Reconnected);
    }
}
