// MIT License - Copyright (c) 2026 Peter Wright

use std::fmt;
use std::io;

use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, error, info, warn};

use crate::bus::NotificationBus;
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::error::{BridgeErrorCode, LutronError, Result};
use crate::protocol::{Operation, decode, strip_prompt};
use crate::transport::handshake;
use crate::transport::reader::LineReader;

/// Connection lifecycle.
///
/// `Connecting → Authenticating → Ready`, back to `Connecting` when a ready
/// session drops, `Closing → Closed` on `close()`. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Ready,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// A logged-in socket.
pub(crate) struct Session {
    pub id: u64,
    pub reader: LineReader<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
}

/// Why a session stopped.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    Eof,
    ReadFailed(io::Error),
    WriteFailed(io::Error),
    WriterGone,
    Cancelled,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("closed by bridge"),
            Self::ReadFailed(e) => write!(f, "read error: {}", e),
            Self::WriteFailed(e) => write!(f, "write error: {}", e),
            Self::WriterGone => f.write_str("writer task ended"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Open the TCP connection. Pair with [`authenticate`].
pub(crate) async fn open_socket(config: &BridgeConfig) -> Result<TcpStream> {
    let addr = config.addr();
    info!("Connecting to bridge at {}", addr);
    let stream = TcpStream::connect(&addr).await.map_err(|source| {
        error!("TCP connect failed: {}", source);
        LutronError::Connection {
            addr: addr.clone(),
            source,
        }
    })?;
    let _ = stream.set_nodelay(true);
    debug!("TCP socket connected");
    Ok(stream)
}

/// Log in on a freshly opened socket.
pub(crate) async fn authenticate(
    stream: TcpStream,
    config: &BridgeConfig,
    id: u64,
) -> Result<Session> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = LineReader::new(read_half);
    handshake::login(&mut reader, &mut writer, config).await?;
    info!("Session {} logged in", id);
    Ok(Session { id, reader, writer })
}

/// Read lines until the socket ends, routing each one.
pub(crate) async fn read_loop<R: AsyncRead + Unpin>(
    reader: &mut LineReader<R>,
    dispatcher: &Dispatcher,
    bus: &NotificationBus,
) -> SessionEnd {
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => route_line(&line, dispatcher, bus),
            Ok(None) => return SessionEnd::Eof,
            Err(e) => return SessionEnd::ReadFailed(e),
        }
    }
}

/// Decode one line and hand it to the pending query or the bus.
pub(crate) fn route_line(line: &str, dispatcher: &Dispatcher, bus: &NotificationBus) {
    let line = strip_prompt(line);
    if line.is_empty() {
        return;
    }
    debug!("Received: {}", line);

    let message = match decode(line) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping malformed line {:?}: {}", line, e);
            return;
        }
    };

    if message.operation == Operation::Error {
        match BridgeErrorCode::from_code(message.action) {
            Some(code) => warn!("Bridge reported error {}", code),
            None => warn!("Bridge reported unknown error {}", message.action),
        }
    }

    if let Some(message) = dispatcher.complete(message) {
        bus.publish(&message);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::AsyncWriteExt;
    use tokio::time::Duration;

    use super::*;
    use crate::bus::ChannelListener;
    use crate::protocol::{DeviceKey, MessageKind};

    #[tokio::test]
    async fn test_read_loop_routes_and_survives_garbage() {
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.open_session(1);
        let bus = NotificationBus::new();
        let (listener, mut rx) = ChannelListener::new();
        bus.subscribe(DeviceKey::new(4, 1), Arc::new(listener));
        let pending = dispatcher
            .register(DeviceKey::new(5, 1), "?OUTPUT,5,1".to_string())
            .unwrap();

        let (client, mut server) = tokio::io::duplex(256);
        server
            .write_all(b"GNET> \r\n~OUTP\r\n~OUTPUT,4,1,50\r\n~OUTPUT,5,1,20\r\n~ERROR,2\r\n")
            .await
            .unwrap();
        drop(server);

        let mut reader = LineReader::new(client);
        let end = read_loop(&mut reader, &dispatcher, &bus).await;
        assert!(matches!(end, SessionEnd::Eof));

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.kind, MessageKind::Notification);
        assert_eq!(notification.level().unwrap().percent(), 50);
        assert!(rx.try_recv().is_err());

        let reply = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.kind, MessageKind::QueryReply);
        assert_eq!(reply.level().unwrap().percent(), 20);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Closed.is_terminal());
        assert!(!SessionState::Closing.is_terminal());
        assert!(!SessionState::Ready.is_terminal());
    }
}
