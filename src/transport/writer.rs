// MIT License - Copyright (c) 2026 Peter Wright

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::constants::LINE_END;
use crate::protocol::{Command, encode};

/// An encoded line waiting for the socket, tagged with the session that
/// queued it.
#[derive(Debug, Clone)]
pub(crate) struct Outbound {
    pub line: String,
    pub session: u64,
}

pub(crate) type OutboundQueue = Arc<Mutex<mpsc::Receiver<Outbound>>>;

/// Per-session writer settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WriterOptions {
    pub session: u64,
    pub keepalive: Option<Duration>,
    pub spacing: Option<Duration>,
}

/// Drain the outbound queue onto `sink` until cancelled or a write fails.
///
/// The queue outlives sessions; whoever holds its lock is the only writer.
/// Lines from other sessions are dropped. On cancel the socket is shut down.
pub(crate) async fn run_writer<W>(
    queue: OutboundQueue,
    mut sink: W,
    options: WriterOptions,
    cancel: CancellationToken,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut rx = queue.lock().await;
    let mut keepalive = options.keepalive.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut last_write: Option<Instant> = None;

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Writer for session {} cancelled", options.session);
                let _ = sink.shutdown().await;
                return Ok(());
            }
            _ = next_tick(&mut keepalive) => encode(&Command::ping()),
            outbound = rx.recv() => match outbound {
                Some(outbound) if outbound.session == options.session => outbound.line,
                Some(outbound) => {
                    debug!(
                        "Dropping line from session {} (current {}): {}",
                        outbound.session, options.session, outbound.line
                    );
                    continue;
                }
                None => return Ok(()),
            },
        };

        if let (Some(spacing), Some(last)) = (options.spacing, last_write) {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.shutdown().await;
                    return Ok(());
                }
                _ = sleep_until(last + spacing) => {}
            }
        }

        debug!("Sending: {}", line);
        // A peer that stops reading must not hold up cancellation.
        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            written = write_line(&mut sink, &line) => Some(written),
        };
        match written {
            None => {
                debug!("Writer for session {} cancelled mid-write", options.session);
                let _ = sink.shutdown().await;
                return Ok(());
            }
            Some(Err(e)) => {
                error!("Failed to write line: {}", e);
                return Err(e);
            }
            Some(Ok(())) => last_write = Some(Instant::now()),
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(sink: &mut W, line: &str) -> io::Result<()> {
    sink.write_all(line.as_bytes()).await?;
    sink.write_all(LINE_END.as_bytes()).await?;
    sink.flush().await
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
