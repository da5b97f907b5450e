// MIT License - Copyright (c) 2026 Peter Wright

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::constants::{COMMAND_PROMPT, LINE_END, LOGIN_INCORRECT, LOGIN_PROMPT, PASSWORD_PROMPT};
use crate::error::{AuthFailure, LutronError, Result};
use crate::transport::reader::LineReader;

/// Log in and wait for the command prompt.
///
/// Sequence: `login: ` → user → `password: ` → password → `GNET> `.
/// The whole exchange is bounded by `login_timeout`.
pub(crate) async fn login<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut W,
    config: &BridgeConfig,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match timeout(config.login_timeout, exchange(reader, writer, config)).await {
        Ok(result) => result,
        Err(_) => Err(LutronError::Auth(AuthFailure::Timeout)),
    }
}

async fn exchange<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut W,
    config: &BridgeConfig,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    reader.read_until_any(&[LOGIN_PROMPT]).await.map_err(eof_as_lost)?;
    debug!("Sending login");
    send_line(writer, &config.user).await?;

    let matched = reader
        .read_until_any(&[PASSWORD_PROMPT, LOGIN_INCORRECT])
        .await
        .map_err(eof_as_lost)?;
    if matched != 0 {
        return Err(LutronError::Auth(AuthFailure::Rejected));
    }
    debug!("Sending password");
    send_line(writer, &config.password).await?;

    // A second login prompt means the credentials were refused.
    let matched = reader
        .read_until_any(&[COMMAND_PROMPT, LOGIN_INCORRECT, LOGIN_PROMPT])
        .await
        .map_err(eof_as_lost)?;
    if matched != 0 {
        return Err(LutronError::Auth(AuthFailure::Rejected));
    }
    debug!("Command prompt received");
    Ok(())
}

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> Result<()> {
    writer.write_all(format!("{}{}", text, LINE_END).as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn eof_as_lost(e: io::Error) -> LutronError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        LutronError::ConnectionLost
    } else {
        LutronError::Io(e)
    }
}
