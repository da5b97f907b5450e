// MIT License - Copyright (c) 2026 Peter Wright

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

use crate::constants::{MAX_LINE_LEN, READ_SIZE};

/// Buffered reader that yields CR LF terminated lines and can also scan for
/// unterminated prompts during login.
pub(crate) struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(READ_SIZE),
        }
    }

    /// Read one chunk into the buffer. `Ok(false)` on EOF.
    async fn fill(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; READ_SIZE];
        let n = self.inner.read(&mut chunk).await?;
        if n == 0 {
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        if self.buf.len() > MAX_LINE_LEN && !self.buf.contains(&b'\n') {
            warn!("Discarding {} bytes without line terminator", self.buf.len());
            self.buf.clear();
        }
        Ok(true)
    }

    /// Read until one of `markers` appears and consume input up to and
    /// including it. Returns the index of the marker that matched first.
    pub async fn read_until_any(&mut self, markers: &[&[u8]]) -> io::Result<usize> {
        loop {
            if let Some((index, end)) = find_first(&self.buf, markers) {
                self.buf.drain(..end);
                return Ok(index);
            }
            if !self.fill().await? {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
        }
    }

    /// Next complete line without its terminator; `None` on EOF.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                return Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()));
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }
}

/// Earliest occurrence of any marker: (marker index, end offset).
fn find_first(buf: &[u8], markers: &[&[u8]]) -> Option<(usize, usize)> {
    markers
        .iter()
        .enumerate()
        .filter(|(_, marker)| !marker.is_empty())
        .filter_map(|(index, marker)| {
            buf.windows(marker.len())
                .position(|window| window == *marker)
                .map(|start| (start, index, start + marker.len()))
        })
        .min()
        .map(|(_, index, end)| (index, end))
}
