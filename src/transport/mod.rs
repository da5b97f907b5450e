// MIT License - Copyright (c) 2026 Peter Wright

//! Socket plumbing: line framing, login, the per-session writer and the
//! read loop.

pub(crate) mod handshake;
pub(crate) mod reader;
pub mod session;
pub(crate) mod writer;

pub use session::SessionState;
