// Copyright 2026 Floodcast Contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Error types that can result from the broadcast engine.

use std::io;

use thiserror::Error;

/// Error associated with publishing a packet.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The engine is closed or closing; open it before publishing.
    #[error("engine is not open")]
    NotOpen,
    /// An explicit sequence number must contain at least one byte.
    #[error("seqno must not be empty")]
    EmptySeqno,
    /// The packet could not be encoded for the wire.
    #[error("failed to encode packet: {0}")]
    Codec(#[from] CodecError),
    /// Auto-open was enabled but the implicit open failed.
    #[error("implicit open failed: {0}")]
    Open(#[from] OpenError),
}

/// Error associated with opening the engine.
#[derive(Debug, Error)]
pub enum OpenError {
    /// A close is still in flight; retry once it completes.
    #[error("engine is closing")]
    Closing,
    /// The transport offers neither a peer-update stream nor a lookup.
    #[error("transport offers no peer source")]
    NoPeerSource,
}

/// Error produced by a transport while handing a frame to a neighbor.
///
/// Send failures are per-neighbor and non-fatal; the engine reports them
/// through [`FloodcastEvent::SendError`](crate::FloodcastEvent) and carries
/// on with the remaining neighbors.
#[derive(Debug, Error)]
pub enum SendError {
    /// The peer is not connected or no longer exists.
    #[error("peer is unreachable")]
    Unreachable,
    /// An I/O error on the underlying connection.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Any other transport-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Error produced by a legacy pull-mode peer lookup.
///
/// Cloneable so that callers coalesced onto a single in-flight lookup can
/// all observe the same failure.
#[derive(Debug, Clone, Error)]
#[error("peer lookup failed: {0}")]
pub struct LookupError(pub String);

impl LookupError {
    pub fn new(msg: impl Into<String>) -> Self {
        LookupError(msg.into())
    }
}

/// Error associated with encoding or decoding a packet envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The frame ended in the middle of a field.
    #[error("frame truncated mid-field")]
    Truncated,
    /// A field length prefix was not a valid varint.
    #[error("invalid length prefix")]
    BadLengthPrefix,
    /// Bytes remained after the last field.
    #[error("frame has trailing bytes")]
    TrailingBytes,
    /// A mandatory field was empty.
    #[error("empty {0} field")]
    EmptyField(&'static str),
}
