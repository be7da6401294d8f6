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

//! The abstract boundary between the engine and whatever actually moves
//! bytes between neighbors.

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::{LookupError, SendError};
use crate::protocol::NodeId;

/// A reachable neighbor: a stable id plus whatever handle the transport
/// needs to address it. Everything beyond the id is opaque to the engine.
pub trait Peer: Clone + Send + Sync + 'static {
    fn id(&self) -> &NodeId;
}

/// The inbound side of a transport, handed out by [`Transport::subscribe`].
///
/// Dropping the subscription is the unsubscribe: the engine drops it when
/// it closes, and the transport should stop delivering.
pub struct Subscription<P> {
    /// Raw frames arriving from neighbors.
    pub frames: BoxStream<'static, Bytes>,

    /// Whole-snapshot replacements of the neighbor set, emitted whenever
    /// the transport knows the set changed (including once on subscribe).
    /// Transports without such a push channel leave this `None` and must
    /// implement [`Transport::lookup`] instead.
    pub peer_updates: Option<BoxStream<'static, Vec<P>>>,
}

/// The primitives the engine consumes. `send` success means local handoff
/// only; there is no acknowledgement from the neighbor.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Peer: Peer;

    /// Hands one encoded frame to a neighbor.
    async fn send(&self, frame: Bytes, peer: &Self::Peer) -> Result<(), SendError>;

    /// Registers the engine for inbound frames and, if supported, for
    /// neighbor-set changes.
    fn subscribe(&self) -> Subscription<Self::Peer>;

    /// Legacy on-demand neighbor enumeration, invoked before each fan-out
    /// when the transport offers no peer-update stream.
    fn lookup(&self) -> Option<BoxFuture<'static, Result<Vec<Self::Peer>, LookupError>>> {
        None
    }
}
