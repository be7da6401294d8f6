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

//! Epidemic flooding broadcast over an abstract peer transport.
//!
//! A [`Floodcast`] engine takes a [`Transport`] — a peer directory, a send
//! primitive and an inbound subscription — and guarantees that a packet
//! published at one node reaches every node the peer graph can carry it
//! to, at least once, without re-propagating forever. Each node forwards a
//! novel packet to all neighbors except the one it arrived from and the
//! packet's author, and a bounded dedup cache (size- and age-evicted,
//! LRU-ordered) suppresses the copies that flooding inevitably produces.
//!
//! The engine never interprets packet payloads, offers no ordering across
//! messages and owns no retries: redundancy through other paths is the
//! reliability mechanism.

/// Encodes and decodes the packet envelope.
pub mod protocol;

/// Process-local transport for tests and examples.
pub mod memory;

// The engine itself and its collaborators.
mod config;
mod directory;
mod engine;
mod error;
mod seen_cache;
mod transport;

pub use self::config::{FloodcastConfig, FloodcastConfigBuilder};
pub use self::engine::{Floodcast, FloodcastEvent, FloodcastReceiver, State};
pub use self::error::{CodecError, LookupError, OpenError, PublishError, SendError};
pub use self::protocol::{LengthPrefixCodec, MessageId, NodeId, Packet, PacketCodec};
pub use self::seen_cache::SeenCache;
pub use self::transport::{Peer, Subscription, Transport};
