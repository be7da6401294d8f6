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

//! Process-local transport over in-memory channels.
//!
//! A [`MemoryNetwork`] is a hub of nodes with explicit neighbor lists.
//! It backs this crate's integration tests and is useful for testing
//! downstream code without real I/O.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fnv::FnvHashMap;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;

use crate::error::{LookupError, SendError};
use crate::protocol::NodeId;
use crate::transport::{Peer, Subscription, Transport};

/// A neighbor handle on the memory network. The id is all there is to it.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    id: NodeId,
}

impl MemoryPeer {
    fn new(id: NodeId) -> Self {
        MemoryPeer { id }
    }
}

impl Peer for MemoryPeer {
    fn id(&self) -> &NodeId {
        &self.id
    }
}

#[derive(Default)]
struct NodeSlot {
    frames: Option<mpsc::UnboundedSender<Bytes>>,
    peer_updates: Option<mpsc::UnboundedSender<Vec<MemoryPeer>>>,
    neighbors: Vec<NodeId>,
    detached: bool,
    lookup_poisoned: bool,
}

#[derive(Default)]
struct Hub {
    nodes: Mutex<FnvHashMap<NodeId, NodeSlot>>,
    sends: AtomicUsize,
}

/// Hub connecting any number of [`MemoryTransport`]s.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<Hub>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        MemoryNetwork::default()
    }

    /// Registers `id` and returns its transport in push mode: the
    /// subscription carries a peer-update stream fed by
    /// [`set_neighbors`](MemoryNetwork::set_neighbors).
    pub fn transport(&self, id: NodeId) -> MemoryTransport {
        self.register(&id);
        MemoryTransport {
            id,
            hub: Arc::clone(&self.hub),
            pull: false,
        }
    }

    /// Registers `id` and returns its transport in legacy pull mode: no
    /// peer-update stream, neighbors are enumerated through `lookup`.
    pub fn pull_transport(&self, id: NodeId) -> MemoryTransport {
        self.register(&id);
        MemoryTransport {
            id,
            hub: Arc::clone(&self.hub),
            pull: true,
        }
    }

    /// Replaces the neighbor list of `id`, notifying a push-mode
    /// subscriber if one is attached.
    pub fn set_neighbors(&self, id: &NodeId, neighbors: Vec<NodeId>) {
        let mut nodes = self.hub.nodes.lock();
        let slot = nodes.entry(id.clone()).or_default();
        slot.neighbors = neighbors;
        if let Some(updates) = &slot.peer_updates {
            let peers = slot.neighbors.iter().cloned().map(MemoryPeer::new).collect();
            let _ = updates.unbounded_send(peers);
        }
    }

    /// Makes every send to `id` fail with [`SendError::Unreachable`].
    pub fn detach(&self, id: &NodeId) {
        if let Some(slot) = self.hub.nodes.lock().get_mut(id) {
            slot.detached = true;
        }
    }

    /// Makes `id`'s lookups fail until reset.
    pub fn poison_lookup(&self, id: &NodeId, poisoned: bool) {
        if let Some(slot) = self.hub.nodes.lock().get_mut(id) {
            slot.lookup_poisoned = poisoned;
        }
    }

    /// Delivers a raw frame straight into `id`'s inbound stream, as if a
    /// neighbor had sent it. Returns whether `id` was subscribed.
    pub fn inject(&self, id: &NodeId, frame: Bytes) -> bool {
        let nodes = self.hub.nodes.lock();
        match nodes.get(id).and_then(|slot| slot.frames.as_ref()) {
            Some(frames) => frames.unbounded_send(frame).is_ok(),
            None => false,
        }
    }

    /// Total number of frames successfully handed off since creation.
    pub fn send_count(&self) -> usize {
        self.hub.sends.load(Ordering::SeqCst)
    }

    fn register(&self, id: &NodeId) {
        self.hub.nodes.lock().entry(id.clone()).or_default();
    }
}

/// One node's endpoint on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryTransport {
    id: NodeId,
    hub: Arc<Hub>,
    pull: bool,
}

#[async_trait]
impl Transport for MemoryTransport {
    type Peer = MemoryPeer;

    async fn send(&self, frame: Bytes, peer: &MemoryPeer) -> Result<(), SendError> {
        let frames = {
            let nodes = self.hub.nodes.lock();
            match nodes.get(peer.id()) {
                Some(slot) if !slot.detached => slot.frames.clone(),
                _ => None,
            }
        };
        let frames = frames.ok_or(SendError::Unreachable)?;
        frames
            .unbounded_send(frame)
            .map_err(|_| SendError::Unreachable)?;
        self.hub.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> Subscription<MemoryPeer> {
        let (frame_tx, frame_rx) = mpsc::unbounded();
        let mut nodes = self.hub.nodes.lock();
        let slot = nodes.entry(self.id.clone()).or_default();
        slot.frames = Some(frame_tx);
        slot.detached = false;

        let peer_updates = if self.pull {
            None
        } else {
            let (update_tx, update_rx) = mpsc::unbounded();
            // Seed the subscriber with the current neighbor set.
            let initial = slot.neighbors.iter().cloned().map(MemoryPeer::new).collect();
            let _ = update_tx.unbounded_send(initial);
            slot.peer_updates = Some(update_tx);
            Some(update_rx.boxed())
        };

        Subscription {
            frames: frame_rx.boxed(),
            peer_updates,
        }
    }

    fn lookup(&self) -> Option<BoxFuture<'static, Result<Vec<MemoryPeer>, LookupError>>> {
        if !self.pull {
            return None;
        }
        let hub = Arc::clone(&self.hub);
        let id = self.id.clone();
        Some(
            async move {
                let nodes = hub.nodes.lock();
                let slot = nodes
                    .get(&id)
                    .ok_or_else(|| LookupError::new("node not registered"))?;
                if slot.lookup_poisoned {
                    return Err(LookupError::new("lookup poisoned"));
                }
                Ok(slot.neighbors.iter().cloned().map(MemoryPeer::new).collect())
            }
            .boxed(),
        )
    }
}
