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

//! The broadcast engine: lifecycle, publishing, inbound handling and
//! fan-out.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::future::{self, FutureExt};
use futures::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::config::FloodcastConfig;
use crate::directory::{Directory, PullDirectory, PushDirectory};
use crate::error::{CodecError, LookupError, OpenError, PublishError, SendError};
use crate::protocol::{LengthPrefixCodec, MessageId, NodeId, Packet, PacketCodec, Token};
use crate::seen_cache::SeenCache;
use crate::transport::{Peer, Subscription, Transport};

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Events observable on the [`FloodcastReceiver`]. None of these are fatal
/// to the engine; they are informational signals to the host application.
#[derive(Debug)]
pub enum FloodcastEvent {
    /// A novel packet was delivered locally, exactly once per message
    /// identity.
    Message(Packet),
    /// An encoded packet was handed off to the transport for one neighbor.
    Sent { peer: NodeId, message: MessageId },
    /// The transport failed to hand a packet to one neighbor. The
    /// remaining neighbors are unaffected and there is no retry.
    SendError { peer: NodeId, error: SendError },
    /// An inbound frame could not be decoded and was dropped.
    DecodeError(CodecError),
    /// A pull-mode peer lookup failed; the previous snapshot was used.
    LookupError(LookupError),
}

/// An epidemic broadcast engine over an abstract transport.
///
/// Cloning is cheap and every clone drives the same engine instance.
pub struct Floodcast<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Floodcast<T> {
    fn clone(&self) -> Self {
        Floodcast {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Stream of [`FloodcastEvent`]s, the other half of [`Floodcast::new`].
pub struct FloodcastReceiver {
    inner: mpsc::UnboundedReceiver<FloodcastEvent>,
}

impl Stream for FloodcastReceiver {
    type Item = FloodcastEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<FloodcastEvent>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct Inner<T: Transport> {
    transport: Arc<T>,
    codec: Box<dyn PacketCodec>,
    config: RwLock<FloodcastConfig>,
    seen: Mutex<SeenCache<Token>>,
    directory: RwLock<Option<Arc<Directory<T::Peer>>>>,
    lifecycle: Mutex<Lifecycle>,
    events: mpsc::UnboundedSender<FloodcastEvent>,
}

struct Lifecycle {
    state: State,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<T: Transport> Floodcast<T> {
    /// Builds an engine over `transport` with the default wire codec.
    /// Returns the engine together with the stream of its events.
    pub fn new(transport: T, config: FloodcastConfig) -> (Self, FloodcastReceiver) {
        Self::with_codec(transport, config, Box::new(LengthPrefixCodec))
    }

    pub fn with_codec(
        transport: T,
        config: FloodcastConfig,
        codec: Box<dyn PacketCodec>,
    ) -> (Self, FloodcastReceiver) {
        let (events, receiver) = mpsc::unbounded();
        let seen = SeenCache::new(config.max_size, config.max_age);
        let inner = Arc::new(Inner {
            transport: Arc::new(transport),
            codec,
            config: RwLock::new(config),
            seen: Mutex::new(seen),
            directory: RwLock::new(None),
            lifecycle: Mutex::new(Lifecycle {
                state: State::Closed,
                shutdown: None,
                task: None,
            }),
            events,
        });
        (Floodcast { inner }, FloodcastReceiver { inner: receiver })
    }

    /// Subscribes to the transport and starts the dispatch loop.
    ///
    /// Idempotent while already opening or open. The peer-acquisition
    /// strategy is chosen here: push if the transport's subscription
    /// carries a peer-update stream, legacy pull otherwise.
    pub async fn open(&self) -> Result<(), OpenError> {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                State::Opening | State::Open => return Ok(()),
                State::Closing => return Err(OpenError::Closing),
                State::Closed => lifecycle.state = State::Opening,
            }
        }

        let subscription = self.inner.transport.subscribe();
        let push_mode = subscription.peer_updates.is_some();
        // The probe future is dropped unpolled; no lookup actually runs.
        if !push_mode && self.inner.transport.lookup().is_none() {
            self.inner.lifecycle.lock().state = State::Closed;
            return Err(OpenError::NoPeerSource);
        }

        let directory = Arc::new(if push_mode {
            Directory::Push(PushDirectory::new())
        } else {
            Directory::Pull(PullDirectory::new())
        });
        *self.inner.directory.write() = Some(directory);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(dispatch(
            Arc::downgrade(&self.inner),
            subscription,
            shutdown_rx,
        ));

        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.task = Some(task);
        lifecycle.state = State::Open;
        debug!(id = %self.local_id(), push_mode, "engine open");
        Ok(())
    }

    /// Stops the dispatch loop, drops the transport subscription and
    /// clears the dedup cache. Idempotent while already closed.
    pub async fn close(&self) {
        let (shutdown, task) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                State::Closed | State::Closing => return,
                State::Opening | State::Open => {
                    lifecycle.state = State::Closing;
                    (lifecycle.shutdown.take(), lifecycle.task.take())
                }
            }
        };
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        if let Some(task) = task {
            let _ = task.await;
        }
        *self.inner.directory.write() = None;
        self.inner.seen.lock().clear();
        self.inner.lifecycle.lock().state = State::Closed;
        debug!(id = %self.local_id(), "engine closed");
    }

    /// Publishes `data` under a fresh random 32-byte sequence number.
    pub async fn publish(&self, data: impl Into<Bytes>) -> Result<Packet, PublishError> {
        self.publish_with_seqno(data, Packet::random_seqno()).await
    }

    /// Publishes `data` under an explicit sequence number.
    ///
    /// The packet travels the same forward path as a freshly received one
    /// and is returned, `from` stamped with the local id, once the fan-out
    /// has been dispatched. Neighbor outcomes arrive as events; there is
    /// no acknowledgement to wait for.
    pub async fn publish_with_seqno(
        &self,
        data: impl Into<Bytes>,
        seqno: impl Into<Bytes>,
    ) -> Result<Packet, PublishError> {
        let seqno = seqno.into();
        if seqno.is_empty() {
            return Err(PublishError::EmptySeqno);
        }

        match self.state() {
            State::Open => {}
            State::Closed if self.inner.config.read().auto_open => {
                self.open().await?;
            }
            _ => return Err(PublishError::NotOpen),
        }

        let (local_id, deliver_self) = {
            let config = self.inner.config.read();
            (config.id.clone(), config.deliver_self)
        };
        let packet = Packet {
            seqno,
            origin: local_id.clone(),
            from: None,
            data: data.into(),
        };
        // Suppresses copies of our own message flooded back to us.
        self.inner
            .seen
            .lock()
            .insert(Token::new(&packet.seqno, &local_id));

        let packet = self.inner.forward(packet).await?;
        if deliver_self {
            self.inner.emit(FloodcastEvent::Message(packet.clone()));
        }
        Ok(packet)
    }

    /// Applies a configuration change. Takes effect on subsequent
    /// operations; existing dedup entries keep their recorded expiry until
    /// re-touched.
    pub fn update_config(&self, update: impl FnOnce(&mut FloodcastConfig)) {
        let mut config = self.inner.config.write();
        update(&mut config);
        let mut seen = self.inner.seen.lock();
        seen.set_ttl(config.max_age);
        seen.set_capacity(config.max_size);
    }

    pub fn state(&self) -> State {
        self.inner.lifecycle.lock().state
    }

    pub fn local_id(&self) -> NodeId {
        self.inner.config.read().id.clone()
    }

    /// Size of the current neighbor snapshot.
    pub fn peer_count(&self) -> usize {
        self.inner
            .directory
            .read()
            .as_ref()
            .map_or(0, |directory| directory.cached().len())
    }

    /// Number of live dedup entries.
    pub fn seen_len(&self) -> usize {
        self.inner.seen.lock().len()
    }
}

impl<T: Transport> Inner<T> {
    fn emit(&self, event: FloodcastEvent) {
        // The host may have dropped the receiver; events are advisory.
        let _ = self.events.unbounded_send(event);
    }

    fn state(&self) -> State {
        self.lifecycle.lock().state
    }

    fn directory(&self) -> Option<Arc<Directory<T::Peer>>> {
        self.directory.read().clone()
    }

    async fn on_frame(&self, frame: Bytes) {
        if self.state() != State::Open {
            return;
        }
        let packet = match self.codec.decode(&frame) {
            Ok(packet) => packet,
            Err(error) => {
                debug!(%error, len = frame.len(), "dropping undecodable frame");
                self.emit(FloodcastEvent::DecodeError(error));
                return;
            }
        };
        let local_id = self.config.read().id.clone();
        if packet.origin == local_id {
            trace!("own packet came back around; dropping");
            return;
        }
        let Some(from) = packet.from.clone() else {
            // The default codec never yields this, but a custom one might.
            self.emit(FloodcastEvent::DecodeError(CodecError::EmptyField("from")));
            return;
        };
        if let Some(directory) = self.directory() {
            if !directory.cached().iter().any(|peer| peer.id() == &from) {
                // Advisory only: a stale directory must not gate delivery.
                debug!(from = %from, "sender not in current peer snapshot");
            }
        }
        // The sender has seen the message; never send it back along that
        // edge. The self-token insert is the atomic delivered-yet check.
        let fresh = {
            let mut seen = self.seen.lock();
            seen.insert(Token::new(&packet.seqno, &from));
            seen.insert(Token::new(&packet.seqno, &local_id))
        };
        if !fresh {
            trace!(origin = %packet.origin, "duplicate packet suppressed");
            return;
        }
        self.emit(FloodcastEvent::Message(packet.clone()));
        if let Err(error) = self.forward(packet).await {
            // Local delivery already happened; the failure only stops
            // further propagation of this copy.
            warn!(%error, "failed to re-encode packet for forwarding");
        }
    }

    /// Stamps the packet with the local id, encodes it once and fans out
    /// to every eligible neighbor. Shared by publish and receive-forward.
    async fn forward(&self, mut packet: Packet) -> Result<Packet, CodecError> {
        packet.from = Some(self.config.read().id.clone());
        let frame = self.codec.encode(&packet)?;
        let peers = self.fanout_peers().await;

        let mut targets: SmallVec<[T::Peer; 16]> = SmallVec::new();
        {
            let mut seen = self.seen.lock();
            for peer in peers.iter() {
                if peer.id() == &packet.origin {
                    continue;
                }
                if !seen.insert(Token::new(&packet.seqno, peer.id())) {
                    continue;
                }
                targets.push(peer.clone());
            }
        }
        if targets.is_empty() {
            return Ok(packet);
        }
        trace!(count = targets.len(), "fanning out");
        self.spawn_sends(frame, packet.msg_id(), targets);
        Ok(packet)
    }

    async fn fanout_peers(&self) -> Arc<[T::Peer]> {
        let Some(directory) = self.directory() else {
            return Vec::new().into();
        };
        match directory.as_ref() {
            Directory::Push(push) => push.cached(),
            Directory::Pull(pull) => {
                let transport = Arc::clone(&self.transport);
                let looked_up = pull
                    .current(move || match transport.lookup() {
                        Some(lookup) => lookup,
                        None => future::ready(Err(LookupError::new(
                            "transport no longer offers lookup",
                        )))
                        .boxed(),
                    })
                    .await;
                match looked_up {
                    Ok(peers) => peers,
                    Err(error) => {
                        warn!(%error, "peer lookup failed; using previous snapshot");
                        self.emit(FloodcastEvent::LookupError(error));
                        pull.cached()
                    }
                }
            }
        }
    }

    /// The sends run concurrently in a detached task so a slow neighbor
    /// does not hold up the dispatch loop; each outcome becomes an event.
    fn spawn_sends(&self, frame: Bytes, message: MessageId, targets: SmallVec<[T::Peer; 16]>) {
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        tokio::spawn(async move {
            let sends = targets.into_iter().map(|peer| {
                let transport = Arc::clone(&transport);
                let events = events.clone();
                let frame = frame.clone();
                let message = message.clone();
                async move {
                    match transport.send(frame, &peer).await {
                        Ok(()) => {
                            let _ = events.unbounded_send(FloodcastEvent::Sent {
                                peer: peer.id().clone(),
                                message,
                            });
                        }
                        Err(error) => {
                            warn!(peer = %peer.id(), %error, "send failed");
                            let _ = events.unbounded_send(FloodcastEvent::SendError {
                                peer: peer.id().clone(),
                                error,
                            });
                        }
                    }
                }
            });
            future::join_all(sends).await;
        });
    }
}

/// Single-threaded dispatch loop: inbound frames, peer updates, cache
/// sweeps and shutdown all funnel through one task per engine instance,
/// which is what makes the dedup check-and-set atomic without extra
/// locking on the hot path.
///
/// Holds only a weak handle so dropping the last engine clone without an
/// explicit close still tears the loop down (the shutdown sender drops
/// with the engine and fires the first select arm).
async fn dispatch<T: Transport>(
    inner: Weak<Inner<T>>,
    subscription: Subscription<T::Peer>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let Subscription {
        mut frames,
        peer_updates,
    } = subscription;
    let mut peer_updates = peer_updates.unwrap_or_else(|| futures::stream::pending().boxed());

    let period = match inner.upgrade() {
        Some(inner) => inner.config.read().heartbeat_interval,
        None => return,
    };
    let mut heartbeat = tokio::time::interval(period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            frame = frames.next() => match frame {
                Some(frame) => {
                    let Some(inner) = inner.upgrade() else { break };
                    inner.on_frame(frame).await;
                }
                None => {
                    debug!("inbound stream ended");
                    break;
                }
            },
            update = peer_updates.next() => match update {
                Some(peers) => {
                    let Some(inner) = inner.upgrade() else { break };
                    debug!(count = peers.len(), "peer snapshot replaced");
                    if let Some(directory) = inner.directory() {
                        if let Directory::Push(push) = directory.as_ref() {
                            push.update(peers);
                        }
                    }
                }
                None => peer_updates = futures::stream::pending().boxed(),
            },
            _ = heartbeat.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.seen.lock().purge_expired(Instant::now());
            }
        }
    }
}
