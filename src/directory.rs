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

//! Holds the neighbor snapshot the next fan-out will target.
//!
//! Two acquisition strategies exist: a push directory mutated by the
//! transport's peer-update stream, and a legacy pull directory that runs
//! the transport's lookup before each fan-out, coalescing overlapping
//! callers onto a single in-flight lookup.

use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};

use crate::error::LookupError;
use crate::transport::Peer;

pub(crate) enum Directory<P> {
    Push(PushDirectory<P>),
    Pull(PullDirectory<P>),
}

impl<P: Peer> Directory<P> {
    /// The snapshot as of the last update or completed lookup.
    pub(crate) fn cached(&self) -> Arc<[P]> {
        match self {
            Directory::Push(push) => push.cached(),
            Directory::Pull(pull) => pull.cached(),
        }
    }
}

/// Snapshot replaced wholesale by the dispatch loop whenever the transport
/// reports a change. Readers clone the `Arc`, so a swap never tears an
/// in-progress fan-out.
pub(crate) struct PushDirectory<P> {
    snapshot: RwLock<Arc<[P]>>,
}

impl<P: Peer> PushDirectory<P> {
    pub(crate) fn new() -> Self {
        PushDirectory {
            snapshot: RwLock::new(Vec::new().into()),
        }
    }

    pub(crate) fn update(&self, peers: Vec<P>) {
        *self.snapshot.write() = peers.into();
    }

    pub(crate) fn cached(&self) -> Arc<[P]> {
        self.snapshot.read().clone()
    }
}

type SharedLookup<P> = Shared<BoxFuture<'static, Result<Arc<[P]>, LookupError>>>;

/// Legacy pull strategy: neighbors are enumerated on demand.
///
/// Overlapping fan-outs share one in-flight lookup; a failed lookup leaves
/// the previous snapshot in place.
pub(crate) struct PullDirectory<P> {
    snapshot: Arc<RwLock<Arc<[P]>>>,
    in_flight: Arc<Mutex<Option<SharedLookup<P>>>>,
}

impl<P: Peer> PullDirectory<P> {
    pub(crate) fn new() -> Self {
        PullDirectory {
            snapshot: Arc::new(RwLock::new(Vec::new().into())),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolves the current neighbor set, starting `begin`'s lookup only
    /// if none is already outstanding. On success the snapshot is
    /// replaced; on failure it is left untouched and the error is handed
    /// to every coalesced caller.
    pub(crate) async fn current<F>(&self, begin: F) -> Result<Arc<[P]>, LookupError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Vec<P>, LookupError>>,
    {
        let shared = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(shared) => shared.clone(),
                None => {
                    let lookup = begin();
                    let snapshot = Arc::clone(&self.snapshot);
                    let in_flight = Arc::clone(&self.in_flight);
                    let shared = async move {
                        let result = lookup.await.map(|peers| {
                            let peers: Arc<[P]> = peers.into();
                            *snapshot.write() = peers.clone();
                            peers
                        });
                        *in_flight.lock() = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };
        shared.await
    }

    pub(crate) fn cached(&self) -> Arc<[P]> {
        self.snapshot.read().clone()
    }
}
