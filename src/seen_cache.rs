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

//! This implements a time- and size-bounded LRU set for suppressing
//! duplicate broadcast packets.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use fnv::FnvBuildHasher;
use lru::LruCache;

/// A bounded set of dedup tokens.
///
/// Entries are evicted by two independent forces: the least-recently-touched
/// entry is dropped when an insert would exceed the capacity, and every
/// entry expires `ttl` after its last touch. Reads are touches: a hit on
/// [`contains`](SeenCache::contains) refreshes both the expiry and the LRU
/// position of the entry, as does re-inserting a present key.
///
/// Because a touch refreshes expiry and LRU position together, the expired
/// entries are always a suffix of the LRU order; [`purge_expired`]
/// (SeenCache::purge_expired) pops from the LRU end until it meets a live
/// entry. There are no timers to cancel: expiry is enforced lazily on
/// access and by the engine's periodic sweep.
pub struct SeenCache<K> {
    entries: LruCache<K, Instant, FnvBuildHasher>,
    ttl: Duration,
}

impl<K> SeenCache<K>
where
    K: Eq + Hash,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        SeenCache {
            entries: LruCache::with_hasher(non_zero(capacity), FnvBuildHasher::default()),
            ttl,
        }
    }

    /// Inserts `key`, evicting the least-recently-touched entry if the
    /// cache is full.
    ///
    /// Returns `true` if the key was absent (or expired). If it was already
    /// present this refreshes its expiry and LRU position and returns
    /// `false`, making the call an atomic check-and-set.
    pub fn insert(&mut self, key: K) -> bool {
        let now = Instant::now();
        self.purge_expired(now);
        match self.entries.get_mut(&key) {
            Some(expires) => {
                let lapsed = *expires <= now;
                *expires = now + self.ttl;
                lapsed
            }
            None => {
                self.entries.put(key, now + self.ttl);
                true
            }
        }
    }

    /// Reports whether `key` is present and unexpired.
    ///
    /// A hit refreshes the entry's expiry and LRU position.
    pub fn contains(&mut self, key: &K) -> bool {
        let now = Instant::now();
        self.purge_expired(now);
        match self.entries.get_mut(key) {
            Some(expires) if *expires > now => {
                *expires = now + self.ttl;
                return true;
            }
            Some(_) => {}
            None => return false,
        }
        // Present but past its expiry (possible after a ttl change).
        self.entries.pop(key);
        false
    }

    /// Removes `key`, returning whether it existed.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.pop(key).is_some()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes every entry whose expiry has passed.
    pub fn purge_expired(&mut self, now: Instant) {
        while let Some((_, expires)) = self.entries.peek_lru() {
            if *expires > now {
                break;
            }
            self.entries.pop_lru();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The keys in least- to most-recently-touched order. Each call yields
    /// a fresh snapshot of the current contents.
    pub fn values(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().rev().map(|(key, _)| key)
    }

    /// Applies to entries touched from now on; existing entries keep their
    /// recorded expiry until re-touched.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    /// Shrinking below the current size evicts from the LRU end.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.entries.resize(non_zero(capacity));
    }
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}
