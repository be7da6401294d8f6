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

use std::time::Duration;

use crate::protocol::NodeId;

/// Configuration options for the broadcast engine.
///
/// All fields can be changed after construction through
/// [`Floodcast::update_config`](crate::Floodcast::update_config); changes
/// apply to subsequent operations, not retroactively (an existing cache
/// entry keeps its recorded expiry until re-touched, and the heartbeat
/// cadence is read at the next open).
#[derive(Debug, Clone)]
pub struct FloodcastConfig {
    /// Id of the local node, stamped as `origin` on published packets and
    /// as `from` on every forwarded one.
    pub id: NodeId,

    /// How long a dedup entry lives after its last touch.
    pub max_age: Duration,

    /// Upper bound on dedup entries; the least-recently-touched entry is
    /// evicted first.
    pub max_size: usize,

    /// Cadence of the sweep that drops expired dedup entries.
    pub heartbeat_interval: Duration,

    /// Open the engine implicitly on the first publish instead of failing
    /// with [`PublishError::NotOpen`](crate::PublishError).
    pub auto_open: bool,

    /// Deliver packets published by the local node to the local event
    /// stream as well, as if they had arrived from the network.
    pub deliver_self: bool,
}

impl FloodcastConfig {
    pub fn new(id: NodeId) -> Self {
        FloodcastConfig {
            id,
            max_age: Duration::from_millis(10_000),
            max_size: 1024,
            heartbeat_interval: Duration::from_secs(1),
            auto_open: false,
            deliver_self: false,
        }
    }

    pub fn builder() -> FloodcastConfigBuilder {
        FloodcastConfigBuilder::default()
    }
}

impl Default for FloodcastConfig {
    fn default() -> Self {
        FloodcastConfig::new(NodeId::random())
    }
}

/// Builder for [`FloodcastConfig`].
#[derive(Debug, Clone)]
pub struct FloodcastConfigBuilder {
    config: FloodcastConfig,
}

impl Default for FloodcastConfigBuilder {
    fn default() -> Self {
        FloodcastConfigBuilder {
            config: FloodcastConfig::default(),
        }
    }
}

impl FloodcastConfigBuilder {
    pub fn id(mut self, id: NodeId) -> Self {
        self.config.id = id;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = max_age;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    pub fn auto_open(mut self, auto_open: bool) -> Self {
        self.config.auto_open = auto_open;
        self
    }

    pub fn deliver_self(mut self, deliver_self: bool) -> Self {
        self.config.deliver_self = deliver_self;
        self
    }

    pub fn build(self) -> FloodcastConfig {
        self.config
    }
}
