//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;
use tailfeed_protocol::VerbSet;

/// Default keepalive period.
pub const DEFAULT_TICKER_INTERVAL: Duration = Duration::from_secs(3);

/// Configuration for the change-feed server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Period of synthetic `ticker` events.
    pub ticker_interval: Duration,
    /// Capacity of each session's output channel.
    pub channel_capacity: usize,
    /// Verbs every feed subscribes to.
    pub verbs: VerbSet,
    /// Whether to expose `/{resource}/changes/streaming` per registered resource.
    pub single_resource_routes: bool,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ticker_interval: DEFAULT_TICKER_INTERVAL,
            channel_capacity: 64,
            verbs: VerbSet::default(),
            single_resource_routes: true,
        }
    }

    /// Sets the keepalive period.
    pub fn with_ticker_interval(mut self, interval: Duration) -> Self {
        self.ticker_interval = interval;
        self
    }

    /// Sets the per-session channel capacity (at least 1).
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Sets the subscribed verbs.
    pub fn with_verbs(mut self, verbs: VerbSet) -> Self {
        self.verbs = verbs;
        self
    }

    /// Enables or disables the per-resource routes.
    pub fn with_single_resource_routes(mut self, enabled: bool) -> Self {
        self.single_resource_routes = enabled;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

/// Setup-time configuration of one streaming route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Resource fixed at setup; request-supplied resources are ignored when set.
    pub single_resource: Option<String>,
    /// Subscribed verbs.
    pub verbs: VerbSet,
}

impl FeedConfig {
    /// A feed whose resources come from the `resources` query parameter.
    pub fn multi(verbs: VerbSet) -> Self {
        Self {
            single_resource: None,
            verbs,
        }
    }

    /// A feed fixed to one resource.
    pub fn single(resource: impl Into<String>, verbs: VerbSet) -> Self {
        Self {
            single_resource: Some(resource.into()),
            verbs,
        }
    }
}
