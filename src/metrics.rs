//! Metric label types for simulated gossip traffic.

use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::fmt::Debug;

/// The kind of gossip envelope a counter refers to.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Kind {
    /// A point-to-point message addressed to one peer.
    Unicast,
    /// A state broadcast fanned out to every peer.
    Broadcast,
}

/// Why a message was dropped before delivery.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Reason {
    /// The receiving actor's loss roll discarded it.
    Loss,
    /// The destination mailbox was at capacity.
    MailboxFull,
    /// The destination mailbox was already closed.
    Closed,
}

/// Label set for messages delivered to a gossiper.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Delivered {
    pub peer: String,
    pub kind: Kind,
}

impl Delivered {
    pub fn new<P: Debug>(peer: &P, kind: Kind) -> Self {
        Self {
            peer: format!("{peer:?}"),
            kind,
        }
    }
}

/// Label set for messages dropped before delivery.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Dropped {
    pub peer: String,
    pub kind: Kind,
    pub reason: Reason,
}

impl Dropped {
    pub fn new<P: Debug>(peer: &P, kind: Kind, reason: Reason) -> Self {
        Self {
            peer: format!("{peer:?}"),
            kind,
            reason,
        }
    }
}

/// Label set for repair passes, keyed by the originating peer.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Origin {
    pub peer: String,
}

impl Origin {
    pub fn new<P: Debug>(peer: &P) -> Self {
        Self {
            peer: format!("{peer:?}"),
        }
    }
}

/// Counters shared by the harness and its actors.
#[derive(Clone, Default)]
pub struct Metrics {
    /// Envelopes that survived the loss roll and reached their gossiper.
    pub delivered: Family<Delivered, Counter>,
    /// Envelopes dropped before delivery.
    pub dropped: Family<Dropped, Counter>,
    /// Anti-entropy passes triggered by the repair timer.
    pub repairs: Family<Origin, Counter>,
}

impl Metrics {
    /// Create the counter families and register them with `registry`.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "messages_delivered",
            "messages delivered to a gossiper",
            metrics.delivered.clone(),
        );
        registry.register(
            "messages_dropped",
            "messages dropped before delivery",
            metrics.dropped.clone(),
        );
        registry.register(
            "repairs",
            "anti-entropy passes triggered by the repair timer",
            metrics.repairs.clone(),
        );
        metrics
    }
}
