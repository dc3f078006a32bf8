//! Exercise gossip protocols over simulated lossy peer-to-peer networks.
//!
//! A [`Network`] stands in for a real gossip transport in tests. Every peer
//! connected to it runs as its own tokio task, consuming a bounded FIFO
//! mailbox that any other peer can address. Each received unicast or
//! broadcast survives an independent loss roll with probability `1 - loss`.
//! On a fixed interval every actor also re-broadcasts its gossiper's full
//! state, so updates lost to the roll are eventually repaired. Flush and
//! terminate barriers travel through the same mailboxes as gossip, letting a
//! test drain the network deterministically or tear a peer down mid-stream.
//!
//! # Semantics
//!
//! - Delivery is best-effort and at-most-once. A message can be dropped by
//!   the destination's loss roll or skipped when its mailbox is full; the
//!   sender cannot tell the difference and is never notified.
//! - Ordering is per-destination FIFO. Messages from one sender to one
//!   destination arrive in submission order; there is no ordering across
//!   destinations.
//! - [`Network::flush`] resolves only after every envelope enqueued before
//!   the call has been processed by its destination.
//! - A gossiper returning an error is a broken test invariant. The owning
//!   actor panics immediately and the panic resurfaces from the next
//!   [`Network::flush`] or [`Network::remove_peer`] that touches the peer.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use gossip_sim::{Config, GossipData, Gossiper, Network};
//! use std::convert::Infallible;
//! use std::sync::{Arc, Mutex};
//!
//! /// State gossiped between peers.
//! #[derive(Clone)]
//! struct Blob(Bytes);
//!
//! impl GossipData for Blob {
//!     fn encode(&self) -> Vec<Bytes> {
//!         vec![self.0.clone()]
//!     }
//! }
//!
//! /// Protocol under test: remembers everything it hears.
//! struct Recorder {
//!     seen: Arc<Mutex<Vec<Bytes>>>,
//! }
//!
//! impl Gossiper<&'static str> for Recorder {
//!     type Data = Blob;
//!     type Error = Infallible;
//!
//!     fn on_unicast(&mut self, _sender: &'static str, payload: Bytes) -> Result<(), Infallible> {
//!         self.seen.lock().unwrap().push(payload);
//!         Ok(())
//!     }
//!
//!     fn on_broadcast(&mut self, payload: Bytes) -> Result<Option<Blob>, Infallible> {
//!         self.seen.lock().unwrap().push(payload);
//!         Ok(None)
//!     }
//!
//!     fn current_state(&mut self) -> Blob {
//!         Blob(Bytes::from_static(b"state"))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     // A network that never drops anything.
//!     let network = Network::new(Config::new(0.0)).unwrap();
//!
//!     let seen = Arc::new(Mutex::new(Vec::new()));
//!     let alice = network
//!         .connect("alice", Recorder { seen: Arc::new(Mutex::new(Vec::new())) })
//!         .unwrap();
//!     network
//!         .connect("bob", Recorder { seen: seen.clone() })
//!         .unwrap();
//!
//!     // Flush guarantees the unicast has been processed before the assert.
//!     alice.unicast(&"bob", Bytes::from_static(b"hello")).unwrap();
//!     network.flush().await.unwrap();
//!     assert_eq!(*seen.lock().unwrap(), vec![Bytes::from_static(b"hello")]);
//! }
//! ```

use bytes::Bytes;
use std::{fmt::Debug, hash::Hash};
use thiserror::Error;

mod actor;
mod config;
pub use config::Config;
mod ingress;
pub use ingress::Client;
mod metrics;
mod network;
pub use network::Network;

#[cfg(test)]
pub mod mocks;

/// Marker for peer identities: opaque, comparable, hashable, and shareable.
///
/// Blanket-implemented; strings, integers, and key types all qualify.
/// Identities are supplied by the caller, never generated by the network.
pub trait PeerId: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T: Clone + Eq + Hash + Debug + Send + Sync + 'static> PeerId for T {}

/// A gossiper's full or partial state, split into fragments for delivery.
pub trait GossipData: Clone + Send + 'static {
    /// Encode into one or more fragments.
    ///
    /// A receiving gossiper sees one `on_broadcast` call per fragment, in
    /// this order.
    fn encode(&self) -> Vec<Bytes>;
}

/// The protocol under test.
///
/// Callbacks run on the owning peer's actor and only for messages that
/// survived the loss roll. Returning an error from a callback panics the
/// actor; see the crate docs.
pub trait Gossiper<P: PeerId>: Send + 'static {
    /// State exchanged by broadcast.
    type Data: GossipData;

    /// Callback failure. Always fatal to the run.
    type Error: std::error::Error + Send + 'static;

    /// Handle a unicast from `sender`.
    fn on_unicast(&mut self, sender: P, payload: Bytes) -> Result<(), Self::Error>;

    /// Handle one fragment of a broadcast. May return the updated aggregate,
    /// which the network ignores.
    fn on_broadcast(&mut self, payload: Bytes) -> Result<Option<Self::Data>, Self::Error>;

    /// Full state for an anti-entropy re-broadcast.
    fn current_state(&mut self) -> Self::Data;
}

/// Errors returned by the network harness.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid loss probability (must be in [0, 1]): {0}")]
    InvalidLoss(f64),
    #[error("invalid mailbox size (must be nonzero): {0}")]
    InvalidMailboxSize(usize),
    #[error("invalid repair interval (must be nonzero): {0:?}")]
    InvalidRepairInterval(std::time::Duration),
    #[error("peer already connected: {0}")]
    PeerExists(String),
    #[error("unknown peer: {0}")]
    UnknownPeer(String),
    #[error("peer stopped: {0}")]
    PeerStopped(String),
}
