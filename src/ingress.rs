//! Ingress types for peer mailboxes.

use crate::{
    metrics::{Kind, Metrics},
    network::{fan_out, PeerMap},
    Error, GossipData, PeerId,
};
use bytes::Bytes;
use tokio::sync::oneshot;

/// A message traveling through a peer's mailbox.
pub(crate) enum Envelope<P, D> {
    /// Point-to-point gossip from `sender`.
    Unicast { sender: P, payload: Bytes },
    /// State gossip fanned out to every registered peer.
    Broadcast { data: D },
    /// Drain barrier: acknowledged once every envelope ahead of it has been
    /// processed.
    Flush { ack: oneshot::Sender<()> },
    /// Stop the actor: acknowledged, then no further envelopes are processed.
    Terminate { ack: oneshot::Sender<()> },
}

/// Sender-scoped handle for submitting gossip to the network.
///
/// Returned by [`Network::connect`](crate::Network::connect). Cheap to clone;
/// clones send as the same identity.
#[derive(Clone)]
pub struct Client<P: PeerId, D: GossipData> {
    identity: P,
    peers: PeerMap<P, D>,
    metrics: Metrics,
}

impl<P: PeerId, D: GossipData> Client<P, D> {
    pub(crate) fn new(identity: P, peers: PeerMap<P, D>, metrics: Metrics) -> Self {
        Self {
            identity,
            peers,
            metrics,
        }
    }

    /// The identity this handle sends as.
    pub fn identity(&self) -> &P {
        &self.identity
    }

    /// Submit a unicast to `recipient`, tagged with this handle's identity as
    /// the sender.
    ///
    /// Never blocks: if the recipient's mailbox is full the message is
    /// dropped, indistinguishable from network loss. Fails only if `recipient`
    /// was never connected or has been removed.
    pub fn unicast(&self, recipient: &P, payload: Bytes) -> Result<(), Error> {
        let peers = self.peers.read().unwrap();
        let peer = peers
            .get(recipient)
            .ok_or_else(|| Error::UnknownPeer(format!("{recipient:?}")))?;
        peer.enqueue(
            recipient,
            Envelope::Unicast {
                sender: self.identity.clone(),
                payload,
            },
            Kind::Unicast,
            &self.metrics,
        );
        Ok(())
    }

    /// Submit `data` as a broadcast to every registered peer, including this
    /// handle's own.
    ///
    /// Never blocks; peers with full mailboxes are skipped.
    pub fn broadcast(&self, data: D) {
        fan_out(&self.peers, &self.metrics, &data);
    }
}
