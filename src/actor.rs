//! Per-peer actor: consumes one mailbox, applies loss, and drives repair.

use crate::{
    ingress::Envelope,
    metrics::{Delivered, Dropped, Kind, Metrics, Origin, Reason},
    network::{fan_out, PeerMap},
    GossipData, Gossiper, PeerId,
};
use rand::{rngs::SmallRng, Rng};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::debug;

pub(crate) struct Actor<P: PeerId, G: Gossiper<P>> {
    pub(crate) identity: P,
    pub(crate) gossiper: G,
    pub(crate) mailbox: mpsc::Receiver<Envelope<P, G::Data>>,
    pub(crate) peers: PeerMap<P, G::Data>,
    pub(crate) metrics: Metrics,
    pub(crate) rng: SmallRng,
    pub(crate) loss: f64,
    pub(crate) repair_interval: Duration,
}

impl<P: PeerId, G: Gossiper<P>> Actor<P, G> {
    pub(crate) async fn run(mut self) {
        let mut repair = interval_at(
            Instant::now() + self.repair_interval,
            self.repair_interval,
        );
        repair.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                envelope = self.mailbox.recv() => {
                    match envelope {
                        Some(envelope) => {
                            if !self.handle(envelope) {
                                return;
                            }
                        }
                        // All senders are gone: the network was torn down.
                        None => return,
                    }
                }
                _ = repair.tick() => self.repair(),
            }
        }
    }

    /// Process one envelope. Returns false once the actor must stop.
    fn handle(&mut self, envelope: Envelope<P, G::Data>) -> bool {
        match envelope {
            Envelope::Terminate { ack } => {
                let _ = ack.send(());
                return false;
            }
            Envelope::Flush { ack } => {
                let _ = ack.send(());
            }
            Envelope::Unicast { sender, payload } => {
                if !self.roll(Kind::Unicast) {
                    return true;
                }
                if let Err(err) = self.gossiper.on_unicast(sender, payload) {
                    panic!("gossip unicast to {:?} failed: {err}", self.identity);
                }
                self.metrics
                    .delivered
                    .get_or_create(&Delivered::new(&self.identity, Kind::Unicast))
                    .inc();
            }
            Envelope::Broadcast { data } => {
                if !self.roll(Kind::Broadcast) {
                    return true;
                }
                for fragment in data.encode() {
                    if let Err(err) = self.gossiper.on_broadcast(fragment) {
                        panic!("gossip broadcast to {:?} failed: {err}", self.identity);
                    }
                }
                self.metrics
                    .delivered
                    .get_or_create(&Delivered::new(&self.identity, Kind::Broadcast))
                    .inc();
            }
        }
        true
    }

    /// One loss roll. Returns true when the message survives.
    fn roll(&mut self, kind: Kind) -> bool {
        if self.rng.gen_bool(1.0 - self.loss) {
            return true;
        }
        debug!(
            recipient = ?self.identity,
            ?kind,
            reason = "random loss",
            "dropping message",
        );
        self.metrics
            .dropped
            .get_or_create(&Dropped::new(&self.identity, kind, Reason::Loss))
            .inc();
        false
    }

    /// Anti-entropy pass: re-broadcast the gossiper's full state to every
    /// registered peer, including this one.
    fn repair(&mut self) {
        let state = self.gossiper.current_state();
        self.metrics
            .repairs
            .get_or_create(&Origin::new(&self.identity))
            .inc();
        fan_out(&self.peers, &self.metrics, &state);
    }
}
