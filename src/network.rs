//! Network harness: peer registry, lifecycle, and broadcast fan-out.

use crate::{
    actor::Actor,
    ingress::{Client, Envelope},
    metrics::{Dropped, Kind, Metrics, Reason},
    Config, Error, GossipData, Gossiper, PeerId,
};
use rand::{rngs::SmallRng, SeedableRng};
use std::{
    collections::HashMap,
    panic,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::debug;

/// Registered peers, shared by the harness, client handles, and actors.
pub(crate) type PeerMap<P, D> = Arc<RwLock<HashMap<P, Peer<P, D>>>>;

/// Registry entry: a peer's mailbox plus its actor's join handle.
pub(crate) struct Peer<P, D> {
    sender: mpsc::Sender<Envelope<P, D>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: PeerId, D: GossipData> Peer<P, D> {
    /// Non-blocking enqueue. On a full or closed mailbox the envelope is
    /// dropped and accounted, never retried.
    pub(crate) fn enqueue(
        &self,
        recipient: &P,
        envelope: Envelope<P, D>,
        kind: Kind,
        metrics: &Metrics,
    ) {
        match self.sender.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(
                    recipient = ?recipient,
                    ?kind,
                    reason = "mailbox full",
                    "dropping message",
                );
                metrics
                    .dropped
                    .get_or_create(&Dropped::new(recipient, kind, Reason::MailboxFull))
                    .inc();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    recipient = ?recipient,
                    ?kind,
                    reason = "mailbox closed",
                    "dropping message",
                );
                metrics
                    .dropped
                    .get_or_create(&Dropped::new(recipient, kind, Reason::Closed))
                    .inc();
            }
        }
    }
}

/// Attempt a non-blocking broadcast enqueue to every registered peer.
pub(crate) fn fan_out<P: PeerId, D: GossipData>(
    peers: &PeerMap<P, D>,
    metrics: &Metrics,
    data: &D,
) {
    let peers = peers.read().unwrap();
    for (identity, peer) in peers.iter() {
        peer.enqueue(
            identity,
            Envelope::Broadcast { data: data.clone() },
            Kind::Broadcast,
            metrics,
        );
    }
}

/// Simulated gossip network.
///
/// Owns the peer registry. Dropping the network closes every mailbox; each
/// actor drains what is already queued and stops.
pub struct Network<P: PeerId, D: GossipData> {
    loss: f64,
    mailbox_size: usize,
    repair_interval: Duration,
    seed: Option<u64>,
    connected: AtomicU64,
    peers: PeerMap<P, D>,
    metrics: Metrics,
}

impl<P: PeerId, D: GossipData> Network<P, D> {
    /// Create a network from `cfg`.
    ///
    /// Fails if the loss probability is outside [0, 1], the mailbox capacity
    /// is zero, or the repair interval is zero.
    pub fn new(cfg: Config) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&cfg.loss) {
            return Err(Error::InvalidLoss(cfg.loss));
        }
        if cfg.mailbox_size == 0 {
            return Err(Error::InvalidMailboxSize(cfg.mailbox_size));
        }
        if cfg.repair_interval.is_zero() {
            return Err(Error::InvalidRepairInterval(cfg.repair_interval));
        }
        let metrics = Metrics::register(&mut cfg.registry.lock().unwrap());
        Ok(Self {
            loss: cfg.loss,
            mailbox_size: cfg.mailbox_size,
            repair_interval: cfg.repair_interval,
            seed: cfg.seed,
            connected: AtomicU64::new(0),
            peers: Arc::new(RwLock::new(HashMap::new())),
            metrics,
        })
    }

    /// Connect `identity` to the network, spawning an actor that feeds
    /// `gossiper`.
    ///
    /// Must be called within a tokio runtime. Fails if `identity` is already
    /// connected.
    pub fn connect<G>(&self, identity: P, gossiper: G) -> Result<Client<P, D>, Error>
    where
        G: Gossiper<P, Data = D>,
    {
        let mut peers = self.peers.write().unwrap();
        if peers.contains_key(&identity) {
            return Err(Error::PeerExists(format!("{identity:?}")));
        }
        let rng = match self.seed {
            Some(seed) => {
                let nth = self.connected.fetch_add(1, Ordering::Relaxed);
                SmallRng::seed_from_u64(seed.wrapping_add(nth))
            }
            None => SmallRng::from_entropy(),
        };
        let (sender, mailbox) = mpsc::channel(self.mailbox_size);
        let task = tokio::spawn(
            Actor {
                identity: identity.clone(),
                gossiper,
                mailbox,
                peers: self.peers.clone(),
                metrics: self.metrics.clone(),
                rng,
                loss: self.loss,
                repair_interval: self.repair_interval,
            }
            .run(),
        );
        peers.insert(
            identity.clone(),
            Peer {
                sender,
                task: Mutex::new(Some(task)),
            },
        );
        Ok(Client::new(identity, self.peers.clone(), self.metrics.clone()))
    }

    /// Drain barrier: resolves once every envelope enqueued before this call
    /// has been processed (delivered or dropped) by its destination actor.
    pub async fn flush(&self) -> Result<(), Error> {
        let targets: Vec<_> = {
            let peers = self.peers.read().unwrap();
            peers
                .iter()
                .map(|(identity, peer)| (identity.clone(), peer.sender.clone()))
                .collect()
        };
        for (identity, sender) in targets {
            let (ack, done) = oneshot::channel();
            if sender.send(Envelope::Flush { ack }).await.is_err() {
                return Err(self.reap(&identity).await);
            }
            if done.await.is_err() {
                return Err(self.reap(&identity).await);
            }
        }
        Ok(())
    }

    /// Disconnect `identity`: every envelope already queued is processed, the
    /// actor acknowledges termination and stops, and the registry entry is
    /// removed.
    ///
    /// Envelopes submitted concurrently with removal have undefined delivery;
    /// quiesce senders (or flush) first if that matters.
    pub async fn remove_peer(&self, identity: &P) -> Result<(), Error> {
        let sender = {
            let peers = self.peers.read().unwrap();
            let peer = peers
                .get(identity)
                .ok_or_else(|| Error::UnknownPeer(format!("{identity:?}")))?;
            peer.sender.clone()
        };
        let (ack, done) = oneshot::channel();
        if sender.send(Envelope::Terminate { ack }).await.is_err() {
            return Err(self.reap(identity).await);
        }
        if done.await.is_err() {
            return Err(self.reap(identity).await);
        }
        let peer = self.peers.write().unwrap().remove(identity);
        if let Some(peer) = peer {
            if let Some(task) = peer.task.into_inner().unwrap() {
                if let Err(err) = task.await {
                    if err.is_panic() {
                        panic::resume_unwind(err.into_panic());
                    }
                }
            }
        }
        Ok(())
    }

    /// Surface an actor that stopped without completing a handshake: re-raise
    /// its panic at the caller, or report it stopped.
    async fn reap(&self, identity: &P) -> Error {
        let task = {
            let peers = self.peers.read().unwrap();
            peers
                .get(identity)
                .and_then(|peer| peer.task.lock().unwrap().take())
        };
        if let Some(task) = task {
            if let Err(err) = task.await {
                if err.is_panic() {
                    panic::resume_unwind(err.into_panic());
                }
            }
        }
        Error::PeerStopped(format!("{identity:?}"))
    }
}

impl<P: PeerId, D: GossipData> Drop for Network<P, D> {
    fn drop(&mut self) {
        // Closing every mailbox lets each actor drain and stop.
        if let Ok(mut peers) = self.peers.write() {
            peers.clear();
        }
    }
}
