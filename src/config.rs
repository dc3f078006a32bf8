use prometheus_client::registry::Registry;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// Configuration for a simulated gossip network.
pub struct Config {
    /// Probability in [0, 1] that a message received by a peer is dropped
    /// before delivery.
    pub loss: f64,

    /// Capacity of each peer's inbound mailbox.
    ///
    /// Senders never block on a full mailbox; the message is dropped instead.
    pub mailbox_size: usize,

    /// Interval at which each peer re-broadcasts its full state to every
    /// registered peer (anti-entropy). Must be nonzero.
    pub repair_interval: Duration,

    /// Seed for loss rolls.
    ///
    /// When set, each connected peer derives its own generator from this value
    /// and drop decisions become reproducible. When unset, rolls are seeded
    /// from entropy.
    pub seed: Option<u64>,

    /// Registry for metrics.
    pub registry: Arc<Mutex<Registry>>,
}

impl Config {
    /// Create a configuration with the given loss probability, a mailbox
    /// capacity of 100, and a repair interval of 10 seconds.
    pub fn new(loss: f64) -> Self {
        Self {
            loss,
            mailbox_size: 100,
            repair_interval: Duration::from_secs(10),
            seed: None,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }
}
