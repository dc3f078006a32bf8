//! Mock implementations for testing.

use crate::{GossipData, Gossiper, PeerId};
use bytes::Bytes;
use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    },
};
use thiserror::Error;

/// Injected gossiper failure.
#[derive(Debug, Error)]
#[error("injected failure")]
pub struct Failure;

/// State that encodes to a fixed list of fragments.
#[derive(Clone, Debug, Default)]
pub struct Fragments(pub Vec<Bytes>);

impl GossipData for Fragments {
    fn encode(&self) -> Vec<Bytes> {
        self.0.clone()
    }
}

/// Everything a [`Recorder`] or [`Stall`] observed.
pub struct Log<P> {
    unicasts: Mutex<Vec<(P, Bytes)>>,
    broadcasts: Mutex<Vec<Bytes>>,
    state_calls: AtomicUsize,
}

impl<P: Clone> Log<P> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            unicasts: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            state_calls: AtomicUsize::new(0),
        })
    }

    /// Unicasts delivered so far, in delivery order.
    pub fn unicasts(&self) -> Vec<(P, Bytes)> {
        self.unicasts.lock().unwrap().clone()
    }

    /// Broadcast fragments delivered so far, in delivery order.
    pub fn broadcasts(&self) -> Vec<Bytes> {
        self.broadcasts.lock().unwrap().clone()
    }

    /// Number of times the repair timer requested the gossiper's state.
    pub fn state_calls(&self) -> usize {
        self.state_calls.load(Ordering::Relaxed)
    }
}

/// A gossiper that records every delivery.
pub struct Recorder<P> {
    log: Arc<Log<P>>,
    state: Fragments,
    fail_unicast: bool,
    fail_broadcast: bool,
}

impl<P: PeerId> Recorder<P> {
    /// Create a recorder whose `current_state` returns `state`.
    pub fn new(state: Fragments) -> (Self, Arc<Log<P>>) {
        let log = Log::new();
        (
            Self {
                log: log.clone(),
                state,
                fail_unicast: false,
                fail_broadcast: false,
            },
            log,
        )
    }

    /// Fail every unicast delivery.
    pub fn fail_unicast(mut self) -> Self {
        self.fail_unicast = true;
        self
    }

    /// Fail every broadcast delivery.
    pub fn fail_broadcast(mut self) -> Self {
        self.fail_broadcast = true;
        self
    }
}

impl<P: PeerId> Gossiper<P> for Recorder<P> {
    type Data = Fragments;
    type Error = Failure;

    fn on_unicast(&mut self, sender: P, payload: Bytes) -> Result<(), Failure> {
        if self.fail_unicast {
            return Err(Failure);
        }
        self.log.unicasts.lock().unwrap().push((sender, payload));
        Ok(())
    }

    fn on_broadcast(&mut self, payload: Bytes) -> Result<Option<Fragments>, Failure> {
        if self.fail_broadcast {
            return Err(Failure);
        }
        self.log.broadcasts.lock().unwrap().push(payload);
        Ok(None)
    }

    fn current_state(&mut self) -> Fragments {
        self.log.state_calls.fetch_add(1, Ordering::Relaxed);
        self.state.clone()
    }
}

/// Driver-side handle for a [`Stall`] gossiper.
pub struct Hold {
    /// Signaled once the gossiper has entered its first unicast callback.
    pub entered: mpsc::Receiver<()>,
    /// Send to let the blocked callback return.
    pub release: mpsc::Sender<()>,
}

/// A gossiper that blocks inside its first unicast callback until released,
/// stalling the owning actor while its mailbox fills.
pub struct Stall<P> {
    log: Arc<Log<P>>,
    gate: Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>,
}

impl<P: PeerId> Stall<P> {
    pub fn new() -> (Self, Arc<Log<P>>, Hold) {
        let log = Log::new();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        (
            Self {
                log: log.clone(),
                gate: Some((entered_tx, release_rx)),
            },
            log,
            Hold {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }
}

impl<P: PeerId> Gossiper<P> for Stall<P> {
    type Data = Fragments;
    type Error = Failure;

    fn on_unicast(&mut self, sender: P, payload: Bytes) -> Result<(), Failure> {
        if let Some((entered, release)) = self.gate.take() {
            let _ = entered.send(());
            let _ = release.recv();
        }
        self.log.unicasts.lock().unwrap().push((sender, payload));
        Ok(())
    }

    fn on_broadcast(&mut self, payload: Bytes) -> Result<Option<Fragments>, Failure> {
        self.log.broadcasts.lock().unwrap().push(payload);
        Ok(None)
    }

    fn current_state(&mut self) -> Fragments {
        self.log.state_calls.fetch_add(1, Ordering::Relaxed);
        Fragments::default()
    }
}

/// State carrying a set of values in one fragment.
#[derive(Clone, Debug)]
pub struct SetState(pub BTreeSet<u64>);

impl GossipData for SetState {
    fn encode(&self) -> Vec<Bytes> {
        let mut buf = Vec::with_capacity(self.0.len() * 8);
        for value in &self.0 {
            buf.extend_from_slice(&value.to_be_bytes());
        }
        vec![Bytes::from(buf)]
    }
}

/// A gossiper that unions every received [`SetState`] into its own.
pub struct Merger {
    seen: Arc<Mutex<BTreeSet<u64>>>,
}

impl Merger {
    /// Create a merger holding `initial`, and a handle to its set.
    pub fn new(initial: impl IntoIterator<Item = u64>) -> (Self, Arc<Mutex<BTreeSet<u64>>>) {
        let seen = Arc::new(Mutex::new(initial.into_iter().collect()));
        (Self { seen: seen.clone() }, seen)
    }

    fn merge(&self, payload: &[u8]) {
        let mut seen = self.seen.lock().unwrap();
        for chunk in payload.chunks_exact(8) {
            seen.insert(u64::from_be_bytes(chunk.try_into().unwrap()));
        }
    }
}

impl<P: PeerId> Gossiper<P> for Merger {
    type Data = SetState;
    type Error = Failure;

    fn on_unicast(&mut self, _sender: P, payload: Bytes) -> Result<(), Failure> {
        self.merge(&payload);
        Ok(())
    }

    fn on_broadcast(&mut self, payload: Bytes) -> Result<Option<SetState>, Failure> {
        self.merge(&payload);
        Ok(Some(SetState(self.seen.lock().unwrap().clone())))
    }

    fn current_state(&mut self) -> SetState {
        SetState(self.seen.lock().unwrap().clone())
    }
}
