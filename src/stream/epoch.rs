//! Stream generation counter
//!
//! The epoch is bumped once per reconfiguration (resolution change and the
//! like). Senders stamp it into every packet; receivers drop packets whose
//! epoch differs from their own. Receive-side state registers itself as an
//! [`EpochListener`] so that the bump and the reassembly reset happen under
//! the same lock that guards ingestion: no packet is ever ingested against a
//! mix of old and new state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Receive-side state that must be reset when the epoch moves.
pub trait EpochListener: Send {
    fn on_epoch(&mut self, epoch: u8);
}

type Listener = Weak<Mutex<dyn EpochListener>>;

/// Shared epoch counter. Clones observe and advance the same counter.
#[derive(Clone, Default)]
pub struct EpochController {
    epoch: Arc<AtomicU8>,
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl EpochController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(epoch: u8) -> Self {
        Self {
            epoch: Arc::new(AtomicU8::new(epoch)),
            listeners: Arc::default(),
        }
    }

    pub fn current(&self) -> u8 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Register receive-side state to be reset on every bump.
    pub fn attach(&self, listener: &Arc<Mutex<dyn EpochListener>>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(Arc::downgrade(listener));
    }

    /// Start a new stream generation and return its epoch.
    ///
    /// Every attached listener is locked before the counter moves and is
    /// reset before it is released. The counter wraps at 256; only equality
    /// is ever compared.
    pub fn advance(&self) -> u8 {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.strong_count() > 0);

        let live: Vec<Arc<Mutex<dyn EpochListener>>> =
            listeners.iter().filter_map(Weak::upgrade).collect();
        let mut guards: Vec<_> = live
            .iter()
            .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        for guard in guards.iter_mut() {
            guard.on_epoch(epoch);
        }

        log::info!(
            "Advanced stream epoch to {} ({} receivers reset)",
            epoch,
            guards.len()
        );
        epoch
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for EpochController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochController")
            .field("epoch", &self.current())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
