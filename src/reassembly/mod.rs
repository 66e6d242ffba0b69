/// Receive side: per-frame reassembly buffers and ordered delivery
pub mod sequencer;
pub mod store;

pub use sequencer::{DeliveryCounters, DeliverySequencer};
pub use store::{
    IngestOutcome, ReassemblyCounters, ReassemblyEntry, ReassemblyStore, DEFAULT_WINDOW,
    MAX_WINDOW,
};
