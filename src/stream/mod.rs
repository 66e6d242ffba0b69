//! Send and receive pipelines around the packetization engine
pub mod backpressure;
pub mod epoch;
pub mod pool;
pub mod receiver;
pub mod sender;
pub mod stats;

pub use backpressure::{Admission, AdmissionCounters, CaptureGate};
pub use epoch::{EpochController, EpochListener};
pub use pool::BufferPool;
pub use receiver::FrameReceiver;
pub use sender::FrameSender;
pub use stats::{ReceiverStats, SenderStats};
