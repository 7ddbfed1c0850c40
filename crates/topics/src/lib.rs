//! In-memory topic registry and per-topic FIFO queues.
//!
//! Topics are created lazily by the first publish and live until the
//! registry is cleared. Each topic owns a bounded queue: publishers wait when
//! it is full, pollers wait (up to a timeout) when it is empty, and every
//! message is handed to exactly one poller.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod queue;
mod registry;

pub use error::{Error, Result};
pub use queue::TopicQueue;
pub use registry::{DEFAULT_QUEUE_CAPACITY, PollOutcome, TopicRegistry};
