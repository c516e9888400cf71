//! Covertype Core - Batch distribution service
//!
//! Hands out bounded, time-throttled random slices of a fixed dataset to
//! a fixed number of consumer groups:
//! - `Dataset` - The labeled records, loaded once at startup
//! - `Partitions` - Contiguous, equal-size slice of the dataset per group
//! - `LedgerStore` - Per-group progress, persisted as a JSON document
//! - `Distributor` - Time gate, exhaustion ceiling and sampling
//!
//! Time and randomness are injected (`Clock`, `SampleRng`) so the gate
//! can be driven deterministically.

pub mod clock;
pub mod dataset;
mod distributor;
mod error;
pub mod ledger;
mod logging;
mod partition;
mod rng;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dataset::{Dataset, Record};
pub use distributor::{Batch, Distributor};
pub use error::{Error, Result};
pub use ledger::{LedgerEntry, LedgerStore};
pub use logging::init_logging;
pub use partition::Partitions;
pub use rng::SampleRng;

/// Number of consumer groups, numbered `1..=GROUP_COUNT`
pub const GROUP_COUNT: usize = 10;

/// Seconds that must elapse before a group's batch counter advances again
pub const MIN_UPDATE_SECS: f64 = 300.0;

/// Batch count at which a group is permanently exhausted
pub const MAX_BATCH_COUNT: i64 = 10;
