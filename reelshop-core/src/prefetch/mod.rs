//! Tiered media prefetching.
//!
//! Requests are tagged with a [`LoadTier`], held back by the tier's release
//! delay, then dispatched strictly by priority with bounded concurrency.
//! Results are reported on an event channel; cancelled requests report
//! nothing.

mod request;
mod scheduler;
mod tier;

pub use request::{LoadEvent, LoadOutcome, LoadTicket, TicketId};
pub use scheduler::{PrefetchScheduler, SchedulerSnapshot};
pub use tier::{LoadTier, TierDelays};
