//! Bounded concurrent tile scheduling.
//!
//! [`TileScheduler`] runs a fixed pool of workers that pull tiles from a
//! shared queue in index order and push each through the retry policy.
//!
//! ```text
//!  queue: [t0 t1 t2 t3 ...]
//!            │   │
//!        worker 0  worker 1  ... (min(concurrency, tiles) workers)
//!            │   │
//!      fetch_with_retry
//!            │   │
//!   results + tracker.update   (one lock, so counts never go backwards)
//! ```
//!
//! Cancellation stops workers from taking new tiles. Attempts already in
//! flight finish, so at most `concurrency` results arrive after the cancel.

mod outcome;
mod pool;

pub use outcome::ScheduleOutcome;
pub use pool::TileScheduler;

#[cfg(test)]
mod tests;
