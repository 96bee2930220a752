pub mod advisory_lock;
pub mod backoff;
pub mod postgres_queue;
pub mod reclaimer;
pub mod scheduler;

pub use advisory_lock::{try_advisory_lock, AdvisoryLockId};
pub use postgres_queue::PostgresJobQueue;
pub use reclaimer::{ReclaimOutcome, Reclaimer};
pub use scheduler::Scheduler;
