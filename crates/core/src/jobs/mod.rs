pub mod executor;
pub mod traits;
pub mod types;

pub use executor::{JobExecutor, ExecutorConfig};
pub use traits::JobQueue;
pub use traits::{Job, JobHandler, JobResult};
pub use types::{JobId, JobPriority, JobState, JobStatus, SerializableJob};