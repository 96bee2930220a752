//! Access-event harvester (§4.G): pull-mode polling of OS audit sources plus
//! push-mode streaming providers, both converging on the same
//! `RawAccessEvent` shape before they reach `file_access_events`. Plugs into
//! a running process as two independent loops — [`handlers::PullHarvestLoop`]
//! for the cursor-based pull providers, [`stream_manager::StreamManager`] for
//! the buffered stream providers — rather than a `JobHandler`, since neither
//! has a natural "job" boundary: both run continuously for as long as the
//! process is up.

pub mod checkpoint;
pub mod handlers;
pub mod providers;
pub mod repository;
pub mod scan_trigger;
pub mod stream_manager;
pub mod types;

pub use checkpoint::CheckpointRepository;
pub use handlers::PullHarvestLoop;
pub use repository::EventRepository;
pub use scan_trigger::ScanTriggerHook;
pub use stream_manager::StreamManager;
pub use types::{AccessAction, RawAccessEvent};
