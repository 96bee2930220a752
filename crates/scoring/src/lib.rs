pub mod policy;
pub mod scorer;

pub use openlabels_core::types::ExposureLevel;
pub use policy::{evaluate, EntityObservation, Policy, PolicyMatch, PolicyResult, Trigger};
pub use scorer::{score, RiskTier};
