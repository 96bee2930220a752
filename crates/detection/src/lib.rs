pub mod alias;
pub mod chunking;
pub mod context;
pub mod entity;
pub mod ner;
pub mod patterns;
pub mod pipeline;
pub mod secrets;
pub mod span;
pub mod validators;

pub use entity::{Entity, Mention};
pub use ner::NerModel;
pub use pipeline::{DetectionPipeline, DetectionResult};
pub use span::{Span, SpanSource};
