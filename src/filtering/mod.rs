pub mod engine;

pub use engine::{FilterDecision, FilterEngine, FilterEngineConfig, FilterError, FilterRule};
