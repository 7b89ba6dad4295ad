pub mod engine;

pub use engine::{DataMappingEngine, DataMappingEngineConfig, MappingRule};
