// src/lib.rs
pub mod api;
pub mod config;
pub mod engine;
pub mod extract;
pub mod indexer;
pub mod pool;
pub mod query;
pub mod schema;
pub mod store;

pub use api::*;
pub use config::{AppConfig, CONFIG};
pub use engine::{EngineError, EngineResult, LocalMediaSource, LocalMediaSourceBuilder};
pub use query::*;
