//! mnemo-core: Learning analytics and spaced-repetition scheduling.
//!
//! This crate defines the attempt/card data model, the pure analyzers that
//! derive mastery and behavior signals from an event window, the review
//! scheduler state machine, and the engine that merges everything into one
//! report.

pub mod behavior;
pub mod config;
pub mod difficulty;
pub mod efficiency;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod mastery;
pub mod model;
pub mod report;
pub mod scheduler;
pub mod statistics;
pub mod temporal;
pub mod traits;

pub use config::EngineConfig;
pub use engine::AnalyticsEngine;
pub use error::EngineError;
pub use model::{AttemptEvent, CardKey, MemoryCardState};
pub use report::AnalyticsReport;
