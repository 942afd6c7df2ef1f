//! Entity-detection and sentiment services on top of the model manager.
//!
//! Both services are configured once through `initialize` and then serve
//! concurrent calls. Model output is combined with the deterministic
//! detectors from `veil-patterns` and degrades to them when no model is
//! available.

mod cache;
mod config;
mod constants;
mod error;
mod pii;
mod sentiment;
mod stats;

pub use cache::ResultCache;
pub use config::{EntityDetectionConfig, SentimentConfig};
pub use constants::*;
pub use error::{PipelineError, Result};
pub use pii::{PiiDetector, RedactionResult};
pub use sentiment::SentimentAnalyzer;
pub use stats::{ServiceStats, StatsRecorder};
