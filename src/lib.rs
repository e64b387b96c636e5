//! Input plugin that polls the Angie status API and flattens every status
//! document into tagged measurements.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod schema;

pub use client::StatusClient;
pub use config::{Config, ShimConfig, SAMPLE_CONFIG};
pub use endpoint::Endpoint;
pub use error::Error;
pub use metrics::{Accumulator, FieldValue, Measurement, MetricsCollector, Tags};
pub use poller::AngieApi;
pub use schema::{ApiVersion, Resource};

/// The documented sample configuration.
pub fn sample_config() -> &'static str {
    SAMPLE_CONFIG
}
