pub mod analytics;
pub mod config;
pub mod http_api;
pub mod identity;
pub mod ingest;
pub mod metrics_server;
pub mod observability;
pub mod payload;
pub mod store;
pub mod transform;

pub use analytics::AnalyticsAggregator;
pub use ingest::{IngestError, IngestOutcome, IngestionCoordinator};
pub use payload::TelemetryPayload;
