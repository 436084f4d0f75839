//! Fire-and-forget request metrics collection and dashboard read-side
//! aggregation, backed by the same Redis/`deadpool-redis` store used for
//! sessions and authz caching.
//!
//! Three pieces, matching the write/read split used throughout this
//! workspace:
//!
//! - [`collector::MetricsCollector`] — the gateway's own per-request
//!   writer. Never awaited on the request path.
//! - [`reporter::MetricsReporter`] — a per-service background publisher
//!   of health/latency/datasource snapshots, embedded by every service
//!   (including the gateway itself) that wants to show up on the
//!   dashboard.
//! - [`aggregator::MetricsAggregator`] — the dashboard's read side: seven
//!   query handlers, each a bounded number of store round-trips.

pub mod aggregator;
pub mod collector;
pub mod dto;
pub mod reporter;

pub use aggregator::MetricsAggregator;
pub use collector::MetricsCollector;
pub use reporter::{DatasourceProbe, MetricsReporter, RequestTally};
