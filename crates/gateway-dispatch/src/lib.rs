//! # Gateway Dispatch
//!
//! Name-based dispatch of downstream calls: resolves a logical service
//! name through [`gateway_types::ports::service_discovery::ServiceDiscovery`],
//! round-robins across the healthy endpoints returned, and forwards the
//! request wrapped in that service's `gateway-reliability` resilience
//! envelope.
//!
//! ## Organization
//!
//! - `discovery`: `ServiceDiscovery` adapters (static config table, in-memory test double)
//! - `dispatcher`: `RouteDispatcher`, the load-balanced, envelope-wrapped forwarder

pub mod discovery;
pub mod dispatcher;

pub use discovery::{InMemoryServiceDiscovery, StaticServiceDiscovery};
pub use dispatcher::{DownstreamResponse, RouteDispatcher, ServiceResilienceConfig, ServiceResilienceTable};
