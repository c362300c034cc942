// Pulse Infrastructure - HTTP Adapter
// Implements: EventCollector

mod http_collector;

pub use http_collector::HttpCollector;
