pub mod aggregator;
pub mod catalog;
pub mod cleaner;
pub mod database;
pub mod ingest;
pub mod resolver;

pub use catalog::{build_catalog, Catalog};
pub use database::{MarketStore, StoreCounts};
pub use ingest::{ingest_segment, IngestStats};
pub use resolver::seed_registry;
