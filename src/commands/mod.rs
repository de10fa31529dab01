pub mod aggregate;
pub mod ingest;
pub mod status;
