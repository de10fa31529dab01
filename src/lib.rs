//! Batch ingestion pipeline for archived stock-quote snapshots.
//!
//! A run discovers dated snapshot files, seeds the company registry,
//! streams each undone file into the tick store behind a durable
//! processed-file ledger, and rolls ticks up into daily OHLCV bars.

pub mod cli;
pub mod commands;
pub mod error;
pub mod models;
pub mod services;
