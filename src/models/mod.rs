mod company;
mod config;
mod segment;
mod snapshot;

pub use company::{Company, DailyBar, Tick};
pub use config::{IngestConfig, RenamePolicy};
pub use segment::Segment;
pub use snapshot::{ListingRow, LoadOutcome, RawQuoteRow, SnapshotFile, TickRow};

use std::collections::HashMap;

/// Resolved symbol -> company id mapping for one segment
pub type SymbolMap = HashMap<String, i64>;
