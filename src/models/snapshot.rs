use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::Segment;

/// One discovered snapshot archive
///
/// Built at catalog time from the directory scan. The capture timestamp is
/// derived from the filename alone; file contents are never inspected for
/// ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotFile {
    /// Absolute path of the file on disk
    pub path: String,
    /// Market segment the filename tag resolved to
    pub segment: Segment,
    /// Capture timestamp embedded in the filename (no timezone guaranteed)
    pub captured_at: NaiveDateTime,
}

impl SnapshotFile {
    pub fn new(path: String, segment: Segment, captured_at: NaiveDateTime) -> Self {
        Self {
            path,
            segment,
            captured_at,
        }
    }
}

/// Raw CSV row as it appears inside a snapshot file
///
/// Every field is optional so that rows with missing values are detectable
/// at the cleaning boundary instead of surfacing as decode failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuoteRow {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub last: Option<String>,
    pub volume: Option<String>,
}

/// Cleaned, typed tick row ready for registry join and insertion
#[derive(Debug, Clone, PartialEq)]
pub struct TickRow {
    pub symbol: String,
    pub price: f64,
    pub volume: u64,
}

/// Cleaned (symbol, display name) pair used for identity resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub symbol: String,
    pub name: String,
}

/// Typed result of loading one snapshot file
///
/// The orchestrator branches on the variant: `Rows` is persisted and the
/// file marked done, `Skip` is marked done without persisting anything,
/// `Fatal` leaves the file off the ledger so it is retried next run.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Usable tick rows extracted from the file
    Rows(Vec<TickRow>),
    /// File was readable but yielded no usable rows
    Skip { reason: String },
    /// File could not be read or decoded at all
    Fatal(AppError),
}
