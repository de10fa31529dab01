use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Durable identity for one (segment, symbol) pair in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Surrogate identifier, assigned by the store on first insert
    pub id: i64,
    /// Display name as last recorded during seeding
    pub name: String,
    /// Market segment identifier, immutable once assigned
    pub mid: i64,
    /// Market-local symbol, unique within a segment
    pub symbol: String,
    /// PEA (tax-advantaged) eligibility, derived from the segment
    pub pea: bool,
    /// Sector code; not populated by ingestion
    pub sector: i64,
}

/// One persisted tick observation
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub date: NaiveDateTime,
    pub cid: i64,
    pub value: f64,
    pub volume: u64,
}

/// Daily OHLCV aggregate of all ticks for one company on one calendar day
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub cid: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// Source volume is cumulative intraday, so the day's max is the
    /// day's total
    pub volume: u64,
}
