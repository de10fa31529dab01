use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::Result;
use crate::models::{DailyBar, Tick};
use crate::services::database::MarketStore;

/// Reduce one (calendar day, company) group of ticks into a daily bar
///
/// open = price at the earliest timestamp, close = price at the latest,
/// high/low = extremes, volume = max. Source volume is cumulative over the
/// trading day, so the day's maximum is the day's total; summing would
/// overcount. A single tick yields open = close = high = low.
fn reduce_day(date: NaiveDate, cid: i64, mut ticks: Vec<Tick>) -> DailyBar {
    ticks.sort_by_key(|tick| tick.date);

    let first = &ticks[0];
    let last = &ticks[ticks.len() - 1];

    let open = first.value;
    let close = last.value;
    let high = ticks.iter().map(|t| t.value).fold(f64::NEG_INFINITY, f64::max);
    let low = ticks.iter().map(|t| t.value).fold(f64::INFINITY, f64::min);
    let volume = ticks.iter().map(|t| t.volume).max().unwrap_or(0);

    DailyBar {
        date,
        cid,
        open,
        close,
        high,
        low,
        volume,
    }
}

/// Derive daily bars from a tick set, one per (date, company) group
pub fn build_daily_bars(ticks: Vec<Tick>) -> Vec<DailyBar> {
    let mut groups: HashMap<(NaiveDate, i64), Vec<Tick>> = HashMap::new();
    for tick in ticks {
        groups
            .entry((tick.date.date(), tick.cid))
            .or_default()
            .push(tick);
    }

    let mut bars: Vec<DailyBar> = groups
        .into_iter()
        .map(|((date, cid), group)| reduce_day(date, cid, group))
        .collect();

    bars.sort_by_key(|bar| (bar.date, bar.cid));
    bars
}

/// Recompute daily bars over the full tick table
///
/// Set-based recomputation keyed by (date, cid): rerunning over an
/// unchanged tick table leaves `daystocks` identical.
pub async fn aggregate_daily(store: &MarketStore) -> Result<usize> {
    aggregate_daily_since(store, None).await
}

/// Recompute daily bars for ticks at or after `since`
///
/// Restricting to the affected date range keeps incremental runs cheap.
pub async fn aggregate_daily_since(
    store: &MarketStore,
    since: Option<NaiveDate>,
) -> Result<usize> {
    let ticks = store.ticks_since(since).await?;
    let bars = build_daily_bars(ticks);

    debug!(
        "Aggregated {} daily bars (since {:?})",
        bars.len(),
        since
    );

    store.upsert_daily_bars(&bars).await
}
