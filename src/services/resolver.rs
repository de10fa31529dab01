use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{RenamePolicy, Segment, SnapshotFile, SymbolMap};
use crate::services::cleaner;
use crate::services::database::MarketStore;

/// Seed the company registry for one segment and return its symbol map
///
/// Takes the segment's full chronological file list, keeps the last file
/// per calendar day (one observation per day is enough for identity
/// discovery), extracts (symbol, name) pairs, and dedupes by symbol with
/// the most recent display name winning. Unknown symbols get a new
/// registry row with a store-assigned id; known symbols are renamed
/// according to `policy`.
///
/// Must fully commit before the segment's orchestrator starts reading.
pub async fn seed_registry(
    store: &MarketStore,
    segment: Segment,
    files: &[SnapshotFile],
    policy: RenamePolicy,
) -> Result<SymbolMap> {
    // Last snapshot per calendar day; files arrive in ascending order
    let mut daily_latest: BTreeMap<NaiveDate, &SnapshotFile> = BTreeMap::new();
    for file in files {
        daily_latest.insert(file.captured_at.date(), file);
    }

    // Most recent name per symbol across the daily snapshots
    let mut latest_names: HashMap<String, String> = HashMap::new();
    for file in daily_latest.values() {
        match cleaner::load_listings(Path::new(&file.path)) {
            Ok(listings) => {
                for listing in listings {
                    latest_names.insert(listing.symbol, listing.name);
                }
            }
            Err(e) => {
                warn!("Skipping {} during identity resolution: {}", file.path, e);
            }
        }
    }

    let existing = store.companies_for_segment(segment).await?;
    let mut symbol_map: SymbolMap = existing
        .iter()
        .map(|company| (company.symbol.clone(), company.id))
        .collect();
    let known_names: HashMap<&str, &str> = existing
        .iter()
        .map(|company| (company.symbol.as_str(), company.name.as_str()))
        .collect();

    let mut inserted = 0usize;
    let mut renamed = 0usize;

    for (symbol, name) in &latest_names {
        match symbol_map.get(symbol) {
            Some(&id) => {
                let update = match policy {
                    RenamePolicy::UpdateIfChanged => {
                        known_names.get(symbol.as_str()) != Some(&name.as_str())
                    }
                    RenamePolicy::AlwaysOverwrite => true,
                };
                if update {
                    store.rename_company(id, name).await?;
                    renamed += 1;
                }
            }
            None => {
                let id = store.insert_company(name, segment, symbol).await?;
                symbol_map.insert(symbol.clone(), id);
                inserted += 1;
            }
        }
    }

    info!(
        "Registry for {}: {} symbols ({} new, {} renamed)",
        segment,
        symbol_map.len(),
        inserted,
        renamed
    );

    Ok(symbol_map)
}
