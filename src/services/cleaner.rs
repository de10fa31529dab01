use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::Result;
use crate::models::{ListingRow, LoadOutcome, RawQuoteRow, TickRow};

/// Trailing quote-state marker, e.g. "(c)" for capped or "(s)" for suspended
static PRICE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([A-Za-z]{1,2}\)$").expect("valid marker pattern"));

/// Normalize a raw price field to a decimal
///
/// Removes embedded whitespace and a trailing one-or-two-letter
/// parenthesized marker, then parses the remainder. Returns `None` when
/// nothing parseable is left.
pub fn clean_price(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let without_marker = PRICE_MARKER.replace(&compact, "");
    if without_marker.is_empty() {
        return None;
    }
    without_marker.parse::<f64>().ok()
}

/// Coerce a raw volume field to a non-negative integer
pub fn clean_volume(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(volume) = trimmed.parse::<u64>() {
        return Some(volume);
    }
    // Some capture batches serialize volumes as floats ("1234.0")
    match trimmed.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 => Some(value as u64),
        _ => None,
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Load one snapshot and extract cleaned tick rows
///
/// Rows with missing fields are unusable and dropped. A row failing numeric
/// coercion after cleaning is a defect: it is logged and dropped, never
/// silently coerced, and never aborts the rest of the file. Zero-volume
/// rows are dropped when `drop_zero_volume` is set.
pub fn load_ticks(path: &Path, drop_zero_volume: bool) -> LoadOutcome {
    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(e) => return LoadOutcome::Fatal(e.into()),
    };

    let mut rows = Vec::new();
    let mut seen_symbols = HashSet::new();
    let mut dropped = 0usize;

    for record in reader.deserialize::<RawQuoteRow>() {
        let raw = match record {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Dropping undecodable row in {:?}: {}", path, e);
                dropped += 1;
                continue;
            }
        };

        let (symbol, last, volume) = match (
            non_empty(&raw.symbol),
            non_empty(&raw.last),
            non_empty(&raw.volume),
        ) {
            (Some(symbol), Some(last), Some(volume)) => (symbol, last, volume),
            _ => {
                dropped += 1;
                continue;
            }
        };

        let price = match clean_price(last) {
            Some(price) => price,
            None => {
                warn!(
                    "Dropping row {:?} in {:?}: unparseable price {:?}",
                    symbol, path, last
                );
                dropped += 1;
                continue;
            }
        };
        let volume = match clean_volume(volume) {
            Some(volume) => volume,
            None => {
                warn!(
                    "Dropping row {:?} in {:?}: unparseable volume",
                    symbol, path
                );
                dropped += 1;
                continue;
            }
        };

        if drop_zero_volume && volume == 0 {
            continue;
        }

        // The file encodes one row per instrument; defend against repeats
        if !seen_symbols.insert(symbol.to_string()) {
            continue;
        }

        rows.push(TickRow {
            symbol: symbol.to_string(),
            price,
            volume,
        });
    }

    if rows.is_empty() {
        return LoadOutcome::Skip {
            reason: format!("no usable rows ({} dropped)", dropped),
        };
    }

    LoadOutcome::Rows(rows)
}

/// Load one snapshot and extract (symbol, name) pairs for identity
/// resolution, dropping price and volume
pub fn load_listings(path: &Path) -> Result<Vec<ListingRow>> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut rows = Vec::new();
    let mut seen_symbols = HashSet::new();

    for record in reader.deserialize::<RawQuoteRow>() {
        let raw = match record {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Dropping undecodable row in {:?}: {}", path, e);
                continue;
            }
        };

        let (symbol, name) = match (non_empty(&raw.symbol), non_empty(&raw.name)) {
            (Some(symbol), Some(name)) => (symbol, name),
            _ => continue,
        };

        if !seen_symbols.insert(symbol.to_string()) {
            continue;
        }

        rows.push(ListingRow {
            symbol: symbol.to_string(),
            name: name.to_string(),
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_snapshot(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_clean_price_strips_marker() {
        assert_eq!(clean_price("123.45(c)"), Some(123.45));
        assert_eq!(clean_price(" 67.2 (s)"), Some(67.2));
        assert_eq!(clean_price("15.80(ab)"), Some(15.8));
    }

    #[test]
    fn test_clean_price_plain() {
        assert_eq!(clean_price("42.5"), Some(42.5));
        assert_eq!(clean_price(" 1 234.5 "), Some(1234.5));
    }

    #[test]
    fn test_clean_price_rejects_garbage() {
        assert_eq!(clean_price("n/a"), None);
        assert_eq!(clean_price(""), None);
        assert_eq!(clean_price("(c)"), None);
    }

    #[test]
    fn test_clean_volume() {
        assert_eq!(clean_volume("1200"), Some(1200));
        assert_eq!(clean_volume("1200.0"), Some(1200));
        assert_eq!(clean_volume("-5"), None);
        assert_eq!(clean_volume("12.5"), None);
        assert_eq!(clean_volume("abc"), None);
    }

    #[test]
    fn test_load_ticks_cleans_rows() {
        let temp_dir = tempdir().unwrap();
        let path = write_snapshot(
            temp_dir.path(),
            "compA 2019-01-02 09:02:02.csv",
            "symbol,name,last,volume\n\
             ALP,Alpha Corp,10.5(c),1200\n\
             BET,Beta Corp,20.0,0\n\
             GAM,Gamma NV,not-a-price,300\n\
             DEL,,5.0,\n",
        );

        let outcome = load_ticks(&path, true);
        match outcome {
            LoadOutcome::Rows(rows) => {
                // BET dropped (zero volume), GAM dropped (bad price),
                // DEL dropped (missing volume)
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].symbol, "ALP");
                assert_eq!(rows[0].price, 10.5);
                assert_eq!(rows[0].volume, 1200);
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_load_ticks_keeps_zero_volume_when_configured() {
        let temp_dir = tempdir().unwrap();
        let path = write_snapshot(
            temp_dir.path(),
            "compA 2019-01-02 09:02:02.csv",
            "symbol,name,last,volume\nBET,Beta Corp,20.0,0\n",
        );

        match load_ticks(&path, false) {
            LoadOutcome::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].volume, 0);
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_load_ticks_duplicate_symbol_first_wins() {
        let temp_dir = tempdir().unwrap();
        let path = write_snapshot(
            temp_dir.path(),
            "compA 2019-01-02 09:02:02.csv",
            "symbol,name,last,volume\nALP,Alpha Corp,10.0,100\nALP,Alpha Corp,11.0,200\n",
        );

        match load_ticks(&path, true) {
            LoadOutcome::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].price, 10.0);
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_load_ticks_empty_file_is_skip() {
        let temp_dir = tempdir().unwrap();
        let path = write_snapshot(
            temp_dir.path(),
            "compA 2019-01-02 09:02:02.csv",
            "symbol,name,last,volume\n",
        );

        assert!(matches!(
            load_ticks(&path, true),
            LoadOutcome::Skip { .. }
        ));
    }

    #[test]
    fn test_load_ticks_missing_file_is_fatal() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("missing.csv");
        assert!(matches!(load_ticks(&path, true), LoadOutcome::Fatal(_)));
    }

    #[test]
    fn test_load_listings_keeps_symbol_and_name() {
        let temp_dir = tempdir().unwrap();
        let path = write_snapshot(
            temp_dir.path(),
            "compA 2019-01-02 09:02:02.csv",
            "symbol,name,last,volume\n\
             ALP,Alpha Corp,10.5,1200\n\
             BET,Beta Corp,20.0,0\n\
             NON,,1.0,10\n",
        );

        let listings = load_listings(&path).unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].symbol, "ALP");
        assert_eq!(listings[0].name, "Alpha Corp");
        // Zero volume is irrelevant to identity resolution
        assert_eq!(listings[1].symbol, "BET");
    }
}
