use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::{Segment, SnapshotFile};

/// Per-segment catalogs of discovered snapshot files
///
/// Each segment's files are keyed by capture timestamp in ascending order;
/// a later file at an identical timestamp replaces the earlier one.
#[derive(Debug, Default)]
pub struct Catalog {
    per_segment: HashMap<Segment, BTreeMap<NaiveDateTime, SnapshotFile>>,
    /// Files whose embedded timestamp could not be parsed
    pub parse_failures: usize,
    /// Files matching no known segment tag
    pub unclassified: usize,
}

impl Catalog {
    /// Files of one segment in ascending capture-time order
    pub fn segment_files(&self, segment: Segment) -> Vec<SnapshotFile> {
        self.per_segment
            .get(&segment)
            .map(|files| files.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of cataloged files across all segments
    pub fn total_files(&self) -> usize {
        self.per_segment.values().map(|files| files.len()).sum()
    }

    fn insert(&mut self, file: SnapshotFile) {
        self.per_segment
            .entry(file.segment)
            .or_default()
            .insert(file.captured_at, file);
    }
}

/// Recover the capture timestamp embedded in a snapshot filename
///
/// The filename carries the timestamp between its segment tag and its
/// extension. Stripping every alphabetic character isolates the timestamp
/// substring regardless of which tag matched; underscores stand in for
/// colons in some capture batches.
pub fn parse_capture_timestamp(filename: &str) -> Result<NaiveDateTime> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| AppError::Parse(format!("unreadable filename: {}", filename)))?;

    let digits: String = stem.chars().filter(|c| !c.is_alphabetic()).collect();
    let cleaned = digits.replace('_', ":");
    let cleaned = cleaned.trim_matches(|c: char| !c.is_ascii_digit());

    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Ok(parsed);
        }
    }
    // Date-only filenames map to midnight
    if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }

    Err(AppError::Parse(format!(
        "no timestamp in filename: {} (stripped: {:?})",
        filename, cleaned
    )))
}

/// Classify one discovered path into a catalog entry
///
/// Returns `Ok(None)` for files carrying no known segment tag.
fn classify_path(path: &Path) -> Result<Option<SnapshotFile>> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::Parse(format!("unreadable path: {:?}", path)))?;

    let segment = match Segment::classify(filename) {
        Some(segment) => segment,
        None => return Ok(None),
    };

    let captured_at = parse_capture_timestamp(filename)?;
    Ok(Some(SnapshotFile::new(
        path.to_string_lossy().into_owned(),
        segment,
        captured_at,
    )))
}

/// Enumerate every regular file under the dated tree
fn enumerate_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Build per-segment catalogs from a dated snapshot tree
///
/// Classification is pure and read-only, so the file list is sharded
/// across `workers` tasks; each shard accumulates into its own result
/// list and everything is merged after all workers have joined. No
/// segment is handed to the resolver before the merge completes.
pub async fn build_catalog(root: &Path, workers: usize) -> Result<Catalog> {
    if !root.is_dir() {
        return Err(AppError::Config(format!(
            "data directory not found: {:?}",
            root
        )));
    }

    let files = enumerate_files(root)?;
    debug!("Catalog scan found {} files under {:?}", files.len(), root);

    let workers = workers.max(1);
    let shard_size = files.len().div_ceil(workers).max(1);

    let mut handles = Vec::new();
    for shard in files.chunks(shard_size) {
        let shard: Vec<PathBuf> = shard.to_vec();
        handles.push(tokio::task::spawn_blocking(move || {
            let mut classified = Vec::new();
            let mut parse_failures = 0usize;
            let mut unclassified = 0usize;

            for path in shard {
                match classify_path(&path) {
                    Ok(Some(file)) => classified.push(file),
                    Ok(None) => unclassified += 1,
                    Err(e) => {
                        warn!("Excluding {:?} from catalog: {}", path, e);
                        parse_failures += 1;
                    }
                }
            }

            (classified, parse_failures, unclassified)
        }));
    }

    let mut catalog = Catalog::default();
    for handle in handles {
        let (classified, parse_failures, unclassified) = handle
            .await
            .map_err(|e| AppError::Other(format!("catalog worker panicked: {}", e)))?;
        for file in classified {
            catalog.insert(file);
        }
        catalog.parse_failures += parse_failures;
        catalog.unclassified += unclassified;
    }

    if catalog.unclassified > 0 {
        warn!(
            "{} files matched no segment tag and were not cataloged",
            catalog.unclassified
        );
    }

    Ok(catalog)
}
