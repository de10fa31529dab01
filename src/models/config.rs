use std::path::PathBuf;

use crate::models::Segment;

/// What to do when a seeded symbol shows up with a different display name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenamePolicy {
    /// Update the stored name only when it differs (idempotent default)
    #[default]
    UpdateIfChanged,
    /// Write the incoming name unconditionally
    AlwaysOverwrite,
}

/// Configuration for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root of the dated snapshot tree (`root/<year>/<file>`)
    pub data_dir: PathBuf,
    /// Path of the SQLite database file
    pub database_path: PathBuf,
    /// Drop tick rows whose volume is exactly zero
    pub drop_zero_volume: bool,
    /// Display-name update policy for already-seeded symbols
    pub rename_policy: RenamePolicy,
    /// Worker count for the catalog scan
    pub workers: usize,
    /// Restrict the run to a single segment
    pub segment_filter: Option<Segment>,
}

impl IngestConfig {
    pub fn new(data_dir: PathBuf, database_path: PathBuf) -> Self {
        Self {
            data_dir,
            database_path,
            drop_zero_volume: true,
            rename_policy: RenamePolicy::default(),
            workers: 4,
            segment_filter: None,
        }
    }
}
