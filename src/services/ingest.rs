use std::path::Path;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{IngestConfig, LoadOutcome, Segment, SnapshotFile, SymbolMap, Tick};
use crate::services::cleaner;
use crate::services::database::MarketStore;

/// Outcome counters for one segment's ingestion pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestStats {
    /// Files whose rows were persisted and that were marked done
    pub files_done: usize,
    /// Readable files with zero usable rows, marked done without persisting
    pub files_skipped: usize,
    /// Files that failed to load; left off the ledger for retry
    pub files_failed: usize,
    /// Files already on the ledger before this run
    pub files_already_done: usize,
    /// Tick rows written to the store
    pub ticks_written: usize,
    /// Rows dropped because their symbol had no registry entry
    pub unresolved_rows: usize,
    /// Earliest capture date touched by this pass, for incremental
    /// re-aggregation
    pub earliest_ingested: Option<NaiveDate>,
}

/// Stream a segment's undone snapshot files into the tick store
///
/// Files must arrive in ascending capture-time order with the segment's
/// registry fully seeded; the resolved `symbol_map` is held in memory for
/// the whole loop, never re-queried per file.
///
/// Per file: load and clean, inner-join against the symbol map (unresolved
/// symbols drop silently), stamp the capture timestamp, upsert the batch
/// in one transaction, then append the path to the ledger in a second
/// transaction. A crash between the two commits reprocesses the file next
/// run; the (date, cid) upsert key makes the replay harmless.
///
/// A single file failing isolates to that file. Store errors propagate and
/// abort the run, which resumes from the ledger.
pub async fn ingest_segment(
    store: &MarketStore,
    segment: Segment,
    files: &[SnapshotFile],
    symbol_map: &SymbolMap,
    config: &IngestConfig,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    let done = store.done_files().await?;
    let pending: Vec<&SnapshotFile> = files
        .iter()
        .filter(|file| !done.contains(&file.path))
        .collect();
    stats.files_already_done = files.len() - pending.len();

    debug!(
        "Ingesting {}: {} pending of {} cataloged files",
        segment,
        pending.len(),
        files.len()
    );

    let progress = ProgressBar::new(pending.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    progress.set_prefix(segment.tag());

    for file in pending {
        match cleaner::load_ticks(Path::new(&file.path), config.drop_zero_volume) {
            LoadOutcome::Rows(rows) => {
                let total = rows.len();
                let batch: Vec<Tick> = rows
                    .into_iter()
                    .filter_map(|row| {
                        symbol_map.get(&row.symbol).map(|&cid| Tick {
                            date: file.captured_at,
                            cid,
                            value: row.price,
                            volume: row.volume,
                        })
                    })
                    .collect();
                stats.unresolved_rows += total - batch.len();

                store.upsert_ticks(&batch).await?;
                store.mark_file_done(&file.path).await?;

                stats.ticks_written += batch.len();
                stats.files_done += 1;
                let day = file.captured_at.date();
                stats.earliest_ingested = Some(match stats.earliest_ingested {
                    Some(earliest) => earliest.min(day),
                    None => day,
                });
            }
            LoadOutcome::Skip { reason } => {
                // Nothing will ever come of this file; retrying is pointless
                debug!("Skipping {} ({})", file.path, reason);
                store.mark_file_done(&file.path).await?;
                stats.files_skipped += 1;
            }
            LoadOutcome::Fatal(e) => {
                // Left off the ledger so the next run retries it
                warn!("Failed to load {}: {}", file.path, e);
                stats.files_failed += 1;
            }
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RenamePolicy;
    use crate::services::{aggregator, catalog, resolver};
    use chrono::NaiveDateTime;
    use std::io::Write;
    use tempfile::tempdir;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn write_snapshot(dir: &std::path::Path, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn test_config(root: &std::path::Path) -> IngestConfig {
        IngestConfig::new(root.join("data"), root.join("test.db"))
    }

    #[tokio::test]
    async fn test_unresolved_symbol_drops_row_without_aborting() {
        let temp_dir = tempdir().unwrap();
        let store = MarketStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let config = test_config(temp_dir.path());

        write_snapshot(
            temp_dir.path(),
            "compA 2019-01-02 09:00:00.csv",
            "symbol,name,last,volume\nALP,Alpha Corp,10.0,100\nGHO,Ghost Corp,5.0,50\n",
        );
        let file = SnapshotFile::new(
            temp_dir
                .path()
                .join("compA 2019-01-02 09:00:00.csv")
                .to_string_lossy()
                .into_owned(),
            Segment::CompA,
            ts("2019-01-02 09:00:00"),
        );

        let cid = store
            .insert_company("Alpha Corp", Segment::CompA, "ALP")
            .await
            .unwrap();
        let symbol_map: SymbolMap = [("ALP".to_string(), cid)].into_iter().collect();

        let stats = ingest_segment(&store, Segment::CompA, &[file], &symbol_map, &config)
            .await
            .unwrap();

        assert_eq!(stats.files_done, 1);
        assert_eq!(stats.ticks_written, 1);
        assert_eq!(stats.unresolved_rows, 1);
        assert_eq!(store.counts().await.unwrap().ticks, 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_fatal_file_is_retried_and_isolated() {
        let temp_dir = tempdir().unwrap();
        let store = MarketStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let config = test_config(temp_dir.path());

        write_snapshot(
            temp_dir.path(),
            "compA 2019-01-02 10:00:00.csv",
            "symbol,name,last,volume\nALP,Alpha Corp,10.0,100\n",
        );
        let missing = SnapshotFile::new(
            temp_dir
                .path()
                .join("compA 2019-01-02 09:00:00.csv")
                .to_string_lossy()
                .into_owned(),
            Segment::CompA,
            ts("2019-01-02 09:00:00"),
        );
        let good = SnapshotFile::new(
            temp_dir
                .path()
                .join("compA 2019-01-02 10:00:00.csv")
                .to_string_lossy()
                .into_owned(),
            Segment::CompA,
            ts("2019-01-02 10:00:00"),
        );

        let cid = store
            .insert_company("Alpha Corp", Segment::CompA, "ALP")
            .await
            .unwrap();
        let symbol_map: SymbolMap = [("ALP".to_string(), cid)].into_iter().collect();

        let stats = ingest_segment(
            &store,
            Segment::CompA,
            &[missing.clone(), good.clone()],
            &symbol_map,
            &config,
        )
        .await
        .unwrap();

        // The broken file does not abort the good one
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.files_done, 1);
        // The broken file stays off the ledger
        assert!(!store.is_file_done(&missing.path).await.unwrap());
        assert!(store.is_file_done(&good.path).await.unwrap());
        store.close().await;
    }

    #[tokio::test]
    async fn test_full_pipeline_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let data_dir = temp_dir.path().join("data").join("2019");
        std::fs::create_dir_all(&data_dir).unwrap();

        write_snapshot(
            &data_dir,
            "compA 2019-01-02 09:00:00.csv",
            "symbol,name,last,volume\nALP,Alpha Corp,10.0,100\nBET,Beta Corp,20.0,10\n",
        );
        write_snapshot(
            &data_dir,
            "compA 2019-01-02 17:30:00.csv",
            "symbol,name,last,volume\nALP,Alpha Corp,12.0,900\nBET,Beta Corp,19.5,80\n",
        );
        write_snapshot(
            &data_dir,
            "compA 2019-01-03 17:30:00.csv",
            "symbol,name,last,volume\nALP,Alpha Corp,11.0,400\n",
        );

        let store = MarketStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let config = test_config(temp_dir.path());

        async fn run(store: &MarketStore, config: &IngestConfig) -> IngestStats {
            let catalog = catalog::build_catalog(&config.data_dir, config.workers)
                .await
                .unwrap();
            let files = catalog.segment_files(Segment::CompA);
            let symbol_map = resolver::seed_registry(
                store,
                Segment::CompA,
                &files,
                RenamePolicy::UpdateIfChanged,
            )
            .await
            .unwrap();
            let stats = ingest_segment(store, Segment::CompA, &files, &symbol_map, config)
                .await
                .unwrap();
            aggregator::aggregate_daily(store).await.unwrap();
            stats
        }

        let first = run(&store, &config).await;
        assert_eq!(first.files_done, 3);
        assert_eq!(first.ticks_written, 5);

        let counts_after_first = store.counts().await.unwrap();
        assert_eq!(counts_after_first.ticks, 5);
        // 2 companies x 2 days, minus BET on day 2
        assert_eq!(counts_after_first.bars, 3);

        let second = run(&store, &config).await;
        // Everything is on the ledger; nothing is reprocessed
        assert_eq!(second.files_done, 0);
        assert_eq!(second.files_already_done, 3);
        assert_eq!(second.ticks_written, 0);

        let counts_after_second = store.counts().await.unwrap();
        assert_eq!(counts_after_second.ticks, counts_after_first.ticks);
        assert_eq!(counts_after_second.bars, counts_after_first.bars);
        store.close().await;
    }

    #[tokio::test]
    async fn test_empty_file_marked_done_without_rows() {
        let temp_dir = tempdir().unwrap();
        let store = MarketStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let config = test_config(temp_dir.path());

        write_snapshot(
            temp_dir.path(),
            "compA 2019-01-02 09:00:00.csv",
            "symbol,name,last,volume\n",
        );
        let file = SnapshotFile::new(
            temp_dir
                .path()
                .join("compA 2019-01-02 09:00:00.csv")
                .to_string_lossy()
                .into_owned(),
            Segment::CompA,
            ts("2019-01-02 09:00:00"),
        );

        let symbol_map = SymbolMap::new();
        let stats = ingest_segment(&store, Segment::CompA, &[file.clone()], &symbol_map, &config)
            .await
            .unwrap();

        assert_eq!(stats.files_skipped, 1);
        assert!(store.is_file_done(&file.path).await.unwrap());
        store.close().await;
    }
}
