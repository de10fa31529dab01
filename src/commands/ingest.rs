use std::time::Instant;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{IngestConfig, Segment};
use crate::services::{aggregator, build_catalog, ingest_segment, seed_registry, MarketStore};

pub async fn run(config: IngestConfig) {
    match ingest(config).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn ingest(config: IngestConfig) -> Result<()> {
    let start_time = Instant::now();

    println!("🚀 Ingesting snapshots from: {}", config.data_dir.display());

    let store = MarketStore::open(&config.database_path).await?;

    // Catalog build completes for every segment before any resolver runs
    let catalog = build_catalog(&config.data_dir, config.workers).await?;
    println!(
        "📂 Cataloged {} files ({} unclassified, {} unparseable)",
        catalog.total_files(),
        catalog.unclassified,
        catalog.parse_failures
    );

    let segments: Vec<Segment> = match config.segment_filter {
        Some(segment) => vec![segment],
        None => Segment::all(),
    };

    let mut total_ticks = 0usize;
    let mut total_failed = 0usize;
    let mut earliest: Option<NaiveDate> = None;

    for segment in segments {
        let files = catalog.segment_files(segment);
        if files.is_empty() {
            println!("⏭️  {}: no files", segment);
            continue;
        }

        // Registry must be fully committed before the file loop reads it
        let symbol_map =
            seed_registry(&store, segment, &files, config.rename_policy).await?;
        let stats = ingest_segment(&store, segment, &files, &symbol_map, &config).await?;

        println!(
            "✅ {}: {} files ingested, {} skipped, {} failed, {} already done, {} ticks ({} unresolved rows)",
            segment,
            stats.files_done,
            stats.files_skipped,
            stats.files_failed,
            stats.files_already_done,
            stats.ticks_written,
            stats.unresolved_rows
        );

        total_ticks += stats.ticks_written;
        total_failed += stats.files_failed;
        earliest = match (earliest, stats.earliest_ingested) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    if total_ticks > 0 {
        let bars = aggregator::aggregate_daily_since(&store, earliest).await?;
        println!("📊 Refreshed {} daily bars", bars);
    } else {
        println!("📊 No new ticks; daily bars left untouched");
    }

    store.close().await;

    let elapsed = start_time.elapsed();
    println!("\n✨ Ingest complete in {:.2}s ({} ticks)", elapsed.as_secs_f64(), total_ticks);
    if total_failed > 0 {
        println!("   ⚠️  {} files failed and will be retried next run", total_failed);
    }

    Ok(())
}
