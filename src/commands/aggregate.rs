use std::path::PathBuf;

use crate::error::Result;
use crate::services::{aggregator, MarketStore};

pub async fn run(database_path: PathBuf) {
    match aggregate(database_path).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn aggregate(database_path: PathBuf) -> Result<()> {
    println!("📊 Recomputing daily bars...");

    let store = MarketStore::open(&database_path).await?;
    let bars = aggregator::aggregate_daily(&store).await?;
    store.close().await;

    println!("✨ Upserted {} daily bars", bars);
    Ok(())
}
