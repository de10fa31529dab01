use std::path::PathBuf;

use crate::error::Result;
use crate::models::Segment;
use crate::services::MarketStore;

pub async fn run(database_path: PathBuf) {
    match show_status(database_path).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn show_status(database_path: PathBuf) -> Result<()> {
    println!("📊 Market Store Status\n");

    let store = MarketStore::open(&database_path).await?;
    let counts = store.counts().await?;

    if counts.ticks == 0 && counts.companies == 0 {
        println!("⚠️  Store is empty. Run 'ingest' first.");
        store.close().await;
        return Ok(());
    }

    println!("🏢 Companies:  {}", format_number(counts.companies));
    println!("📈 Ticks:      {}", format_number(counts.ticks));
    println!("📅 Daily bars: {}", format_number(counts.bars));
    println!("🗂️  Files done: {}", format_number(counts.files_done));

    println!("\n═══════════════════════════════════════");
    for segment in Segment::all() {
        let companies = store.companies_for_segment(segment).await?;
        println!("   {:<10} {:>6} companies", segment.tag(), companies.len());
    }

    store.close().await;
    Ok(())
}

fn format_number(n: i64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
