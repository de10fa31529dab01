use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::models::{IngestConfig, RenamePolicy, Segment};

#[derive(Parser)]
#[command(name = "bourse-ingest")]
#[command(about = "Snapshot-to-timeseries ingestion pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest snapshot files into the market store
    Ingest {
        /// Root of the dated snapshot tree (root/<year>/<file>)
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// SQLite database file
        #[arg(long, default_value = "bourse.db")]
        database: PathBuf,

        /// Keep tick rows whose volume is exactly zero
        #[arg(long)]
        keep_zero_volume: bool,

        /// Overwrite stored company names unconditionally instead of
        /// updating only on change
        #[arg(long)]
        overwrite_names: bool,

        /// Worker count for the catalog scan
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Restrict the run to one segment (compA, compB, amsterdam, peapme)
        #[arg(long, value_parser = parse_segment)]
        segment: Option<Segment>,
    },
    /// Recompute daily bars from the tick table
    Aggregate {
        /// SQLite database file
        #[arg(long, default_value = "bourse.db")]
        database: PathBuf,
    },
    /// Show store row counts
    Status {
        /// SQLite database file
        #[arg(long, default_value = "bourse.db")]
        database: PathBuf,
    },
}

fn parse_segment(value: &str) -> Result<Segment, String> {
    Segment::all()
        .into_iter()
        .find(|segment| segment.tag().eq_ignore_ascii_case(value))
        .ok_or_else(|| {
            format!(
                "unknown segment: {} (expected compA, compB, amsterdam or peapme)",
                value
            )
        })
}

pub async fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            data_dir,
            database,
            keep_zero_volume,
            overwrite_names,
            workers,
            segment,
        } => {
            let mut config = IngestConfig::new(data_dir, database);
            config.drop_zero_volume = !keep_zero_volume;
            if overwrite_names {
                config.rename_policy = RenamePolicy::AlwaysOverwrite;
            }
            config.workers = workers;
            config.segment_filter = segment;
            commands::ingest::run(config).await;
        }
        Commands::Aggregate { database } => {
            commands::aggregate::run(database).await;
        }
        Commands::Status { database } => {
            commands::status::run(database).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segment() {
        assert_eq!(parse_segment("compA"), Ok(Segment::CompA));
        assert_eq!(parse_segment("AMSTERDAM"), Ok(Segment::Amsterdam));
        assert!(parse_segment("nasdaq").is_err());
    }
}
