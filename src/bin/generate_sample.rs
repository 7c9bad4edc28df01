use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use rusty_charts::data::synthetic::SyntheticDataset;
use rusty_charts::data::writer::{write_csv, write_parquet};

const SEED: u64 = 42;

#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
#[command(about = "Write synthetic medical, sea level and page view datasets")]
#[command(version = "0.1.0")]
struct Args {
    /// Also write each dataset as Parquet
    #[arg(short, long)]
    parquet: bool,

    /// Directory the files are written to
    #[arg(default_value = ".")]
    dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let dir = args.dir;
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    for dataset in [
        SyntheticDataset::Medical,
        SyntheticDataset::SeaLevel,
        SyntheticDataset::PageViews,
    ] {
        let table = dataset
            .generate(dataset.default_rows(), SEED)
            .with_context(|| format!("generating {dataset:?}"))?;

        let csv_path = dir.join(format!("{}.csv", dataset.file_stem()));
        write_csv(&table, &csv_path)?;
        println!("Wrote {} rows to {}", table.len(), csv_path.display());

        if args.parquet {
            let pq_path = dir.join(format!("{}.parquet", dataset.file_stem()));
            write_parquet(&table, &pq_path)?;
            println!("Wrote {} rows to {}", table.len(), pq_path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_csv_in_current_dir() {
        let args = Args::try_parse_from(["generate_sample"]).unwrap();
        assert!(!args.parquet);
        assert_eq!(args.dir, PathBuf::from("."));
    }

    #[test]
    fn short_flags_are_not_taken_as_directories() {
        let args = Args::try_parse_from(["generate_sample", "-p", "out"]).unwrap();
        assert!(args.parquet);
        assert_eq!(args.dir, PathBuf::from("out"));

        let help = Args::try_parse_from(["generate_sample", "-h"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(Args::try_parse_from(["generate_sample", "--bogus"]).is_err());
    }
}
