//! `surveyload convert` command implementation

use colored::Colorize;
use std::path::Path;

use crate::error::Result;
use crate::pipeline::{self, ConversionSummary, ConvertOptions};
use crate::progress::TerminalProgress;
use crate::StoreArgs;

pub async fn run(archive: &Path, store: &StoreArgs) -> Result<()> {
    let config = super::resolve_config(None)?;
    let options = ConvertOptions::from_config(&config)
        .with_store_url(store.store_url.clone())
        .with_document(store.document.clone());

    println!("{} Converting {}", "→".cyan(), archive.display());
    let summary = pipeline::convert(archive, &options, &TerminalProgress::new()).await?;
    print_summary(&summary);
    Ok(())
}

pub(crate) fn print_summary(summary: &ConversionSummary) {
    for table in &summary.tables {
        println!("  {:<40} {:>10} rows", table.name, table.rows);
    }
    println!(
        "{} Loaded {} table(s), {} row(s) into {}",
        "✓".green(),
        summary.tables.len(),
        summary.total_rows(),
        summary.store_url
    );
}
