//! `surveyload run` command implementation
//!
//! Export followed by conversion of the downloaded archive.

use colored::Colorize;

use crate::error::Result;
use crate::pipeline::{self, ConvertOptions};
use crate::progress::TerminalProgress;
use crate::{ExportArgs, ServiceArgs, StoreArgs};

pub async fn run(service: &ServiceArgs, export: &ExportArgs, store: &StoreArgs) -> Result<()> {
    let config = super::resolve_config(Some(service))?;
    let request = super::export_request(export)?;
    let controller = super::controller(&config, export)?;
    let options = ConvertOptions::from_config(&config)
        .with_store_url(store.store_url.clone())
        .with_document(store.document.clone());

    println!("{} Exporting {}", "→".cyan(), request.identity);
    let summary =
        pipeline::export_and_convert(&controller, &request, &options, &TerminalProgress::new())
            .await?;
    super::convert::print_summary(&summary);
    Ok(())
}
