//! `surveyload export` command implementation

use colored::Colorize;

use crate::error::Result;
use crate::progress::TerminalProgress;
use crate::{ExportArgs, ServiceArgs};

pub async fn run(service: &ServiceArgs, export: &ExportArgs) -> Result<()> {
    let config = super::resolve_config(Some(service))?;
    let request = super::export_request(export)?;
    let controller = super::controller(&config, export)?;

    println!(
        "{} Requesting {} export of {} ({} interviews)",
        "→".cyan(),
        request.export_type,
        request.identity,
        request.interview_status
    );

    let archive = controller.acquire(&request, &TerminalProgress::new()).await?;

    println!("{} Saved {}", "✓".green(), archive.display());
    Ok(())
}
