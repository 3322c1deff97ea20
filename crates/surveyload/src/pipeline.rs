//! Conversion runs: archive in, populated store out
//!
//! A run resolves the questionnaire document and infers every table schema
//! before the store is touched, so metadata and header problems never leave a
//! half-written database behind. Tables are then materialized one at a time in
//! name order.

use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::archive::{ArchiveReader, MetadataSource};
use crate::config::{Config, DEFAULT_BATCH_ROWS};
use crate::error::Result;
use crate::export::{ExportJobController, ExportRequest, ExportService};
use crate::metadata::QuestionnaireMetadataIndex;
use crate::progress::ProgressSink;
use crate::schema::{RunContext, TableDescriptor};
use crate::store::{redact, RelationalMaterializer};

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Store address; defaults to a SQLite file next to the archive
    pub store_url: Option<String>,
    /// Questionnaire document used when the archive carries none
    pub document: Option<PathBuf>,
    pub batch_rows: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            store_url: None,
            document: None,
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

impl ConvertOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_rows: config.batch_rows,
            ..Self::default()
        }
    }

    pub fn with_store_url(mut self, store_url: Option<String>) -> Self {
        self.store_url = store_url;
        self
    }

    pub fn with_document(mut self, document: Option<PathBuf>) -> Self {
        self.document = document;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TableSummary {
    pub name: String,
    pub rows: u64,
}

#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub store_url: String,
    pub metadata_source: MetadataSource,
    pub tables: Vec<TableSummary>,
}

impl ConversionSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// `sqlite://<archive stem>.db?mode=rwc`, next to the archive
pub fn default_store_url(archive: &Path) -> String {
    format!("sqlite://{}?mode=rwc", archive.with_extension("db").display())
}

#[instrument(skip(options, sink), fields(archive = %archive.display()))]
pub async fn convert(
    archive: &Path,
    options: &ConvertOptions,
    sink: &dyn ProgressSink,
) -> Result<ConversionSummary> {
    let extracted = ArchiveReader::new()
        .with_fallback_document(options.document.clone())
        .open(archive)?;

    let index = QuestionnaireMetadataIndex::from_file(extracted.metadata_path())?;
    info!(
        variables = index.len(),
        source = ?extracted.metadata_source(),
        "Loaded questionnaire metadata"
    );

    let mut context = RunContext::new(index);
    let mut plan: Vec<TableDescriptor> = Vec::with_capacity(extracted.tables().len());
    for file in extracted.tables() {
        let header = file.header()?;
        plan.push(context.describe(&file.name, &header)?.clone());
    }

    let store_url = options
        .store_url
        .clone()
        .unwrap_or_else(|| default_store_url(archive));
    let store = RelationalMaterializer::connect(&store_url)
        .await?
        .with_batch_rows(options.batch_rows);

    let mut tables = Vec::with_capacity(plan.len());
    for (descriptor, file) in plan.iter().zip(extracted.tables()) {
        let rows = match store.materialize(descriptor, file, sink).await {
            Ok(rows) => rows,
            Err(err) => {
                store.close().await;
                return Err(err);
            }
        };
        tables.push(TableSummary {
            name: descriptor.name.clone(),
            rows,
        });
    }
    store.close().await;

    let summary = ConversionSummary {
        store_url: redact(&store_url),
        metadata_source: extracted.metadata_source(),
        tables,
    };
    info!(
        tables = summary.tables.len(),
        rows = summary.total_rows(),
        store = %summary.store_url,
        "Conversion complete"
    );
    Ok(summary)
}

/// Obtain an export archive from the service, then convert it
pub async fn export_and_convert<S: ExportService>(
    controller: &ExportJobController<S>,
    request: &ExportRequest,
    options: &ConvertOptions,
    sink: &dyn ProgressSink,
) -> Result<ConversionSummary> {
    let archive = controller.acquire(request, sink).await?;
    convert(&archive, options, sink).await
}
