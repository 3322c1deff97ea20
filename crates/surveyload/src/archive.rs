//! Export archive extraction and layout detection
//!
//! Two layouts are understood:
//!
//! - **Embedded**: `*.tab` files and `document.json` side by side at the root
//! - **Nested**: `*.tab` files at the root, `document.json` only inside a
//!   nested `content.zip` (usually `Questionnaire/content.zip`)
//!
//! When neither holds a document, a caller-supplied fallback document is used.
//! Everything is extracted into a private staging directory that is deleted
//! when the returned [`ExtractedArchive`] is dropped, on success and on error.

use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{LoadError, Result};
use crate::tabular::TabularFile;

pub const METADATA_FILE: &str = "document.json";
pub const NESTED_ARCHIVE: &str = "content.zip";

const NESTED_DIR: &str = ".questionnaire-content";

/// Where the questionnaire document was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    Embedded,
    Nested,
    Fallback,
}

/// Extracted archive contents, alive as long as the staging directory
#[derive(Debug)]
pub struct ExtractedArchive {
    staging: TempDir,
    tables: Vec<TabularFile>,
    metadata: PathBuf,
    metadata_source: MetadataSource,
}

impl ExtractedArchive {
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Table files sorted by table name
    pub fn tables(&self) -> &[TabularFile] {
        &self.tables
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata
    }

    pub fn metadata_source(&self) -> MetadataSource {
        self.metadata_source
    }
}

#[derive(Debug, Default, Clone)]
pub struct ArchiveReader {
    fallback_document: Option<PathBuf>,
    scratch_root: Option<PathBuf>,
}

impl ArchiveReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document to use when the archive carries none
    pub fn with_fallback_document(mut self, path: Option<PathBuf>) -> Self {
        self.fallback_document = path;
        self
    }

    /// Create staging directories under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    #[instrument(skip(self), fields(archive = %archive.display()))]
    pub fn open(&self, archive: &Path) -> Result<ExtractedArchive> {
        let staging = self.staging_dir()?;
        extract_zip(archive, staging.path())?;

        let tables = collect_tables(staging.path())?;
        info!(tables = tables.len(), "Extracted export archive");

        let (metadata, metadata_source) = match self.resolve_metadata(staging.path())? {
            Some(found) => found,
            None => {
                return Err(LoadError::MissingMetadata {
                    archive: archive.to_path_buf(),
                })
            }
        };
        debug!(path = %metadata.display(), source = ?metadata_source, "Resolved questionnaire document");

        Ok(ExtractedArchive {
            staging,
            tables,
            metadata,
            metadata_source,
        })
    }

    fn staging_dir(&self) -> Result<TempDir> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("surveyload-");
            builder
        };
        let dir = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn resolve_metadata(&self, staging: &Path) -> Result<Option<(PathBuf, MetadataSource)>> {
        let embedded = staging.join(METADATA_FILE);
        if embedded.is_file() {
            return Ok(Some((embedded, MetadataSource::Embedded)));
        }

        if let Some(nested) = find_file(staging, NESTED_ARCHIVE) {
            let target = staging.join(NESTED_DIR);
            std::fs::create_dir_all(&target)?;
            extract_zip(&nested, &target)?;

            if let Some(document) = find_file(&target, METADATA_FILE) {
                return Ok(Some((document, MetadataSource::Nested)));
            }
            debug!(nested = %nested.display(), "Nested archive holds no questionnaire document");
        }

        match &self.fallback_document {
            Some(path) if path.is_file() => Ok(Some((path.clone(), MetadataSource::Fallback))),
            Some(path) => {
                warn!(path = %path.display(), "Fallback questionnaire document does not exist");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

fn extract_zip(archive: &Path, target: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    debug!(entries = zip.len(), target = %target.display(), "Extracting zip archive");
    zip.extract(target)?;
    Ok(())
}

/// Root-level `.tab` files only; nested folders hold questionnaire assets
fn collect_tables(staging: &Path) -> Result<Vec<TabularFile>> {
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(staging)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(table) = TabularFile::from_path(&entry.path()) {
            tables.push(table);
        }
    }
    tables.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tables)
}

/// Shallowest file under `root` whose name matches case-insensitively
fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
}
