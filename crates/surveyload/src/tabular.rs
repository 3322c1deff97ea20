//! Tab-separated table files found in an export archive

use csv::{Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const TABLE_EXTENSION: &str = "tab";

/// One `<table>.tab` file; the table name is the file name minus extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularFile {
    pub name: String,
    pub path: PathBuf,
}

impl TabularFile {
    /// Bind a path to its table name, or `None` if it is not a `.tab` file
    pub fn from_path(path: &Path) -> Option<Self> {
        let is_table = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TABLE_EXTENSION));
        if !is_table {
            return None;
        }

        let name = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            name,
            path: path.to_path_buf(),
        })
    }

    /// Open a reader positioned before the first data row
    ///
    /// Export files never quote fields, so `"` is an ordinary character.
    pub fn reader(&self) -> Result<Reader<File>> {
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .quoting(false)
            .from_path(&self.path)?;
        Ok(reader)
    }

    /// Raw column names in file order, byte-order mark removed
    pub fn header(&self) -> Result<Vec<String>> {
        let mut reader = self.reader()?;
        Ok(clean_header(reader.headers()?))
    }

    /// Whether at least one data row follows the header
    pub fn has_data_rows(&self) -> Result<bool> {
        let mut reader = self.reader()?;
        let mut record = StringRecord::new();
        Ok(reader.read_record(&mut record)?)
    }
}

fn clean_header(record: &StringRecord) -> Vec<String> {
    record
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if i == 0 {
                name.trim_start_matches('\u{feff}')
            } else {
                name
            };
            name.trim_end_matches('\r').to_string()
        })
        .collect()
}
