//! Table schema inference
//!
//! Column types come from questionnaire metadata, never from the data. System
//! tables written by the export service itself have fixed schemas.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::error::{LoadError, Result};
use crate::metadata::{QuestionnaireMetadataIndex, VariableKind};

/// Separator between a variable name and its compound suffix
pub const COMPOUND_SEPARATOR: &str = "__";

const KEY_MARKER: &str = "__id";
const INTERVIEW_ID: &str = "interview__id";
const ASSIGNMENT_ID: &str = "assignment__id";
const GPS_TIMESTAMP_SUFFIX: &str = "Timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    Time,
    DateTime,
    Text,
}

impl ColumnType {
    /// Human-readable form used in coercion errors
    pub fn expected(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Date => "date (YYYY-MM-DD)",
            ColumnType::Time => "time (HH:MM:SS)",
            ColumnType::DateTime => "datetime (YYYY-MM-DDTHH:MM:SS)",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Date => "Date",
            ColumnType::Time => "Time",
            ColumnType::DateTime => "DateTime",
            ColumnType::Text => "Text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Physical layout of one table; column order equals file header order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
}

impl TableDescriptor {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.column_type).collect()
    }

    /// Positions of the primary-key columns within `columns`
    pub fn key_positions(&self) -> Vec<usize> {
        self.primary_key
            .iter()
            .filter_map(|key| self.columns.iter().position(|c| &c.name == key))
            .collect()
    }
}

struct SystemTable {
    name: &'static str,
    columns: &'static [(&'static str, ColumnType)],
    keys: &'static [&'static str],
}

impl SystemTable {
    fn descriptor(&self) -> TableDescriptor {
        TableDescriptor {
            name: self.name.to_string(),
            columns: self
                .columns
                .iter()
                .map(|(name, ty)| Column::new(*name, *ty))
                .collect(),
            primary_key: self.keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

use ColumnType::{Date, Integer, Text, Time};

const SYSTEM_TABLES: &[SystemTable] = &[
    SystemTable {
        name: "assignment__actions",
        columns: &[
            ("assignment__id", Integer),
            ("date", Date),
            ("time", Time),
            ("action", Integer),
            ("originator", Text),
            ("role", Integer),
            ("responsible__name", Text),
            ("responsible__role", Integer),
            ("old__value", Text),
            ("new__value", Text),
            ("comment", Text),
        ],
        keys: &["assignment__id", "date", "time", "action"],
    },
    SystemTable {
        name: "interview__actions",
        columns: &[
            ("interview__key", Text),
            ("interview__id", Text),
            ("date", Date),
            ("time", Time),
            ("action", Integer),
            ("originator", Text),
            ("role", Integer),
            ("responsible__name", Text),
            ("responsible__role", Integer),
        ],
        keys: &[],
    },
    SystemTable {
        name: "interview__comments",
        columns: &[
            ("interview__key", Text),
            ("interview__id", Text),
            ("roster", Text),
            ("id1", Text),
            ("variable", Text),
            ("order", Text),
            ("date", Text),
            ("time", Text),
            ("originator", Text),
            ("role", Integer),
            ("comment", Text),
        ],
        keys: &[],
    },
    SystemTable {
        name: "interview__diagnostics",
        columns: &[
            ("interview__key", Text),
            ("interview__id", Text),
            ("interview__status", Integer),
            ("responsible", Text),
            ("interviewers", Integer),
            ("rejections__sup", Integer),
            ("rejections__hq", Integer),
            ("entities__errors", Integer),
            ("questions__comments", Integer),
            ("interview__duration", Text),
        ],
        keys: &[],
    },
    SystemTable {
        name: "interview__errors",
        columns: &[
            ("interview__key", Text),
            ("interview__id", Text),
            ("roster", Text),
            ("id1", Text),
            ("variable", Text),
            ("type", Text),
            ("message__number", Integer),
            ("message", Text),
        ],
        keys: &[],
    },
];

/// Whether `table` is written by the export service with a fixed schema
pub fn is_system_table(table: &str) -> bool {
    SYSTEM_TABLES.iter().any(|t| t.name == table)
}

/// Fixed descriptor of a system table
pub fn system_table(table: &str) -> Option<TableDescriptor> {
    SYSTEM_TABLES
        .iter()
        .find(|t| t.name == table)
        .map(SystemTable::descriptor)
}

/// Derives table descriptors from file headers and questionnaire metadata
#[derive(Debug, Clone)]
pub struct SchemaInferenceEngine {
    index: QuestionnaireMetadataIndex,
}

impl SchemaInferenceEngine {
    pub fn new(index: QuestionnaireMetadataIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &QuestionnaireMetadataIndex {
        &self.index
    }

    pub fn infer(&self, table: &str, header: &[String]) -> Result<TableDescriptor> {
        if let Some(fixed) = system_table(table) {
            check_system_header(&fixed, header)?;
            return Ok(fixed);
        }

        let primary_key: Vec<String> = header
            .iter()
            .filter(|name| is_key_column(name))
            .cloned()
            .collect();

        let columns = header
            .iter()
            .map(|name| Column::new(name.clone(), self.column_type(name)))
            .collect();

        Ok(TableDescriptor {
            name: table.to_string(),
            columns,
            primary_key,
        })
    }

    fn column_type(&self, column: &str) -> ColumnType {
        match column {
            "sssys_irnd" => return ColumnType::Float,
            "has__errors" | "interview__status" | ASSIGNMENT_ID => return ColumnType::Integer,
            _ => {}
        }

        let (base, suffix) = match column.split_once(COMPOUND_SEPARATOR) {
            Some((base, suffix)) => (base, Some(suffix)),
            None => (column, None),
        };
        let lookup = self.index.kind_of(base);

        match lookup.kind() {
            VariableKind::SingleSelect | VariableKind::MultiSelect => ColumnType::Integer,
            VariableKind::GpsCoordinate if suffix == Some(GPS_TIMESTAMP_SUFFIX) => {
                ColumnType::DateTime
            }
            VariableKind::GpsCoordinate => ColumnType::Float,
            VariableKind::Numeric if lookup.integer_only() => ColumnType::Integer,
            VariableKind::Numeric => ColumnType::Float,
            _ if is_roster_id(column) => ColumnType::Integer,
            _ => ColumnType::Text,
        }
    }
}

/// Key columns contain `__id`; assignment ids are attributes, not keys
fn is_key_column(column: &str) -> bool {
    column != ASSIGNMENT_ID && column.contains(KEY_MARKER)
}

/// Roster position columns, numeric by construction
fn is_roster_id(column: &str) -> bool {
    is_key_column(column) && column != INTERVIEW_ID
}

fn check_system_header(fixed: &TableDescriptor, header: &[String]) -> Result<()> {
    let expected = fixed.column_names();
    if expected.iter().copied().eq(header.iter().map(String::as_str)) {
        return Ok(());
    }

    Err(LoadError::SchemaMismatch {
        table: fixed.name.clone(),
        expected: expected.join(", "),
        found: header.join(", "),
    })
}

/// Per-run state: the inference engine and descriptors computed so far
///
/// Dropped at the end of the run; nothing is persisted between runs.
#[derive(Debug)]
pub struct RunContext {
    engine: SchemaInferenceEngine,
    descriptors: HashMap<String, TableDescriptor>,
}

impl RunContext {
    pub fn new(index: QuestionnaireMetadataIndex) -> Self {
        Self {
            engine: SchemaInferenceEngine::new(index),
            descriptors: HashMap::new(),
        }
    }

    /// Descriptor for `table`, inferred on first request only
    pub fn describe(&mut self, table: &str, header: &[String]) -> Result<&TableDescriptor> {
        match self.descriptors.entry(table.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let descriptor = self.engine.infer(table, header)?;
                debug!(
                    table = %table,
                    columns = descriptor.columns.len(),
                    keys = ?descriptor.primary_key,
                    "Inferred table schema"
                );
                Ok(entry.insert(descriptor))
            }
        }
    }

    pub fn cached(&self, table: &str) -> Option<&TableDescriptor> {
        self.descriptors.get(table)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
