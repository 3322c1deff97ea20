//! Questionnaire metadata index
//!
//! Turns a questionnaire document into a name -> [`Variable`] map. Documents
//! are either the questionnaire tree exported by the designer (nested
//! `Children`, each node tagged with `$type`) or a flat list of the same nodes.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Kind of a questionnaire variable, as far as typing is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    SingleSelect,
    MultiSelect,
    Numeric,
    GpsCoordinate,
    Text,
    /// Groups, rosters, static texts, calculated variables, unknown tags
    Other,
}

impl VariableKind {
    /// Map a document `$type` tag; empty and unknown tags become `Other`
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "SingleQuestion" | "single-select" => VariableKind::SingleSelect,
            "MultyOptionsQuestion" | "multi-select" => VariableKind::MultiSelect,
            "NumericQuestion" | "numeric" => VariableKind::Numeric,
            "GpsCoordinateQuestion" | "gps-coordinate" => VariableKind::GpsCoordinate,
            "TextQuestion" | "text" => VariableKind::Text,
            _ => VariableKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    /// Only meaningful for numeric variables
    pub integer_only: bool,
}

/// Outcome of a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Variable(&'a Variable),
    /// Not described by the questionnaire; treated as text
    TextDefault,
}

impl Lookup<'_> {
    pub fn kind(&self) -> VariableKind {
        match self {
            Lookup::Variable(variable) => variable.kind,
            Lookup::TextDefault => VariableKind::Text,
        }
    }

    pub fn integer_only(&self) -> bool {
        matches!(self, Lookup::Variable(variable) if variable.integer_only)
    }
}

#[derive(Debug, Default, Deserialize)]
struct DocumentNode {
    #[serde(rename = "$type", alias = "kind", default)]
    kind: Option<String>,
    #[serde(rename = "VariableName", alias = "name", default)]
    variable_name: Option<String>,
    /// Calculated variables carry their name here instead
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "IsInteger", alias = "integer_only", default)]
    is_integer: Option<bool>,
    #[serde(rename = "Children", default)]
    children: Vec<DocumentNode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    List(Vec<DocumentNode>),
    Tree(DocumentNode),
}

#[derive(Debug, Default, Clone)]
pub struct QuestionnaireMetadataIndex {
    variables: HashMap<String, Variable>,
}

impl QuestionnaireMetadataIndex {
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Document = serde_json::from_str(json)?;
        let mut index = Self::default();

        let mut pending: Vec<DocumentNode> = match document {
            Document::List(nodes) => nodes,
            Document::Tree(root) => vec![root],
        };
        pending.reverse();

        // Depth-first, document order, so the first definition of a name wins
        while let Some(mut node) = pending.pop() {
            let children = std::mem::take(&mut node.children);
            pending.extend(children.into_iter().rev());
            index.add_node(node);
        }

        debug!(variables = index.len(), "Indexed questionnaire document");
        Ok(index)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        // Designer documents are sometimes saved with a byte-order mark
        Self::from_json(raw.trim_start_matches('\u{feff}'))
    }

    pub fn from_variables(variables: impl IntoIterator<Item = Variable>) -> Self {
        let mut index = Self::default();
        for variable in variables {
            index
                .variables
                .entry(variable.name.clone())
                .or_insert(variable);
        }
        index
    }

    /// Look up a variable by exact name
    pub fn kind_of(&self, name: &str) -> Lookup<'_> {
        self.variables
            .get(name)
            .map(Lookup::Variable)
            .unwrap_or(Lookup::TextDefault)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn add_node(&mut self, node: DocumentNode) {
        let Some(name) = node
            .variable_name
            .or(node.name)
            .filter(|name| !name.trim().is_empty())
        else {
            return;
        };

        let kind = VariableKind::from_tag(node.kind.as_deref().unwrap_or_default());
        let variable = Variable {
            name: name.clone(),
            kind,
            integer_only: kind == VariableKind::Numeric && node.is_integer.unwrap_or(false),
        };
        self.variables.entry(name).or_insert(variable);
    }
}
