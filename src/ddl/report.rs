//! Analysis report types.

use super::DdlType;
use serde::Serialize;
use std::collections::BTreeMap;

/// Characters of statement text kept in previews.
const PREVIEW_CHARS: usize = 100;

/// First 100 characters of `ddl`, with `...` appended when it was cut.
pub fn preview(ddl: &str) -> String {
    let mut chars = ddl.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Result of [`DdlAnalyzer::analyze`](super::DdlAnalyzer::analyze).
#[derive(Debug, Clone, Serialize)]
pub struct DdlReport {
    /// Length of the input list, blank entries included.
    pub total_statements: usize,
    /// Count per type; every type is present.
    pub by_type: BTreeMap<DdlType, usize>,
    pub objects: Vec<ObjectSummary>,
    /// Object name (or `statement_<index>`) to dependencies, for statements
    /// that have any.
    pub dependencies: BTreeMap<String, Vec<String>>,
    pub potential_issues: Vec<Issue>,
}

impl DdlReport {
    pub(super) fn new(total_statements: usize) -> Self {
        Self {
            total_statements,
            by_type: DdlType::ALL.iter().map(|t| (*t, 0)).collect(),
            objects: Vec::new(),
            dependencies: BTreeMap::new(),
            potential_issues: Vec::new(),
        }
    }

    /// Issues with [`Severity::High`].
    pub fn critical_issues(&self) -> Vec<&Issue> {
        self.potential_issues
            .iter()
            .filter(|issue| issue.severity == Severity::High)
            .collect()
    }

    pub fn count(&self, ddl_type: DdlType) -> usize {
        self.by_type.get(&ddl_type).copied().unwrap_or(0)
    }
}

/// Per-statement summary.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    /// Position in the input list.
    pub index: usize,
    #[serde(rename = "type")]
    pub ddl_type: DdlType,
    pub name: Option<String>,
    pub dependencies: Vec<String>,
    pub ddl_preview: String,
    /// Only for `CREATE TABLE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<usize>,
}

/// One column of a `CREATE TABLE` column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Upper-cased base type, `UNKNOWN` if the definition had a single token.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Parenthesised type argument, e.g. `50` for `VARCHAR(50)`.
    pub size: Option<String>,
    pub nullable: bool,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Constraint {
    #[serde(rename = "NOT NULL")]
    NotNull,
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey,
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "DEFAULT")]
    Default,
}

impl Constraint {
    /// In detection order.
    pub const ALL: [Constraint; 4] = [
        Constraint::NotNull,
        Constraint::PrimaryKey,
        Constraint::Unique,
        Constraint::Default,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Constraint::NotNull => "NOT NULL",
            Constraint::PrimaryKey => "PRIMARY KEY",
            Constraint::Unique => "UNIQUE",
            Constraint::Default => "DEFAULT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingIfNotExists,
    MissingIfExists,
    DestructiveOperation,
    NoPrimaryKey,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::DestructiveOperation => Severity::High,
            _ => Severity::Warning,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            IssueKind::MissingIfNotExists => {
                "CREATE statement without IF NOT EXISTS fails if the object already exists"
            }
            IssueKind::MissingIfExists => {
                "DROP statement without IF EXISTS fails if the object does not exist"
            }
            IssueKind::DestructiveOperation => {
                "DROP TABLE is a destructive operation that deletes data"
            }
            IssueKind::NoPrimaryKey => "Table is created without a primary key or unique constraint",
        }
    }
}

/// A risky pattern found in one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub object: Option<String>,
    pub statement_index: usize,
}

impl Issue {
    pub fn new(kind: IssueKind, object: Option<String>, statement_index: usize) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: kind.message().to_string(),
            object,
            statement_index,
        }
    }
}
