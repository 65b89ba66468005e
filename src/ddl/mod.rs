//! DDL statement analysis.
//!
//! Pattern-based classification and inspection of DDL text. This is not a
//! SQL parser: statements are matched against a fixed set of regular
//! expressions and anything unrecognised degrades to [`DdlType::Unknown`] or an
//! empty extraction rather than an error.

mod analyzer;
mod report;

pub use analyzer::DdlAnalyzer;
pub use report::{
    ColumnDefinition, Constraint, DdlReport, Issue, IssueKind, ObjectSummary, Severity, preview,
};

use serde::Serialize;
use std::fmt;

/// Statement kinds the analyzer recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DdlType {
    CreateTable,
    CreateView,
    CreateSchema,
    AlterTable,
    DropTable,
    DropView,
    Unknown,
}

impl DdlType {
    pub const ALL: [DdlType; 7] = [
        DdlType::CreateTable,
        DdlType::CreateView,
        DdlType::CreateSchema,
        DdlType::AlterTable,
        DdlType::DropTable,
        DdlType::DropView,
        DdlType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DdlType::CreateTable => "CREATE_TABLE",
            DdlType::CreateView => "CREATE_VIEW",
            DdlType::CreateSchema => "CREATE_SCHEMA",
            DdlType::AlterTable => "ALTER_TABLE",
            DdlType::DropTable => "DROP_TABLE",
            DdlType::DropView => "DROP_VIEW",
            DdlType::Unknown => "UNKNOWN",
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(
            self,
            DdlType::CreateTable | DdlType::CreateView | DdlType::CreateSchema
        )
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, DdlType::DropTable | DdlType::DropView)
    }
}

impl fmt::Display for DdlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
