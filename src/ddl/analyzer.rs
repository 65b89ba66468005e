//! Regex-based DDL classifier and extractor.

use super::DdlType;
use super::report::{ColumnDefinition, Constraint, DdlReport, Issue, IssueKind, ObjectSummary, preview};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

/// Prefix patterns in priority order; the first match wins.
static TYPE_PATTERNS: Lazy<Vec<(DdlType, Regex)>> = Lazy::new(|| {
    vec![
        (
            DdlType::CreateTable,
            Regex::new(r"(?i)^\s*CREATE\s+TABLE\s+").expect("Invalid regex: CREATE TABLE pattern"),
        ),
        (
            DdlType::CreateView,
            Regex::new(r"(?i)^\s*CREATE\s+VIEW\s+").expect("Invalid regex: CREATE VIEW pattern"),
        ),
        (
            DdlType::CreateSchema,
            Regex::new(r"(?i)^\s*CREATE\s+SCHEMA\s+").expect("Invalid regex: CREATE SCHEMA pattern"),
        ),
        (
            DdlType::AlterTable,
            Regex::new(r"(?i)^\s*ALTER\s+TABLE\s+").expect("Invalid regex: ALTER TABLE pattern"),
        ),
        (
            DdlType::DropTable,
            Regex::new(r"(?i)^\s*DROP\s+TABLE\s+").expect("Invalid regex: DROP TABLE pattern"),
        ),
        (
            DdlType::DropView,
            Regex::new(r"(?i)^\s*DROP\s+VIEW\s+").expect("Invalid regex: DROP VIEW pattern"),
        ),
    ]
});

static OBJECT_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:CREATE|ALTER|DROP)\s+(?:TABLE|VIEW|SCHEMA)\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?([^\s\(]+)",
    )
    .expect("Invalid regex: object name pattern")
});

static FROM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFROM\s+([^\s,\)]+)").expect("Invalid regex: FROM pattern"));

static JOIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bJOIN\s+([^\s,\)]+)").expect("Invalid regex: JOIN pattern"));

/// `TYPE(ARG)` split into base type and argument; nested parentheses are not supported.
static TYPE_SIZE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^(]+)\(([^)]+)\)").expect("Invalid regex: type size pattern"));

/// Words a FROM/JOIN capture can land on that are not object names.
const NON_OBJECT_KEYWORDS: [&str; 4] = ["SELECT", "WHERE", "GROUP", "ORDER"];

const QUOTE_CHARS: [char; 2] = ['`', '"'];

/// Stateless DDL analyzer.
pub struct DdlAnalyzer;

impl DdlAnalyzer {
    /// Classifies a statement by its leading keywords.
    pub fn classify(ddl: &str) -> DdlType {
        let trimmed = ddl.trim();
        TYPE_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(trimmed))
            .map(|(ddl_type, _)| *ddl_type)
            .unwrap_or(DdlType::Unknown)
    }

    /// Name of the table, view or schema the statement targets.
    pub fn extract_object_name(ddl: &str) -> Option<String> {
        OBJECT_NAME_REGEX
            .captures(ddl)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim_matches(QUOTE_CHARS).to_string())
    }

    /// Objects a `CREATE VIEW` reads from; empty for anything else.
    pub fn extract_dependencies(ddl: &str) -> BTreeSet<String> {
        let mut dependencies = BTreeSet::new();

        if Self::classify(ddl) != DdlType::CreateView {
            return dependencies;
        }

        for pattern in [&*FROM_REGEX, &*JOIN_REGEX] {
            for caps in pattern.captures_iter(ddl) {
                let Some(m) = caps.get(1) else { continue };
                let name = m.as_str().trim_matches(QUOTE_CHARS);
                if name.is_empty() {
                    continue;
                }
                let upper = name.to_uppercase();
                if NON_OBJECT_KEYWORDS.contains(&upper.as_str()) {
                    continue;
                }
                dependencies.insert(name.to_string());
            }
        }

        dependencies
    }

    /// Column definitions of a `CREATE TABLE`; empty for anything else.
    ///
    /// Takes the first parenthesised group and splits it on top-level commas.
    pub fn extract_columns(ddl: &str) -> Vec<ColumnDefinition> {
        if Self::classify(ddl) != DdlType::CreateTable {
            return Vec::new();
        }

        let Some(body) = first_group(ddl) else {
            return Vec::new();
        };

        split_top_level(body)
            .into_iter()
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(parse_column)
            .collect()
    }

    /// Analyzes a batch. Blank entries are skipped but keep their index.
    pub fn analyze<S: AsRef<str>>(statements: &[S]) -> DdlReport {
        let mut report = DdlReport::new(statements.len());

        for (index, statement) in statements.iter().enumerate() {
            let ddl = statement.as_ref();
            if ddl.trim().is_empty() {
                continue;
            }

            let ddl_type = Self::classify(ddl);
            *report.by_type.entry(ddl_type).or_insert(0) += 1;

            let name = Self::extract_object_name(ddl);
            let dependencies: Vec<String> = Self::extract_dependencies(ddl).into_iter().collect();

            let columns = (ddl_type == DdlType::CreateTable).then(|| Self::extract_columns(ddl));

            if !dependencies.is_empty() {
                let key = name
                    .clone()
                    .unwrap_or_else(|| format!("statement_{}", index));
                report.dependencies.insert(key, dependencies.clone());
            }

            check_issues(ddl, ddl_type, name.as_deref(), index, &mut report.potential_issues);

            report.objects.push(ObjectSummary {
                index,
                ddl_type,
                name,
                dependencies,
                ddl_preview: preview(ddl),
                column_count: columns.as_ref().map(Vec::len),
                columns,
            });
        }

        debug!(
            "Analyzed {} statements, {} issues",
            report.objects.len(),
            report.potential_issues.len()
        );
        report
    }
}

/// Contents of the first parenthesised group, up to its balanced close.
fn first_group(ddl: &str) -> Option<&str> {
    let open = ddl.find('(')?;
    let mut depth = 0usize;

    for (offset, ch) in ddl[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&ddl[open + 1..open + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Splits on commas outside parentheses.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                segments.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&body[start..]);

    segments
}

fn parse_column(definition: &str) -> ColumnDefinition {
    let parts: Vec<&str> = definition.split_whitespace().collect();

    if parts.len() < 2 {
        return ColumnDefinition {
            name: definition.to_string(),
            data_type: "UNKNOWN".into(),
            size: None,
            nullable: true,
            constraints: Vec::new(),
        };
    }

    let name = parts[0].trim_matches(QUOTE_CHARS).to_string();

    let (data_type, size) = match TYPE_SIZE_REGEX.captures(parts[1]) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
        None => (parts[1].to_string(), None),
    };

    let remaining = parts[2..].join(" ").to_uppercase();
    let constraints: Vec<Constraint> = Constraint::ALL
        .into_iter()
        .filter(|c| remaining.contains(c.keyword()))
        .collect();
    let nullable =
        !(constraints.contains(&Constraint::NotNull) || constraints.contains(&Constraint::PrimaryKey));

    ColumnDefinition {
        name,
        data_type: data_type.to_uppercase(),
        size,
        nullable,
        constraints,
    }
}

fn check_issues(
    ddl: &str,
    ddl_type: DdlType,
    object: Option<&str>,
    index: usize,
    issues: &mut Vec<Issue>,
) {
    let upper = ddl.to_uppercase();
    let mut flag = |kind: IssueKind| issues.push(Issue::new(kind, object.map(str::to_string), index));

    if ddl_type.is_create() && !upper.contains("IF NOT EXISTS") {
        flag(IssueKind::MissingIfNotExists);
    }

    if ddl_type.is_drop() && !upper.contains("IF EXISTS") {
        flag(IssueKind::MissingIfExists);
    }

    if ddl_type == DdlType::DropTable {
        flag(IssueKind::DestructiveOperation);
    }

    if ddl_type == DdlType::CreateTable && !upper.contains("PRIMARY KEY") && !upper.contains("UNIQUE") {
        flag(IssueKind::NoPrimaryKey);
    }
}
