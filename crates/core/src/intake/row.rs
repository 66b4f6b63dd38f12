//! Decoded rows and their per-row diagnostics.

use serde::{Deserialize, Serialize};

use crate::tabular::RawRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks commit.
    Error,
    Warning,
    Informational,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Informational => "informational",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem attached to one attribute (or raw header) of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub attribute: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowValidation {
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
    #[serde(default)]
    pub warnings: Vec<Diagnostic>,
    #[serde(default)]
    pub informational: Vec<Diagnostic>,
}

impl RowValidation {
    /// Append a diagnostic unless an identical one is already recorded.
    pub fn push(
        &mut self,
        severity: Severity,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            attribute: attribute.into(),
            error: message.into(),
        };
        let list = self.list_mut(severity);
        if !list.contains(&diagnostic) {
            list.push(diagnostic);
        }
    }

    pub fn list(&self, severity: Severity) -> &[Diagnostic] {
        match severity {
            Severity::Error => &self.errors,
            Severity::Warning => &self.warnings,
            Severity::Informational => &self.informational,
        }
    }

    fn list_mut(&mut self, severity: Severity) -> &mut Vec<Diagnostic> {
        match severity {
            Severity::Error => &mut self.errors,
            Severity::Warning => &mut self.warnings,
            Severity::Informational => &mut self.informational,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.informational.is_empty()
    }
}

/// One decoded row with its original position and diagnostics.
///
/// Serializes flat, with the bookkeeping under `__import_row` and
/// `__validation` next to the raw cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedRow {
    /// Zero-based position of the row in the decoded sheet.
    #[serde(rename = "__import_row")]
    pub import_row: usize,
    #[serde(rename = "__validation", default)]
    pub validation: RowValidation,
    #[serde(flatten)]
    pub cells: RawRow,
}

impl ImportedRow {
    pub fn new(import_row: usize, cells: RawRow) -> Self {
        Self {
            import_row,
            validation: RowValidation::default(),
            cells,
        }
    }

    /// Trimmed, non-empty cell text under `header`.
    pub fn value(&self, header: &str) -> Option<&str> {
        self.cells
            .get(header)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A diagnostic flattened with the row it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    pub import_row: usize,
    pub attribute: String,
    pub error: String,
}

/// Aggregate of all row diagnostics, as shown before commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub errors: Vec<RowDiagnostic>,
    pub warnings: Vec<RowDiagnostic>,
    pub informational: Vec<RowDiagnostic>,
    pub rows: Vec<ImportedRow>,
}

impl ValidationSummary {
    pub fn from_rows(rows: &[ImportedRow]) -> Self {
        let collect = |severity: Severity| {
            rows.iter()
                .flat_map(|row| {
                    row.validation.list(severity).iter().map(|d| RowDiagnostic {
                        import_row: row.import_row,
                        attribute: d.attribute.clone(),
                        error: d.error.clone(),
                    })
                })
                .collect::<Vec<_>>()
        };
        Self {
            errors: collect(Severity::Error),
            warnings: collect(Severity::Warning),
            informational: collect(Severity::Informational),
            rows: rows.to_vec(),
        }
    }

    pub fn has_blocking_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
