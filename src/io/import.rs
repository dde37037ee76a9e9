use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::domain::{parse_amount, NewTransaction, TransactionKind};

/// Error for the first row of an import that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    /// 1-based line in the input, the header is line 1
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

impl ImportError {
    fn at(line: usize, field: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            line,
            field: field.map(str::to_string),
            error: error.into(),
        }
    }
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "line {}, column {}: {}", self.line, field, self.error),
            None => write!(f, "line {}: {}", self.line, self.error),
        }
    }
}

impl std::error::Error for ImportError {}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Validate and report what would be imported without changing anything
    pub dry_run: bool,
}

/// Positions of the recognised columns in the header row.
///
/// Columns are matched by name, case-insensitively, so files with extra
/// columns (ids, chat ids, newer fields) still import.
struct Columns {
    kind: usize,
    amount: usize,
    author: Option<usize>,
    category: Option<usize>,
    timestamp: Option<usize>,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Result<Self, ImportError> {
        let find = |names: &[&str]| {
            header
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };

        let kind = find(&["type", "kind"])
            .ok_or_else(|| ImportError::at(1, Some("Type"), "missing required column"))?;
        let amount = find(&["amount"])
            .ok_or_else(|| ImportError::at(1, Some("Amount"), "missing required column"))?;

        Ok(Self {
            kind,
            amount,
            author: find(&["author"]),
            category: find(&["category"]),
            timestamp: find(&["timestamp", "date"]),
        })
    }
}

/// Parse CSV text into transactions, validating every row.
///
/// Nothing is returned unless every row is valid: the first bad row aborts the
/// whole batch. Rows without a timestamp get `now`.
pub fn parse_csv(text: &str, now: DateTime<Utc>) -> Result<Vec<NewTransaction>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let header = csv_reader
        .headers()
        .map_err(|e| ImportError::at(1, None, format!("CSV parse error: {}", e)))?
        .clone();
    let columns = Columns::from_header(&header)?;

    let mut parsed = Vec::new();
    for (index, result) in csv_reader.records().enumerate() {
        let fallback_line = index + 2; // +2 for header and 0-indexing

        let record = result.map_err(|e| {
            let line = e
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(fallback_line);
            ImportError::at(line, None, format!("CSV parse error: {}", e))
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);

        let field = |column: Option<usize>| column.and_then(|i| record.get(i)).unwrap_or("");

        let kind_str = field(Some(columns.kind));
        let kind = TransactionKind::from_str(kind_str).ok_or_else(|| {
            ImportError::at(
                line,
                Some("Type"),
                format!("'{}' is not Income or Expense", kind_str),
            )
        })?;

        let amount = parse_amount(field(Some(columns.amount)))
            .map_err(|e| ImportError::at(line, Some("Amount"), e.to_string()))?;

        let timestamp_str = field(columns.timestamp);
        let timestamp = if timestamp_str.is_empty() {
            now
        } else {
            parse_timestamp(timestamp_str).map_err(|e| {
                ImportError::at(line, Some("Timestamp"), e.to_string())
            })?
        };

        parsed.push(
            NewTransaction::new(kind, amount)
                .with_author(field(columns.author))
                .with_category(field(columns.category))
                .with_timestamp(timestamp),
        );
    }

    Ok(parsed)
}

/// Parse the timestamp layouts found in exported histories.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    // Try RFC3339 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%d-%m-%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Ok(dt.and_utc());
        }
    }

    // Try YYYY-MM-DD format
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    anyhow::bail!("Invalid timestamp format: {}", s)
}
