use thiserror::Error;

use crate::domain::{BalanceOverflow, LedgerError, ParseAmountError};
use crate::io::ImportError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid entry number {position}: {}", describe_range(.len))]
    InvalidPosition { position: usize, len: usize },

    #[error("An expense needs a category")]
    MissingCategory,

    #[error("No transactions recorded for {0}")]
    AccountEmpty(String),

    #[error("Import rejected at line {line}: {reason}. Nothing was imported")]
    MalformedImport { line: usize, reason: String },

    #[error("Invalid salary day {0}: choose a day between 1 and 31")]
    InvalidSalaryDay(u32),

    #[error("Storage unavailable, the change was not saved: {0:#}")]
    StorageUnavailable(#[from] anyhow::Error),
}

impl AppError {
    /// Errors that are a normal answer rather than a failure (e.g. nothing to
    /// list yet). Callers report them without signalling an error.
    pub fn is_informational(&self) -> bool {
        matches!(self, AppError::AccountEmpty(_))
    }
}

fn describe_range(len: &usize) -> String {
    if *len == 0 {
        "the ledger is empty".to_string()
    } else {
        format!("choose a number between 1 and {}", len)
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidPosition { position, len } => {
                AppError::InvalidPosition { position, len }
            }
        }
    }
}

impl From<ParseAmountError> for AppError {
    fn from(err: ParseAmountError) -> Self {
        AppError::InvalidAmount(err.to_string())
    }
}

impl From<BalanceOverflow> for AppError {
    fn from(err: BalanceOverflow) -> Self {
        AppError::InvalidAmount(err.to_string())
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        let reason = match err.field {
            Some(field) => format!("{}: {}", field, err.error),
            None => err.error,
        };
        AppError::MalformedImport {
            line: err.line,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_messages() {
        let err = AppError::from(LedgerError::InvalidPosition { position: 4, len: 3 });
        assert_eq!(
            err.to_string(),
            "Invalid entry number 4: choose a number between 1 and 3"
        );

        let err = AppError::InvalidPosition { position: 1, len: 0 };
        assert_eq!(err.to_string(), "Invalid entry number 1: the ledger is empty");
    }

    #[test]
    fn test_import_error_keeps_first_line() {
        let err = AppError::from(ImportError {
            line: 3,
            field: Some("Amount".to_string()),
            error: "'lots' is not a number".to_string(),
        });
        assert!(matches!(err, AppError::MalformedImport { line: 3, .. }));
        assert!(err.to_string().contains("Amount: 'lots' is not a number"));
    }

    #[test]
    fn test_overflow_is_an_invalid_amount() {
        let err = AppError::from(BalanceOverflow);
        assert_eq!(err.to_string(), "Invalid amount: balance out of range");
    }

    #[test]
    fn test_only_empty_account_is_informational() {
        assert!(AppError::AccountEmpty("alice".into()).is_informational());
        assert!(!AppError::InvalidAmount("x".into()).is_informational());
    }
}
