//! Error types for the insight pipeline.
//!
//! Structural failures ([`InsightError::Schema`], [`InsightError::NoFeatures`],
//! [`InsightError::Scoring`]) abort a run and are meant to be rendered to the
//! person who uploaded the dataset. [`InsightError::Cleaning`] is recovered
//! locally: the offending column is excluded and the error text travels with
//! the insight as a warning.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, InsightError>;

/// Errors that can occur while turning a raw table into an insight.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsightError {
    /// The input table has an unusable shape (no columns, no rows, ragged rows).
    #[error("Unusable table shape: {0}")]
    Schema(String),

    /// A numeric or temporal column could not be fully imputed.
    #[error("Column '{column}' could not be cleaned: {reason}")]
    Cleaning { column: String, reason: String },

    /// No numeric or temporal column survived inference and cleaning.
    #[error("No numeric or temporal columns available to score")]
    NoFeatures,

    /// Too few rows for the isolation forest to mean anything.
    #[error("Need at least {min_required} rows to score anomalies, got {actual}")]
    Scoring { min_required: usize, actual: usize },

    /// The input could not be decoded.
    #[error("Failed to read input: {0}")]
    Ingest(String),

    /// Invalid configuration or parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The executor refused a run because every worker slot is busy.
    #[error("Pipeline capacity exhausted: limit of {limit} concurrent runs reached")]
    CapacityExceeded { limit: usize },

    /// The caller abandoned the run before it finished.
    #[error("Pipeline run was cancelled")]
    Cancelled,

    /// Unexpected failure inside the library.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InsightError {
    /// Creates a schema error with the given message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Creates a cleaning error for the given column.
    pub fn cleaning(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cleaning {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Creates an ingest error with the given message.
    pub fn ingest(msg: impl Into<String>) -> Self {
        Self::Ingest(msg.into())
    }

    /// Creates an invalid configuration error with the given message.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if the error describes a problem with the uploaded data
    /// that the uploader can fix, as opposed to a fault in the service.
    pub fn is_user_facing(&self) -> bool {
        match self {
            InsightError::Schema(_)
            | InsightError::NoFeatures
            | InsightError::Scoring { .. }
            | InsightError::Ingest(_) => true,
            InsightError::Cleaning { .. }
            | InsightError::InvalidConfiguration(_)
            | InsightError::Serialization(_)
            | InsightError::CapacityExceeded { .. }
            | InsightError::Cancelled
            | InsightError::Internal(_) => false,
        }
    }

    /// Returns an actionable sentence suitable for showing to the uploader.
    pub fn user_message(&self) -> String {
        match self {
            InsightError::Schema(msg) => {
                format!("The file could not be analyzed because its layout is unusable ({msg}). Check that it has a header row and at least one data row.")
            }
            InsightError::NoFeatures => "The dataset has no numeric or date/time columns, so there is nothing to score. Add at least one measurement or timestamp column.".to_string(),
            InsightError::Scoring {
                min_required,
                actual,
            } => format!(
                "The dataset is too small to analyze: {actual} usable rows after cleaning, at least {min_required} are needed."
            ),
            InsightError::Ingest(msg) => {
                format!("The file could not be read ({msg}). Check that it is a CSV or Excel file, that the delimiter is right and that every row has the same number of fields.")
            }
            InsightError::CapacityExceeded { .. } => {
                "The analysis service is busy. Please resubmit the file shortly.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Converts Arrow decode errors to InsightError.
impl From<arrow::error::ArrowError> for InsightError {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::Ingest(err.to_string())
    }
}

/// Converts serde_json errors to InsightError.
impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InsightError::Scoring {
            min_required: 10,
            actual: 5,
        };
        assert_eq!(
            err.to_string(),
            "Need at least 10 rows to score anomalies, got 5"
        );

        let err = InsightError::cleaning("amount", "no valid values");
        assert!(err.to_string().contains("amount"));
        assert!(err.to_string().contains("no valid values"));
    }

    #[test]
    fn test_user_facing_classification() {
        assert!(InsightError::NoFeatures.is_user_facing());
        assert!(InsightError::schema("zero rows").is_user_facing());
        assert!(InsightError::Scoring {
            min_required: 10,
            actual: 3
        }
        .is_user_facing());
        assert!(!InsightError::Cancelled.is_user_facing());
        assert!(!InsightError::internal("boom").is_user_facing());
    }

    #[test]
    fn test_user_message_explains_small_dataset() {
        let msg = InsightError::Scoring {
            min_required: 10,
            actual: 5,
        }
        .user_message();
        assert!(msg.contains("too small to analyze"));
        assert!(msg.contains('5'));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: InsightError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, InsightError::Serialization(_)));
    }
}
