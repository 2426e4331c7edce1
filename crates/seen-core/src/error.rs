//! Error types for Seen core
//!
//! Validation failures raised while building records and assessments.

use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Seen core errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wrong number of PHQ-9 answers
    #[error("Invalid answer count: {0}")]
    InvalidAnswerCount(String),

    /// PHQ-9 answer outside 0..=3
    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    /// Stored total does not match the answers
    #[error("Score mismatch: {0}")]
    ScoreMismatch(String),

    /// Unknown severity label
    #[error("Invalid severity level: {0}")]
    InvalidSeverity(String),

    /// Note content rejected
    #[error("Invalid note: {0}")]
    InvalidNote(String),

    /// Note content too long
    #[error("Note too long: {0}")]
    NoteTooLong(String),
}

impl Error {
    /// Check if error is a user-facing error (vs internal error)
    pub fn is_user_error(&self) -> bool {
        self.category() != ErrorCategory::Internal
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidAnswerCount(_) => {
                "Please answer all nine questions before submitting.".to_string()
            }
            Error::InvalidAnswer(_) => {
                "Each answer must be one of: not at all, several days, more than half the days, nearly every day.".to_string()
            }
            Error::InvalidNote(_) => "A note cannot be empty.".to_string(),
            Error::NoteTooLong(_) => format!(
                "Your note is too long. Maximum length is {} characters.",
                crate::records::MAX_NOTE_LENGTH
            ),
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidAnswerCount(_) | Error::InvalidAnswer(_) | Error::InvalidSeverity(_) => {
                ErrorCategory::Assessment
            }
            Error::InvalidNote(_) | Error::NoteTooLong(_) => ErrorCategory::Note,
            // Raised only for stored rows that disagree with themselves.
            Error::ScoreMismatch(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// PHQ-9 questionnaire errors
    Assessment,
    /// Journal note errors
    Note,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Assessment => write!(f, "Assessment"),
            ErrorCategory::Note => write!(f, "Note"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}
