//! Records stored in both the plaintext and the encrypted database

use crate::phq9::{Phq9Assessment, Severity, QUESTION_COUNT};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum note length in bytes
pub const MAX_NOTE_LENGTH: usize = 10_000;

/// Journal note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Row id (None until inserted)
    pub id: Option<i64>,
    /// Note text
    pub content: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Free-form mood tag
    pub mood: Option<String>,
}

impl Note {
    /// Create a note stamped with the current time
    pub fn new(content: impl Into<String>, mood: Option<String>) -> Result<Self> {
        Self::with_timestamp(content, mood, chrono::Utc::now().timestamp_millis())
    }

    /// Create a note with an explicit timestamp
    pub fn with_timestamp(
        content: impl Into<String>,
        mood: Option<String>,
        timestamp: i64,
    ) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::InvalidNote("content is empty".to_string()));
        }
        if content.len() > MAX_NOTE_LENGTH {
            return Err(Error::NoteTooLong(format!(
                "Note is {} bytes, maximum is {} bytes",
                content.len(),
                MAX_NOTE_LENGTH
            )));
        }
        let mood = mood
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(Self {
            id: None,
            content,
            timestamp,
            mood,
        })
    }
}

/// PHQ-9 summary row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phq9Result {
    /// Row id (None until inserted)
    pub id: Option<i64>,
    /// Total score 0..=27
    pub score: i64,
    /// Severity label
    pub level: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl Phq9Result {
    /// Summarise an assessment
    pub fn from_assessment(assessment: &Phq9Assessment, timestamp: i64) -> Self {
        Self {
            id: None,
            score: i64::from(assessment.total_score()),
            level: assessment.severity().label().to_string(),
            timestamp,
        }
    }

    /// Parse the stored level label
    pub fn severity(&self) -> Result<Severity> {
        self.level.parse()
    }
}

/// PHQ-9 detailed response row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phq9Response {
    /// Row id (None until inserted)
    pub id: Option<i64>,
    /// Per-question scores q1..q9
    pub answers: [i64; QUESTION_COUNT],
    /// Sum of answers
    pub total_score: i64,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl Phq9Response {
    /// Detailed row for an assessment
    pub fn from_assessment(assessment: &Phq9Assessment, timestamp: i64) -> Self {
        let mut answers = [0i64; QUESTION_COUNT];
        for (slot, value) in answers.iter_mut().zip(assessment.answers()) {
            *slot = i64::from(*value);
        }
        Self {
            id: None,
            answers,
            total_score: i64::from(assessment.total_score()),
            timestamp,
        }
    }

    /// Re-validate a stored row
    pub fn to_assessment(&self) -> Result<Phq9Assessment> {
        let mut raw = [0u8; QUESTION_COUNT];
        for (slot, value) in raw.iter_mut().zip(self.answers.iter()) {
            *slot = u8::try_from(*value)
                .map_err(|_| Error::InvalidAnswer(format!("stored answer {} out of range", value)))?;
        }
        let assessment = Phq9Assessment::from_answers(&raw)?;
        if i64::from(assessment.total_score()) != self.total_score {
            return Err(Error::ScoreMismatch(format!(
                "stored total {} but answers sum to {}",
                self.total_score,
                assessment.total_score()
            )));
        }
        Ok(assessment)
    }
}
