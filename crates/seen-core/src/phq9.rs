//! PHQ-9 questionnaire scoring
//!
//! Nine items, each answered 0 (not at all) to 3 (nearly every day).
//! The total (0..=27) maps onto the standard five severity bands.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of PHQ-9 items
pub const QUESTION_COUNT: usize = 9;

/// Highest score for a single item
pub const MAX_ANSWER_SCORE: u8 = 3;

/// Highest possible total
pub const MAX_TOTAL_SCORE: u8 = 27;

/// 1-based index of the self-harm item
pub const SELF_HARM_QUESTION: usize = 9;

/// Depression severity band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// 0-4
    Minimal,
    /// 5-9
    Mild,
    /// 10-14
    Moderate,
    /// 15-19
    ModeratelySevere,
    /// 20-27
    Severe,
}

impl Severity {
    /// All bands, lowest first
    pub const ALL: [Severity; 5] = [
        Severity::Minimal,
        Severity::Mild,
        Severity::Moderate,
        Severity::ModeratelySevere,
        Severity::Severe,
    ];

    /// Classify a total score. Scores above 27 are clamped into `Severe`.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => Severity::Minimal,
            5..=9 => Severity::Mild,
            10..=14 => Severity::Moderate,
            15..=19 => Severity::ModeratelySevere,
            _ => Severity::Severe,
        }
    }

    /// Stable label stored in `phq9_results.level`
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Minimal => "minimal",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::ModeratelySevere => "moderately_severe",
            Severity::Severe => "severe",
        }
    }

    /// Inclusive score range of the band
    pub fn score_range(&self) -> (u8, u8) {
        match self {
            Severity::Minimal => (0, 4),
            Severity::Mild => (5, 9),
            Severity::Moderate => (10, 14),
            Severity::ModeratelySevere => (15, 19),
            Severity::Severe => (20, MAX_TOTAL_SCORE),
        }
    }

    /// Moderate and above warrant suggesting professional follow-up
    pub fn needs_follow_up(&self) -> bool {
        *self >= Severity::Moderate
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Severity::ALL
            .iter()
            .copied()
            .find(|level| level.label() == s)
            .ok_or_else(|| Error::InvalidSeverity(s.to_string()))
    }
}

/// A completed, validated questionnaire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAssessment")]
pub struct Phq9Assessment {
    answers: [u8; QUESTION_COUNT],
}

/// Unchecked wire form; deserialization goes through `from_answers`
#[derive(Deserialize)]
struct RawAssessment {
    answers: Vec<u8>,
}

impl TryFrom<RawAssessment> for Phq9Assessment {
    type Error = Error;

    fn try_from(raw: RawAssessment) -> Result<Self> {
        Self::from_answers(&raw.answers)
    }
}

impl Phq9Assessment {
    /// Validate raw answers (exactly nine, each 0..=3)
    pub fn from_answers(answers: &[u8]) -> Result<Self> {
        if answers.len() != QUESTION_COUNT {
            return Err(Error::InvalidAnswerCount(format!(
                "expected {} answers, got {}",
                QUESTION_COUNT,
                answers.len()
            )));
        }

        if let Some((idx, value)) = answers
            .iter()
            .enumerate()
            .find(|&(_, &value)| value > MAX_ANSWER_SCORE)
        {
            return Err(Error::InvalidAnswer(format!(
                "question {} answered {}, maximum is {}",
                idx + 1,
                value,
                MAX_ANSWER_SCORE
            )));
        }

        let mut fixed = [0u8; QUESTION_COUNT];
        fixed.copy_from_slice(answers);
        Ok(Self { answers: fixed })
    }

    /// Per-question scores
    pub fn answers(&self) -> &[u8; QUESTION_COUNT] {
        &self.answers
    }

    /// Sum of all answers
    pub fn total_score(&self) -> u8 {
        self.answers.iter().sum()
    }

    /// Severity band of the total
    pub fn severity(&self) -> Severity {
        Severity::from_score(self.total_score())
    }

    /// Any non-zero answer to the self-harm item
    pub fn self_harm_flag(&self) -> bool {
        self.answers[SELF_HARM_QUESTION - 1] > 0
    }
}
