//! Seen core domain
//!
//! Record types shared by the plaintext and encrypted stores, plus PHQ-9
//! questionnaire scoring and severity classification. No I/O lives here.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod phq9;
pub mod records;

pub use error::{Error, ErrorCategory, Result};
pub use phq9::{
    Phq9Assessment, Severity, MAX_ANSWER_SCORE, MAX_TOTAL_SCORE, QUESTION_COUNT,
    SELF_HARM_QUESTION,
};
pub use records::{Note, Phq9Response, Phq9Result, MAX_NOTE_LENGTH};
