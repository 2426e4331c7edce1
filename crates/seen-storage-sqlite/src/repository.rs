//! Data access layer

use crate::{Database, Result};
use rusqlite::{params, OptionalExtension, Row};
use seen_core::{Note, Phq9Assessment, Phq9Response, Phq9Result, QUESTION_COUNT};

/// Repository for record operations on either store
pub struct Repository<'a> {
    db: &'a Database,
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: Some(row.get(0)?),
        content: row.get(1)?,
        timestamp: row.get(2)?,
        mood: row.get(3)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<Phq9Result> {
    Ok(Phq9Result {
        id: Some(row.get(0)?),
        score: row.get(1)?,
        level: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

fn response_from_row(row: &Row<'_>) -> rusqlite::Result<Phq9Response> {
    let mut answers = [0i64; QUESTION_COUNT];
    for (i, slot) in answers.iter_mut().enumerate() {
        *slot = row.get(i + 1)?;
    }
    Ok(Phq9Response {
        id: Some(row.get(0)?),
        answers,
        total_score: row.get(QUESTION_COUNT + 1)?,
        timestamp: row.get(QUESTION_COUNT + 2)?,
    })
}

const INSERT_RESPONSE_SQL: &str = r#"
    INSERT INTO phq9_responses
        (q1, q2, q3, q4, q5, q6, q7, q8, q9, total_score, timestamp)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

const INSERT_RESULT_SQL: &str =
    "INSERT INTO phq9_results (score, level, timestamp) VALUES (?1, ?2, ?3)";

impl<'a> Repository<'a> {
    /// Create repository
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a note, returning its new id
    pub fn insert_note(&self, note: &Note) -> Result<i64> {
        self.db.conn().execute(
            "INSERT INTO notes (content, timestamp, mood) VALUES (?1, ?2, ?3)",
            params![note.content, note.timestamp, note.mood],
        )?;
        Ok(self.db.conn().last_insert_rowid())
    }

    /// All notes, newest first
    pub fn list_notes(&self) -> Result<Vec<Note>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, content, timestamp, mood FROM notes ORDER BY timestamp DESC, id DESC",
        )?;
        let notes = stmt
            .query_map([], note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    /// Fetch one note
    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let note = self
            .db
            .conn()
            .query_row(
                "SELECT id, content, timestamp, mood FROM notes WHERE id = ?1",
                [id],
                note_from_row,
            )
            .optional()?;
        Ok(note)
    }

    /// Delete a note; returns whether a row was removed
    pub fn delete_note(&self, id: i64) -> Result<bool> {
        let affected = self.db.conn().execute("DELETE FROM notes WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Insert a PHQ-9 summary, returning its new id
    pub fn insert_phq9_result(&self, result: &Phq9Result) -> Result<i64> {
        self.db.conn().execute(
            INSERT_RESULT_SQL,
            params![result.score, result.level, result.timestamp],
        )?;
        Ok(self.db.conn().last_insert_rowid())
    }

    /// All PHQ-9 summaries, newest first
    pub fn list_phq9_results(&self) -> Result<Vec<Phq9Result>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, score, level, timestamp FROM phq9_results ORDER BY timestamp DESC, id DESC",
        )?;
        let results = stmt
            .query_map([], result_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    /// Most recent PHQ-9 summary
    pub fn latest_phq9_result(&self) -> Result<Option<Phq9Result>> {
        let result = self
            .db
            .conn()
            .query_row(
                "SELECT id, score, level, timestamp FROM phq9_results ORDER BY timestamp DESC, id DESC LIMIT 1",
                [],
                result_from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// Insert a PHQ-9 detailed response, returning its new id
    pub fn insert_phq9_response(&self, response: &Phq9Response) -> Result<i64> {
        let a = &response.answers;
        self.db.conn().execute(
            INSERT_RESPONSE_SQL,
            params![
                a[0],
                a[1],
                a[2],
                a[3],
                a[4],
                a[5],
                a[6],
                a[7],
                a[8],
                response.total_score,
                response.timestamp
            ],
        )?;
        Ok(self.db.conn().last_insert_rowid())
    }

    /// All PHQ-9 detailed responses, newest first
    pub fn list_phq9_responses(&self) -> Result<Vec<Phq9Response>> {
        let mut stmt = self.db.conn().prepare(
            r#"
            SELECT id, q1, q2, q3, q4, q5, q6, q7, q8, q9, total_score, timestamp
            FROM phq9_responses
            ORDER BY timestamp DESC, id DESC
            "#,
        )?;
        let responses = stmt
            .query_map([], response_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(responses)
    }

    /// Store the detailed response and its summary together
    pub fn record_assessment(&self, assessment: &Phq9Assessment, timestamp: i64) -> Result<(i64, i64)> {
        let response = Phq9Response::from_assessment(assessment, timestamp);
        let summary = Phq9Result::from_assessment(assessment, timestamp);

        let tx = self.db.conn().unchecked_transaction()?;
        let a = &response.answers;
        tx.execute(
            INSERT_RESPONSE_SQL,
            params![
                a[0],
                a[1],
                a[2],
                a[3],
                a[4],
                a[5],
                a[6],
                a[7],
                a[8],
                response.total_score,
                response.timestamp
            ],
        )?;
        let response_id = tx.last_insert_rowid();
        tx.execute(
            INSERT_RESULT_SQL,
            params![summary.score, summary.level, summary.timestamp],
        )?;
        let result_id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(
            "Recorded PHQ-9 assessment: response_id={}, result_id={}",
            response_id,
            result_id
        );
        Ok((response_id, result_id))
    }
}
