//! Database module for HealthCheck AI
//!
//! Archives completed assessments.

mod schema;

pub use schema::*;

use crate::state_machine::Severity;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Assessment not found: {0}")]
    AssessmentNotFound(String),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

const SELECT_COLUMNS: &str = "SELECT id, primary_complaint, symptoms, duration, severity, age_range,
        possible_conditions, recommendations, notes, chat_history, created_at
 FROM assessments";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Assessment Operations ====================

    /// Archive a completed assessment
    pub fn insert_assessment(&self, record: &AssessmentRecord) -> DbResult<()> {
        let symptoms = serde_json::to_string(&record.symptoms)?;
        let conditions = serde_json::to_string(&record.possible_conditions)?;
        let recommendations = serde_json::to_string(&record.recommendations)?;
        let chat_history = serde_json::to_string(&record.chat_history)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO assessments (id, primary_complaint, symptoms, duration, severity, age_range,
                                      possible_conditions, recommendations, notes, chat_history, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.primary_complaint,
                symptoms,
                record.duration,
                record.severity.as_str(),
                record.age_range,
                conditions,
                recommendations,
                record.notes,
                chat_history,
                record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(())
    }

    /// List all assessments, newest first
    pub fn list_assessments(&self) -> DbResult<Vec<AssessmentRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map([], parse_assessment_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Get assessment by ID
    pub fn get_assessment(&self, id: &str) -> DbResult<AssessmentRecord> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;

        stmt.query_row(params![id], parse_assessment_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::AssessmentNotFound(id.to_string()),
                other => DbError::Sqlite(other),
            })
    }

    /// Delete an archived assessment
    pub fn delete_assessment(&self, id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM assessments WHERE id = ?1", params![id])?;

        if deleted == 0 {
            return Err(DbError::AssessmentNotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Parse an assessment row from the database
fn parse_assessment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssessmentRecord> {
    Ok(AssessmentRecord {
        id: row.get(0)?,
        primary_complaint: row.get(1)?,
        symptoms: parse_json_column(row, 2)?,
        duration: row.get(3)?,
        severity: Severity::from_stored(&row.get::<_, String>(4)?),
        age_range: row.get(5)?,
        possible_conditions: parse_json_column(row, 6)?,
        recommendations: parse_json_column(row, 7)?,
        notes: row.get(8)?,
        chat_history: parse_json_column(row, 9)?,
        created_at: parse_datetime_column(row, 10)?,
    })
}

fn parse_json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_datetime_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
