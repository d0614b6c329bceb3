//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{AssessmentRecord, AssessmentResult, Database, DbError};
use crate::llm::LlmError;
use crate::state_machine::IntakeRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Archive of completed assessments
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Persist a record, returning its id
    async fn append(&self, record: &AssessmentRecord) -> Result<String, String>;

    /// All records, newest first
    async fn list(&self) -> Result<Vec<AssessmentRecord>, String>;

    async fn get(&self, id: &str) -> Result<Option<AssessmentRecord>, String>;

    /// Delete a record; `false` if it did not exist
    async fn delete(&self, id: &str) -> Result<bool, String>;
}

/// Service that turns an intake into a structured assessment
#[async_trait]
pub trait AssessmentClient: Send + Sync {
    async fn assess(&self, intake: &IntakeRecord) -> Result<AssessmentResult, LlmError>;
}

/// Pause between showing the typing indicator and the bot message
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AssessmentStore + ?Sized> AssessmentStore for Arc<T> {
    async fn append(&self, record: &AssessmentRecord) -> Result<String, String> {
        (**self).append(record).await
    }

    async fn list(&self) -> Result<Vec<AssessmentRecord>, String> {
        (**self).list().await
    }

    async fn get(&self, id: &str) -> Result<Option<AssessmentRecord>, String> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool, String> {
        (**self).delete(id).await
    }
}

#[async_trait]
impl<T: AssessmentClient + ?Sized> AssessmentClient for Arc<T> {
    async fn assess(&self, intake: &IntakeRecord) -> Result<AssessmentResult, LlmError> {
        (**self).assess(intake).await
    }
}

#[async_trait]
impl<T: Pacer + ?Sized> Pacer for Arc<T> {
    async fn pause(&self) {
        (**self).pause().await;
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as `AssessmentStore`
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AssessmentStore for DatabaseStore {
    async fn append(&self, record: &AssessmentRecord) -> Result<String, String> {
        self.db
            .insert_assessment(record)
            .map(|()| record.id.clone())
            .map_err(|e| e.to_string())
    }

    async fn list(&self) -> Result<Vec<AssessmentRecord>, String> {
        self.db.list_assessments().map_err(|e| e.to_string())
    }

    async fn get(&self, id: &str) -> Result<Option<AssessmentRecord>, String> {
        match self.db.get_assessment(id) {
            Ok(record) => Ok(Some(record)),
            Err(DbError::AssessmentNotFound(_)) => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, String> {
        match self.db.delete_assessment(id) {
            Ok(()) => Ok(true),
            Err(DbError::AssessmentNotFound(_)) => Ok(false),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Fixed typing delay backed by the tokio timer
#[derive(Debug, Clone, Copy)]
pub struct TypingDelay {
    delay: Duration,
}

impl TypingDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Pacer for TypingDelay {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
