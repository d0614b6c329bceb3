//! API request and response types

use crate::db::AssessmentRecord;
use crate::runtime::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Request carrying user text (typed input or a quick reply label)
#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub text: String,
}

/// Response with a session snapshot
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionSnapshot,
}

/// Response for queued session actions
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Response with archived assessments, newest first
#[derive(Debug, Serialize)]
pub struct AssessmentListResponse {
    pub assessments: Vec<AssessmentRecord>,
}

/// Response with one archived assessment
#[derive(Debug, Serialize)]
pub struct AssessmentResponse {
    pub assessment: AssessmentRecord,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
