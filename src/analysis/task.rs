use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
}

/// One capture-analyze cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub id: String,
    pub prompt_text: String,
    pub started_at: DateTime<Utc>,
    pub status: AnalysisStatus,
    pub result_text: Option<String>,
    pub error_message: Option<String>,
}

impl AnalysisTask {
    pub fn new(prompt_text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt_text: prompt_text.into(),
            started_at: Utc::now(),
            status: AnalysisStatus::Pending,
            result_text: None,
            error_message: None,
        }
    }

    pub fn complete(&mut self, result: String) {
        self.status = AnalysisStatus::Completed;
        self.result_text = Some(result);
        self.error_message = None;
    }

    pub fn fail(&mut self, error: String) {
        self.status = AnalysisStatus::Failed;
        self.error_message = Some(error);
    }
}
