use super::client::AnalysisClient;
use crate::error::AnalysisError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// One recorded call to [`MockAnalysisClient`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub query: String,
    pub image_data_url: String,
}

struct Scripted {
    delay: Duration,
    outcome: Result<String, AnalysisError>,
}

/// Scriptable analysis client for running without a relay
pub struct MockAnalysisClient {
    script: Mutex<VecDeque<Scripted>>,
    fallback: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockAnalysisClient {
    /// Answers every unscripted call with `fallback`
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful answer
    pub fn push_ok(&self, text: impl Into<String>, delay: Duration) {
        self.script.lock().push_back(Scripted {
            delay,
            outcome: Ok(text.into()),
        });
    }

    /// Queue a failure
    pub fn push_err(&self, error: AnalysisError, delay: Duration) {
        self.script.lock().push_back(Scripted {
            delay,
            outcome: Err(error),
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AnalysisClient for MockAnalysisClient {
    async fn analyze(&self, image_data_url: &str, query: &str) -> Result<String, AnalysisError> {
        self.calls.lock().push(RecordedCall {
            at: Instant::now(),
            query: query.to_string(),
            image_data_url: image_data_url.to_string(),
        });

        let next = self.script.lock().pop_front();
        match next {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                scripted.outcome
            }
            None => Ok(self.fallback.clone()),
        }
    }
}
