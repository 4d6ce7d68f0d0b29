//! Periodic capture-analyze loop and its analysis endpoint client.

mod client;
mod mock;
mod runner;
mod task;

pub use client::{AnalysisClient, ANALYZE_PATH, AnalyzeRequest, AnalyzeResponse, ErrorResponse, RelayClient};
pub use mock::{MockAnalysisClient, RecordedCall};
pub use runner::{AnalysisLoop, AnalysisSnapshot};
pub use task::{AnalysisStatus, AnalysisTask};
