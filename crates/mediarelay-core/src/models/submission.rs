use crate::constants::STATUS_IN_PROGRESS;
use serde::{Deserialize, Serialize};

/// Caller-supplied metadata forwarded to the transcription provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub language: String,
    pub service: String,
    pub callback_url: String,
    pub reference: String,
}

/// Outcome of one pipeline run.
///
/// `order_id` is the durable handle returned by the transcription provider;
/// nothing is handed to the persistence collaborator until a record exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub destination_url: String,
    pub destination_path: String,
    pub language: String,
    pub service: String,
    pub callback_url: String,
    pub reference: String,
    pub order_id: String,
    pub bitrate_kbps: u32,
}

impl SubmissionRecord {
    /// Published filename, i.e. the last segment of the destination path.
    pub fn filename(&self) -> &str {
        self.destination_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.destination_path)
    }
}

/// Row handed to the persistence collaborator once a submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub process_id: String,
    pub filename: String,
    pub order_id: String,
    pub status: String,
    pub public_url: String,
    pub transcription_type: Option<String>,
}

impl ProcessRecord {
    pub fn from_submission(
        process_id: impl Into<String>,
        record: &SubmissionRecord,
        transcription_type: Option<String>,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            filename: record.filename().to_string(),
            order_id: record.order_id.clone(),
            status: STATUS_IN_PROGRESS.to_string(),
            public_url: record.destination_url.clone(),
            transcription_type: transcription_type.filter(|t| !t.is_empty()),
        }
    }
}
