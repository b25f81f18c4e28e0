//! Chunked upload session state
//!
//! `NotStarted --start--> InProgress --append*--> InProgress --finish--> Finished`.
//! Any other transition is a protocol error.

use mediarelay_core::{RelayError, RelayResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    InProgress { session_id: String, offset: u64 },
    Finished,
}

#[derive(Debug)]
pub struct UploadSession {
    path: String,
    state: SessionState,
}

impl UploadSession {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: SessionState::NotStarted,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Offset and id to send with the next append or the finish call.
    pub fn cursor(&self) -> RelayResult<(&str, u64)> {
        match &self.state {
            SessionState::InProgress { session_id, offset } => Ok((session_id.as_str(), *offset)),
            other => Err(invalid("read cursor of", other)),
        }
    }

    pub fn start(&mut self, session_id: String, first_chunk_len: u64) -> RelayResult<()> {
        if self.state != SessionState::NotStarted {
            return Err(invalid("start", &self.state));
        }
        if session_id.is_empty() {
            return Err(RelayError::Protocol(
                "upload session start returned an empty session id".to_string(),
            ));
        }
        if first_chunk_len == 0 {
            return Err(RelayError::Protocol(
                "upload session started with an empty chunk".to_string(),
            ));
        }
        self.state = SessionState::InProgress {
            session_id,
            offset: first_chunk_len,
        };
        Ok(())
    }

    /// Advance past an acknowledged chunk and return the new offset.
    pub fn advance(&mut self, chunk_len: u64) -> RelayResult<u64> {
        match &mut self.state {
            SessionState::InProgress { offset, .. } => {
                if chunk_len == 0 {
                    return Err(RelayError::Protocol(
                        "refusing to append an empty chunk".to_string(),
                    ));
                }
                *offset += chunk_len;
                Ok(*offset)
            }
            other => Err(invalid("append to", other)),
        }
    }

    /// Close the session; the offset must equal the committed file size.
    pub fn finish(&mut self, total_size: u64) -> RelayResult<()> {
        match &self.state {
            SessionState::InProgress { offset, .. } if *offset == total_size => {
                self.state = SessionState::Finished;
                Ok(())
            }
            SessionState::InProgress { offset, .. } => Err(RelayError::Protocol(format!(
                "session offset {} does not match file size {} for {}",
                offset, total_size, self.path
            ))),
            other => Err(invalid("finish", other)),
        }
    }
}

fn invalid(action: &str, state: &SessionState) -> RelayError {
    let name = match state {
        SessionState::NotStarted => "not started",
        SessionState::InProgress { .. } => "in progress",
        SessionState::Finished => "finished",
    };
    RelayError::Protocol(format!("cannot {} an upload session that is {}", action, name))
}
