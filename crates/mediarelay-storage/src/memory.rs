//! In-memory blob store and scripted renewer
//!
//! Test doubles with the same observable contract as the Dropbox backend:
//! overwrite semantics, server-side offset checking, one link per path.
//! Every call is recorded so tests can assert exact call sequences.

use crate::credential::{RenewalError, TokenRenewer};
use crate::traits::{BlobStore, BlobStoreError, BlobStoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    StartSession,
    Append,
    Finish,
    CreateSharedLink,
    ListSharedLinks,
    CurrentAccount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobCall {
    Upload { path: String, len: u64 },
    StartSession { len: u64 },
    Append { session_id: String, offset: u64, len: u64 },
    Finish { session_id: String, offset: u64, path: String },
    CreateSharedLink { path: String },
    ListSharedLinks { path: String },
    CurrentAccount,
}

impl BlobCall {
    pub fn operation(&self) -> Operation {
        match self {
            BlobCall::Upload { .. } => Operation::Upload,
            BlobCall::StartSession { .. } => Operation::StartSession,
            BlobCall::Append { .. } => Operation::Append,
            BlobCall::Finish { .. } => Operation::Finish,
            BlobCall::CreateSharedLink { .. } => Operation::CreateSharedLink,
            BlobCall::ListSharedLinks { .. } => Operation::ListSharedLinks,
            BlobCall::CurrentAccount => Operation::CurrentAccount,
        }
    }
}

/// One-shot failure returned by the next matching call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Unauthorized,
    Status(u16),
    IncorrectOffset,
}

#[derive(Default)]
struct MemoryState {
    valid_token: Option<String>,
    faults: VecDeque<(Operation, Fault)>,
    files: HashMap<String, Vec<u8>>,
    sessions: HashMap<String, Vec<u8>>,
    links: HashMap<String, String>,
    calls: Vec<BlobCall>,
    next_id: u64,
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    state: Mutex<MemoryState>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Only `token` is accepted from now on; anything else is `Unauthorized`.
    pub fn set_valid_token(&self, token: &str) {
        self.lock().valid_token = Some(token.to_string());
    }

    pub fn inject(&self, operation: Operation, fault: Fault) {
        self.lock().faults.push_back((operation, fault));
    }

    pub fn calls(&self) -> Vec<BlobCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    /// Pretend a link was created out of band.
    pub fn insert_link(&self, path: &str, url: &str) {
        self.lock().links.insert(path.to_string(), url.to_string());
    }

    pub fn link_count(&self) -> usize {
        self.lock().links.len()
    }

    /// Record `call`, then apply token checks and injected faults.
    fn admit(&self, token: &str, call: BlobCall) -> BlobStoreResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        let operation = call.operation();
        let offset = match &call {
            BlobCall::Append { offset, .. } | BlobCall::Finish { offset, .. } => *offset,
            _ => 0,
        };
        state.calls.push(call);

        if let Some(valid) = state.valid_token.as_deref() {
            if valid != token {
                return Err(BlobStoreError::Unauthorized(
                    "{\"error_summary\": \"expired_access_token/\"}".to_string(),
                ));
            }
        }

        if let Some(index) = state.faults.iter().position(|(op, _)| *op == operation) {
            let (_, fault) = state.faults.remove(index).unwrap_or((operation, Fault::Status(500)));
            return Err(match fault {
                Fault::Unauthorized => {
                    BlobStoreError::Unauthorized("invalid_access_token".to_string())
                }
                Fault::Status(status) => BlobStoreError::Status {
                    status,
                    body: "injected failure".to_string(),
                },
                Fault::IncorrectOffset => BlobStoreError::IncorrectOffset {
                    sent: offset,
                    expected: None,
                },
            });
        }

        Ok(state)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, token: &str, path: &str, data: Bytes) -> BlobStoreResult<()> {
        let mut state = self.admit(
            token,
            BlobCall::Upload {
                path: path.to_string(),
                len: data.len() as u64,
            },
        )?;
        state.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn start_session(&self, token: &str, first_chunk: Bytes) -> BlobStoreResult<String> {
        let mut state = self.admit(
            token,
            BlobCall::StartSession {
                len: first_chunk.len() as u64,
            },
        )?;
        state.next_id += 1;
        let session_id = format!("session-{}", state.next_id);
        state.sessions.insert(session_id.clone(), first_chunk.to_vec());
        Ok(session_id)
    }

    async fn append(
        &self,
        token: &str,
        session_id: &str,
        offset: u64,
        chunk: Bytes,
    ) -> BlobStoreResult<()> {
        let mut state = self.admit(
            token,
            BlobCall::Append {
                session_id: session_id.to_string(),
                offset,
                len: chunk.len() as u64,
            },
        )?;
        let buffer = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| BlobStoreError::Status {
                status: 409,
                body: "lookup_failed/not_found".to_string(),
            })?;
        if buffer.len() as u64 != offset {
            return Err(BlobStoreError::IncorrectOffset {
                sent: offset,
                expected: Some(buffer.len() as u64),
            });
        }
        buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(
        &self,
        token: &str,
        session_id: &str,
        offset: u64,
        path: &str,
    ) -> BlobStoreResult<()> {
        let mut state = self.admit(
            token,
            BlobCall::Finish {
                session_id: session_id.to_string(),
                offset,
                path: path.to_string(),
            },
        )?;
        let received = state
            .sessions
            .get(session_id)
            .map(|b| b.len() as u64)
            .ok_or_else(|| BlobStoreError::Status {
                status: 409,
                body: "lookup_failed/not_found".to_string(),
            })?;
        if received != offset {
            return Err(BlobStoreError::IncorrectOffset {
                sent: offset,
                expected: Some(received),
            });
        }
        if let Some(data) = state.sessions.remove(session_id) {
            state.files.insert(path.to_string(), data);
        }
        Ok(())
    }

    async fn create_shared_link(&self, token: &str, path: &str) -> BlobStoreResult<String> {
        let mut state = self.admit(
            token,
            BlobCall::CreateSharedLink {
                path: path.to_string(),
            },
        )?;
        if !state.files.contains_key(path) {
            return Err(BlobStoreError::Status {
                status: 409,
                body: "path/not_found/".to_string(),
            });
        }
        if state.links.contains_key(path) {
            return Err(BlobStoreError::SharedLinkAlreadyExists(path.to_string()));
        }
        state.next_id += 1;
        let name = path.rsplit('/').next().unwrap_or(path);
        let url = format!("https://www.dropbox.com/s/{:08x}/{}?dl=0", state.next_id, name);
        state.links.insert(path.to_string(), url.clone());
        Ok(url)
    }

    async fn list_shared_links(&self, token: &str, path: &str) -> BlobStoreResult<Vec<String>> {
        let state = self.admit(
            token,
            BlobCall::ListSharedLinks {
                path: path.to_string(),
            },
        )?;
        Ok(state.links.get(path).cloned().into_iter().collect())
    }

    async fn current_account(&self, token: &str) -> BlobStoreResult<()> {
        self.admit(token, BlobCall::CurrentAccount)?;
        Ok(())
    }
}

/// Issues `token-1`, `token-2`, ... and counts calls.
pub struct ScriptedRenewer {
    calls: AtomicUsize,
    fail: bool,
    delay: Option<Duration>,
}

impl ScriptedRenewer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: None,
        }
    }

    /// Every renewal is rejected like a revoked refresh token.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedRenewer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenRenewer for ScriptedRenewer {
    async fn renew(&self) -> Result<String, RenewalError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RenewalError::Rejected {
                status: 400,
                body: "{\"error\": \"invalid_grant\"}".to_string(),
            });
        }
        Ok(format!("token-{}", n))
    }
}
