//! Credential Manager
//!
//! Owns the blob store access token for the whole process. State is either
//! `Valid` (a probe or call succeeded with the current token) or `Unknown`
//! (never checked, or a call was just rejected). Renewals are serialized and
//! de-duplicated by generation: callers that saw the same rejected token share
//! a single renewal.

use crate::traits::{into_relay_error, BlobStore};
use async_trait::async_trait;
use mediarelay_core::{RelayError, RelayResult};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Credential renewal errors
#[derive(Debug, Error)]
pub enum RenewalError {
    #[error("Renewal endpoint rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Renewal response carried no access token")]
    MissingToken,

    #[error("Renewal request failed: {0}")]
    Transport(String),

    #[error("Invalid renewal configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<RenewalError> for RelayError {
    fn from(err: RenewalError) -> Self {
        RelayError::Renewal(err.to_string())
    }
}

/// Backend that mints a fresh access token from the long-lived renewal
/// credential.
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    async fn renew(&self) -> Result<String, RenewalError>;
}

/// Access token plus the generation it was issued in. Replaced wholesale on
/// renewal, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    generation: u64,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Valid,
    Unknown,
}

struct Inner {
    state: CredentialState,
    credential: Option<Credential>,
}

pub struct CredentialManager {
    inner: RwLock<Inner>,
    renew_lock: Mutex<()>,
    renewer: Arc<dyn TokenRenewer>,
}

impl CredentialManager {
    /// Start in `Unknown`, optionally with an initial token that has not been
    /// checked yet.
    pub fn new(initial_token: Option<String>, renewer: Arc<dyn TokenRenewer>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: CredentialState::Unknown,
                credential: initial_token
                    .filter(|t| !t.is_empty())
                    .map(|token| Credential {
                        token,
                        generation: 0,
                    }),
            }),
            renew_lock: Mutex::new(()),
            renewer,
        }
    }

    pub async fn state(&self) -> CredentialState {
        self.inner.read().await.state
    }

    /// Current credential. Issues the first token when none exists yet;
    /// concurrent first callers share that single renewal.
    pub async fn current(&self) -> Result<Credential, RenewalError> {
        if let Some(credential) = self.inner.read().await.credential.clone() {
            return Ok(credential);
        }

        let _guard = self.renew_lock.lock().await;
        if let Some(credential) = self.inner.read().await.credential.clone() {
            return Ok(credential);
        }
        self.renew_locked().await
    }

    /// Startup bootstrap: probe the current token against `store`; on any
    /// probe failure renew immediately. Ends in `Valid` on success.
    pub async fn ensure_valid(&self, store: &dyn BlobStore) -> Result<Credential, RenewalError> {
        let existing = self.inner.read().await.credential.clone();

        if let Some(credential) = existing {
            match store.current_account(credential.token()).await {
                Ok(()) => {
                    let mut inner = self.inner.write().await;
                    if inner.credential.as_ref() == Some(&credential) {
                        inner.state = CredentialState::Valid;
                    }
                    tracing::debug!(generation = credential.generation, "Credential probe succeeded");
                    return Ok(credential);
                }
                Err(e) => {
                    tracing::info!(error = %e, "Credential probe failed, renewing");
                    self.mark_unknown(&credential).await;
                    return self.renew_after(&credential).await;
                }
            }
        }

        self.current().await
    }

    /// Health check against `store`. Only an authentication rejection leads to
    /// a renewal, and the renewed token is probed again before reporting
    /// success. Any other failure is returned as is and leaves the credential
    /// untouched.
    pub async fn verify(&self, store: &dyn BlobStore) -> RelayResult<Credential> {
        const OPERATION: &str = "users/get_current_account";

        let credential = self.current().await?;
        let credential = match store.current_account(credential.token()).await {
            Ok(()) => credential,
            Err(err) if err.is_unauthorized() => {
                tracing::warn!(
                    generation = credential.generation,
                    "Blob store rejected credential during health check, renewing"
                );
                self.mark_unknown(&credential).await;
                let renewed = self.renew_after(&credential).await?;
                if let Err(err) = store.current_account(renewed.token()).await {
                    if err.is_unauthorized() {
                        self.mark_unknown(&renewed).await;
                    }
                    return Err(into_relay_error(OPERATION, err));
                }
                renewed
            }
            Err(err) => return Err(into_relay_error(OPERATION, err)),
        };

        self.mark_valid(&credential).await;
        Ok(credential)
    }

    /// Record that `credential` was accepted. A newer credential is left alone.
    async fn mark_valid(&self, credential: &Credential) {
        let mut inner = self.inner.write().await;
        if inner.credential.as_ref() == Some(credential) {
            inner.state = CredentialState::Valid;
        }
    }

    /// Record that `credential` was rejected. A newer credential is left alone.
    pub async fn mark_unknown(&self, credential: &Credential) {
        let mut inner = self.inner.write().await;
        if inner
            .credential
            .as_ref()
            .is_some_and(|c| c.generation == credential.generation)
        {
            inner.state = CredentialState::Unknown;
        }
    }

    /// Renew because `failed` was rejected. If another caller already replaced
    /// it while we waited for the lock, reuse that result instead.
    pub async fn renew_after(&self, failed: &Credential) -> Result<Credential, RenewalError> {
        let _guard = self.renew_lock.lock().await;

        {
            let inner = self.inner.read().await;
            if let Some(current) = inner.credential.as_ref() {
                if current.generation > failed.generation {
                    tracing::debug!(
                        generation = current.generation,
                        "Reusing credential renewed by a concurrent caller"
                    );
                    return Ok(current.clone());
                }
            }
        }

        self.renew_locked().await
    }

    async fn renew_locked(&self) -> Result<Credential, RenewalError> {
        let next_generation = self
            .inner
            .read()
            .await
            .credential
            .as_ref()
            .map(|c| c.generation + 1)
            .unwrap_or(1);

        let token = match self.renewer.renew().await {
            Ok(token) if !token.is_empty() => token,
            Ok(_) => return Err(RenewalError::MissingToken),
            Err(e) => {
                tracing::error!(error = %e, "Credential renewal failed");
                self.inner.write().await.state = CredentialState::Unknown;
                return Err(e);
            }
        };

        let credential = Credential {
            token,
            generation: next_generation,
        };

        let mut inner = self.inner.write().await;
        inner.credential = Some(credential.clone());
        inner.state = CredentialState::Valid;
        tracing::info!(generation = next_generation, "Credential renewed");

        Ok(credential)
    }
}
