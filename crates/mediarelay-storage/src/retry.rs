//! Renew-once-and-retry wrapper for blob store calls

use crate::credential::CredentialManager;
use crate::traits::{into_relay_error, BlobStoreError, BlobStoreResult};
use mediarelay_core::RelayResult;
use std::future::Future;

/// Run `call` with the current token. On [`BlobStoreError::Unauthorized`],
/// renew exactly once and run `call` exactly once more. Any other failure,
/// and any failure of the retry, is terminal for this call.
pub async fn with_auth_retry<T, F, Fut>(
    credentials: &CredentialManager,
    operation: &str,
    mut call: F,
) -> RelayResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = BlobStoreResult<T>>,
{
    let credential = credentials.current().await?;

    let err = match call(credential.token().to_string()).await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    if !err.is_unauthorized() {
        return Err(into_relay_error(operation, err));
    }

    tracing::warn!(
        operation,
        generation = credential.generation(),
        "Blob store rejected credential, renewing"
    );
    credentials.mark_unknown(&credential).await;
    let renewed = credentials.renew_after(&credential).await?;

    match call(renewed.token().to_string()).await {
        Ok(value) => Ok(value),
        Err(err @ BlobStoreError::Unauthorized(_)) => {
            credentials.mark_unknown(&renewed).await;
            tracing::error!(operation, "Renewed credential rejected, giving up");
            Err(into_relay_error(operation, err))
        }
        Err(err) => Err(into_relay_error(operation, err)),
    }
}
