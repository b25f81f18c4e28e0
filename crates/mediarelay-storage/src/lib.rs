//! Mediarelay Storage Library
//!
//! Publishes transcoded artifacts to a remote blob store and obtains a public
//! link for them.
//!
//! # Call model
//!
//! Every network call goes through [`retry::with_auth_retry`]: the call is made
//! with the current credential, and an authentication failure triggers exactly
//! one renewal through the shared [`CredentialManager`] followed by exactly one
//! retry. Any other failure, or a second authentication failure, is terminal.
//!
//! Uploads always overwrite, so publishing the same file to the same path
//! twice is safe.

pub mod credential;
#[cfg(feature = "storage-dropbox")]
pub mod dropbox;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
#[cfg(feature = "storage-dropbox")]
pub mod oauth;
pub mod publisher;
pub mod retry;
pub mod session;
pub mod traits;

// Re-export commonly used types
pub use credential::{Credential, CredentialManager, CredentialState, RenewalError, TokenRenewer};
#[cfg(feature = "storage-dropbox")]
pub use dropbox::DropboxClient;
#[cfg(feature = "storage-dropbox")]
pub use oauth::OAuthRenewer;
pub use publisher::{to_direct_download, PublishedArtifact, Publisher, UploadLimits};
pub use retry::with_auth_retry;
pub use session::{SessionState, UploadSession};
pub use traits::{BlobStore, BlobStoreError, BlobStoreResult};
