// Identity provider module
// Contract consumed by the auth manager, plus the HTTP implementation

mod events;
mod http;
mod persist;

pub use events::{EventHub, EventStream};
pub use http::HttpIdentityProvider;
pub use persist::StoredSession;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::types::Identity;

/// Errors raised by identity provider calls
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The email/password pair was rejected
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The provider could not be reached
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with something we cannot use
    #[error("unexpected provider response: {status} - {message}")]
    Unexpected { status: u16, message: String },

    /// Persisted-session storage failure
    #[error("session storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

/// Credential verification, session issuance/destruction, and the session
/// change stream.
///
/// The provider owns identities; the auth manager only ever holds copies.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an email/password pair and establish a provider session.
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError>;

    /// The identity of the existing provider session, if any.
    async fn current_session(&self) -> Result<Option<Identity>, ProviderError>;

    /// Destroy the current provider session. Idempotent.
    async fn revoke_session(&self) -> Result<(), ProviderError>;

    /// Subscribe to session change events. Dropping the returned stream
    /// deregisters the subscriber.
    fn subscribe(&self) -> EventStream;
}
