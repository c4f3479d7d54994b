// Profile repository module
// Point read and partial update of application profiles

mod http;

pub use http::HttpProfileRepository;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::types::{Profile, ProfilePatch};

/// Errors raised by profile repository calls
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// No profile row exists for this identity id
    #[error("profile not found for {0}")]
    NotFound(Uuid),

    /// The repository could not be reached
    #[error("profile request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The repository answered with something we cannot use
    #[error("unexpected repository response: {status} - {message}")]
    Unexpected { status: u16, message: String },
}

/// Keyed store mapping an identity id to its profile record.
///
/// `role` and `email` are not mutable through the update path.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn fetch(&self, id: Uuid) -> Result<Profile, RepositoryError>;

    async fn update(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), RepositoryError>;
}
