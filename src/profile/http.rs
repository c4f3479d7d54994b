// HTTP profile repository client
// Row-filtered REST store keyed by identity id

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ProfileRepository, RepositoryError};
use crate::auth::types::{Profile, ProfilePatch, Role};
use crate::provider::HttpIdentityProvider;

/// Profile row as stored by the repository.
#[derive(Deserialize)]
struct ProfileRow {
    id: Uuid,
    full_name: String,
    #[serde(default)]
    email: Option<String>,
    role: Role,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    bio: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            name: row.full_name,
            email: row.email.unwrap_or_default(),
            role: row.role,
            avatar_url: row.avatar_url,
            bio: row.bio,
        }
    }
}

/// Partial update in repository column names. `role` and `email` have no
/// counterpart here on purpose.
#[derive(Serialize)]
struct ProfileRowPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bio: Option<&'a str>,
}

impl<'a> ProfileRowPatch<'a> {
    fn from_patch(patch: &'a ProfilePatch) -> Self {
        Self {
            full_name: patch.name.as_deref(),
            avatar_url: patch.avatar_url.as_deref(),
            bio: patch.bio.as_deref(),
        }
    }
}

/// Profile repository backed by the platform's row REST API.
///
/// Requests are authorized with the current provider session token when
/// one exists, falling back to the service api key.
pub struct HttpProfileRepository {
    client: Client,
    base_url: String,
    api_key: String,
    provider: Arc<HttpIdentityProvider>,
}

impl HttpProfileRepository {
    pub fn new(
        provider: Arc<HttpIdentityProvider>,
        base_url: &str,
        api_key: &str,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            provider,
        })
    }

    fn profiles_url(&self) -> String {
        format!("{}/rest/v1/profiles", self.base_url)
    }

    async fn bearer_token(&self) -> String {
        self.provider
            .access_token()
            .await
            .unwrap_or_else(|| self.api_key.clone())
    }
}

#[async_trait]
impl ProfileRepository for HttpProfileRepository {
    async fn fetch(&self, id: Uuid) -> Result<Profile, RepositoryError> {
        tracing::debug!(user = %id, "Fetching profile");

        let response = self
            .client
            .get(self.profiles_url())
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .header("apikey", &self.api_key)
            .header("Accept", "application/vnd.pgrst.object+json")
            .bearer_auth(self.bearer_token().await)
            .send()
            .await?;

        let status = response.status();
        // Single-object Accept turns "zero rows" into 406
        if status == StatusCode::NOT_ACCEPTABLE || status == StatusCode::NOT_FOUND {
            return Err(RepositoryError::NotFound(id));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Unexpected {
                status: status.as_u16(),
                message,
            });
        }

        let row: ProfileRow = response.json().await?;
        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: &ProfilePatch) -> Result<(), RepositoryError> {
        tracing::debug!(user = %id, "Updating profile");

        let response = self
            .client
            .patch(self.profiles_url())
            .query(&[("id", format!("eq.{}", id))])
            .header("apikey", &self.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(self.bearer_token().await)
            .json(&ProfileRowPatch::from_patch(patch))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Unexpected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
