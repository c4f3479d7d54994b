// HTTP identity provider client
// Speaks the hosted provider's REST auth dialect

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::persist::{self, StoredSession};
use super::{EventHub, EventStream, IdentityProvider, ProviderError};
use crate::auth::types::{AuthEvent, Identity};

/// Token expiry safety buffer in seconds
const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Serialize)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    user: ProviderUser,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: Uuid,
    email: String,
}

/// Identity provider client backed by the platform's auth REST API.
///
/// Holds the provider session in memory and mirrors it to a session file
/// so bootstrap can find an existing session after a restart. Emits
/// [`AuthEvent`]s on its own state changes.
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
    session_file: Option<PathBuf>,
    session: RwLock<Option<StoredSession>>,
    events: EventHub,
}

impl HttpIdentityProvider {
    pub fn new(
        base_url: &str,
        api_key: &str,
        session_file: Option<PathBuf>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        // A prior session is picked up from disk; anything unreadable or
        // already expired counts as no session.
        let session = match &session_file {
            Some(path) => match persist::load(path) {
                Ok(Some(stored)) if stored.is_expired() => {
                    tracing::info!("Stored provider session has expired, discarding");
                    let _ = persist::clear(path);
                    None
                }
                Ok(stored) => stored,
                Err(err) => {
                    tracing::warn!("Ignoring unreadable session file: {:#}", err);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            session_file,
            session: RwLock::new(session),
            events: EventHub::new(),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/auth/v1/token", self.base_url)
    }

    fn user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }

    fn logout_url(&self) -> String {
        format!("{}/auth/v1/logout", self.base_url)
    }

    /// Access token of the in-memory session, if one is held.
    pub async fn access_token(&self) -> Option<String> {
        let session = self.session.read().await;
        session.as_ref().map(|s| s.access_token.clone())
    }

    fn persist(&self, stored: &StoredSession) {
        if let Some(path) = &self.session_file {
            if let Err(err) = persist::store(path, stored) {
                tracing::warn!("Failed to persist provider session: {:#}", err);
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        tracing::debug!(email = %email, "Verifying credentials with provider");

        let response = self
            .client
            .post(self.token_url())
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(ProviderError::InvalidCredentials);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unexpected {
                status: status.as_u16(),
                message,
            });
        }

        let data: TokenResponse = response.json().await?;

        let expires_at = data
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64 - EXPIRY_BUFFER_SECS));
        let identity = Identity {
            id: data.user.id,
            email: data.user.email,
        };
        let stored = StoredSession {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expires_at,
            identity: identity.clone(),
        };

        self.persist(&stored);
        {
            let mut session = self.session.write().await;
            *session = Some(stored);
        }

        tracing::info!(user = %identity.id, "Provider session established");
        self.events.emit(AuthEvent::SignedIn(identity.clone()));

        Ok(identity)
    }

    async fn current_session(&self) -> Result<Option<Identity>, ProviderError> {
        let stored = {
            let session = self.session.read().await;
            session.clone()
        };
        let Some(stored) = stored else {
            return Ok(None);
        };

        if stored.is_expired() {
            tracing::info!("Provider session expired, treating as anonymous");
            let mut session = self.session.write().await;
            *session = None;
            if let Some(path) = &self.session_file {
                let _ = persist::clear(path);
            }
            return Ok(None);
        }

        // Validate the token against the provider rather than trusting
        // the file alone.
        let response = self
            .client
            .get(self.user_url())
            .header("apikey", &self.api_key)
            .bearer_auth(&stored.access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::info!("Stored provider session is no longer valid");
            let mut session = self.session.write().await;
            *session = None;
            if let Some(path) = &self.session_file {
                let _ = persist::clear(path);
            }
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unexpected {
                status: status.as_u16(),
                message,
            });
        }

        let user: ProviderUser = response.json().await?;
        Ok(Some(Identity {
            id: user.id,
            email: user.email,
        }))
    }

    async fn revoke_session(&self) -> Result<(), ProviderError> {
        let stored = {
            let session = self.session.read().await;
            session.clone()
        };
        let Some(stored) = stored else {
            // Nothing to revoke
            return Ok(());
        };

        let response = self
            .client
            .post(self.logout_url())
            .header("apikey", &self.api_key)
            .bearer_auth(&stored.access_token)
            .send()
            .await?;

        let status = response.status();
        // 401 means the provider already considers the session dead
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unexpected {
                status: status.as_u16(),
                message,
            });
        }

        {
            let mut session = self.session.write().await;
            *session = None;
        }
        if let Some(path) = &self.session_file {
            persist::clear(path).map_err(ProviderError::Storage)?;
        }

        tracing::info!("Provider session revoked");
        self.events.emit(AuthEvent::SignedOut);

        Ok(())
    }

    fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }
}
