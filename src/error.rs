// Error handling module
// Defines the operation error taxonomy and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::types::Role;
use crate::profile::RepositoryError;
use crate::provider::ProviderError;

/// Errors surfaced by the auth manager's public operations
#[derive(Error, Debug)]
pub enum AuthError {
    /// The provider rejected the email/password pair
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The authenticated profile's role differs from the requested one
    #[error("Invalid login. Please use the correct {requested} login form")]
    RoleMismatch { requested: Role, actual: Role },

    /// Profile lookup failed after a successful credential check
    #[error("Failed to load profile: {0}")]
    ProfileFetch(#[source] RepositoryError),

    /// Profile update failed; the cached profile is unchanged
    #[error("Failed to update profile: {0}")]
    ProfileUpdate(#[source] RepositoryError),

    /// A sign-in is already in flight on this manager
    #[error("A sign-in is already in progress")]
    OperationInProgress,

    /// The operation requires an authenticated session
    #[error("You must be logged in to update your profile")]
    NotAuthenticated,

    /// Unexpected identity provider failure
    #[error("Identity provider error: {0}")]
    Provider(#[source] ProviderError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Short machine-readable tag for logs and response bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::RoleMismatch { .. } => "role_mismatch",
            AuthError::ProfileFetch(_) => "profile_fetch_failed",
            AuthError::ProfileUpdate(_) => "profile_update_failed",
            AuthError::OperationInProgress => "operation_in_progress",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::Provider(_) => "provider_error",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredentials => AuthError::InvalidCredentials,
            other => AuthError::Provider(other),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidCredentials | AuthError::NotAuthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::RoleMismatch { .. } => StatusCode::FORBIDDEN,
            AuthError::OperationInProgress => StatusCode::CONFLICT,
            AuthError::ProfileFetch(_) | AuthError::ProfileUpdate(_) | AuthError::Provider(_) => {
                StatusCode::BAD_GATEWAY
            }
            AuthError::Internal(err) => {
                // Log internal errors
                tracing::error!("Internal error: {:?}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": self.kind(),
            }
        }));

        (status, body).into_response()
    }
}

/// Errors raised by the gateway's own HTTP surface (not the auth core)
#[derive(Error, Debug)]
pub enum ApiError {
    /// Gateway key missing or wrong
    #[error("Authentication failed: {0}")]
    AuthError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::AuthError(message) = self;
        let body = Json(json!({
            "error": {
                "message": message,
                "type": "auth_error",
            }
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AuthError::InvalidCredentials;
        assert_eq!(err.to_string(), "Invalid email or password");

        let err = AuthError::RoleMismatch {
            requested: Role::Student,
            actual: Role::Teacher,
        };
        assert_eq!(
            err.to_string(),
            "Invalid login. Please use the correct student login form"
        );

        let err = AuthError::OperationInProgress;
        assert_eq!(err.to_string(), "A sign-in is already in progress");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(AuthError::InvalidCredentials.kind(), "invalid_credentials");
        assert_eq!(AuthError::NotAuthenticated.kind(), "not_authenticated");
        assert_eq!(
            AuthError::OperationInProgress.kind(),
            "operation_in_progress"
        );
    }

    #[test]
    fn test_provider_error_mapping() {
        let err: AuthError = ProviderError::InvalidCredentials.into();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err: AuthError = ProviderError::Unexpected {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, AuthError::Provider(_)));
    }

    #[tokio::test]
    async fn test_error_response_conversion() {
        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::RoleMismatch {
            requested: Role::Teacher,
            actual: Role::Student,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = AuthError::OperationInProgress.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AuthError::NotAuthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_upstream_errors_map_to_bad_gateway() {
        let response = AuthError::Provider(ProviderError::Unexpected {
            status: 503,
            message: "unavailable".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let response = ApiError::AuthError("Invalid or missing API Key".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
