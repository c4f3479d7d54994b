// Authentication and CORS middleware

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tower_http::cors::{Any, CorsLayer};

use crate::error::ApiError;
use crate::routes::AppState;

/// Authentication middleware
///
/// Verifies the gateway key in the Authorization header or x-api-key
/// header. Expects format: "Bearer {GATEWAY_API_KEY}" or just the key in
/// x-api-key.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(auth_header) = request.headers().get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            let expected = format!("Bearer {}", state.gateway_api_key);
            if auth_str == expected {
                return Ok(next.run(request).await);
            }
        }
    }

    if let Some(api_key_header) = request.headers().get("x-api-key") {
        if let Ok(key_str) = api_key_header.to_str() {
            if key_str == state.gateway_api_key {
                return Ok(next.run(request).await);
            }
        }
    }

    let path = request.uri().path();
    let method = request.method();
    tracing::warn!(
        "Access attempt with invalid or missing API key: {} {}",
        method,
        path
    );
    Err(ApiError::AuthError("Invalid or missing API Key".to_string()))
}

/// Create CORS middleware layer
///
/// The front end is served from a different origin; allow all origins,
/// methods, and headers. Preflight OPTIONS is handled automatically.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::util::ServiceExt;

    async fn test_handler() -> &'static str {
        "OK"
    }

    fn create_test_app(state: AppState) -> Router {
        Router::new()
            .route("/test", get(test_handler))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_auth_middleware_with_valid_bearer_token() {
        let (state, _env) = test_state("test-key-123");
        let app = create_test_app(state);

        let request = Request::builder()
            .uri("/test")
            .header("authorization", "Bearer test-key-123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_middleware_with_valid_x_api_key() {
        let (state, _env) = test_state("test-key-123");
        let app = create_test_app(state);

        let request = Request::builder()
            .uri("/test")
            .header("x-api-key", "test-key-123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_middleware_with_invalid_key() {
        let (state, _env) = test_state("test-key-123");
        let app = create_test_app(state);

        let request = Request::builder()
            .uri("/test")
            .header("authorization", "Bearer wrong-key")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_middleware_with_missing_auth() {
        let (state, _env) = test_state("test-key-123");
        let app = create_test_app(state);

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_middleware_bearer_without_prefix() {
        let (state, _env) = test_state("test-key-123");
        let app = create_test_app(state);

        let request = Request::builder()
            .uri("/test")
            .header("authorization", "test-key-123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cors_layer_allows_all_origins() {
        let (state, _env) = test_state("test-key-123");
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(cors_layer())
            .with_state(state);

        let request = Request::builder()
            .uri("/test")
            .header("origin", "https://eduverse.example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let allow_origin = response
            .headers()
            .get("access-control-allow-origin")
            .unwrap();
        assert_eq!(allow_origin, "*");
    }

    #[tokio::test]
    async fn test_cors_layer_handles_preflight_options() {
        let (state, _env) = test_state("test-key-123");
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(cors_layer())
            .with_state(state);

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/test")
            .header("origin", "https://eduverse.example.com")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key("access-control-allow-methods"));
        assert!(response
            .headers()
            .contains_key("access-control-allow-headers"));
    }
}
