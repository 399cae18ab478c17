//! HTTP Basic authentication for the stream routes.
//!
//! Applied with `route_layer` only when `SC_API_USERNAME` and
//! `SC_API_PASSWORD` are configured. `/health` and `/metrics` stay open.

use crate::config::ApiCredentials;
use crate::errors::ScError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::IntoResponse,
};
use base64::{engine::general_purpose, Engine as _};
use ring::{constant_time, digest};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub username: String,
    pub password: SecretString,
}

impl From<ApiCredentials> for AuthState {
    fn from(credentials: ApiCredentials) -> Self {
        Self {
            username: credentials.username,
            password: credentials.password,
        }
    }
}

impl AuthState {
    fn accepts(&self, username: &str, password: &str) -> bool {
        // Evaluate both so a wrong username costs the same as a wrong password
        let username_ok = credential_matches(username, &self.username);
        let password_ok = credential_matches(password, self.password.expose_secret());
        username_ok & password_ok
    }
}

/// Constant-time comparison over SHA-256 digests, which have a fixed
/// length regardless of the inputs.
fn credential_matches(presented: &str, expected: &str) -> bool {
    let presented = digest::digest(&digest::SHA256, presented.as_bytes());
    let expected = digest::digest(&digest::SHA256, expected.as_bytes());
    constant_time::verify_slices_are_equal(presented.as_ref(), expected.as_ref()).is_ok()
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
fn extract_basic_credentials(headers: &HeaderMap) -> Result<(String, String), ScError> {
    let auth_str = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "sc.middleware.auth", "Missing Authorization header");
            ScError::Unauthorized
        })?;

    let encoded = auth_str.strip_prefix("Basic ").ok_or_else(|| {
        tracing::debug!(target: "sc.middleware.auth", "Invalid Authorization header format");
        ScError::Unauthorized
    })?;

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| ScError::Unauthorized)?;
    let credentials = String::from_utf8(decoded).map_err(|_| ScError::Unauthorized)?;

    match credentials.split_once(':') {
        Some((username, password)) => Ok((username.to_string(), password.to_string())),
        None => Err(ScError::Unauthorized),
    }
}

/// Reject requests without valid Basic credentials.
///
/// # Response
///
/// - Returns 401 with `WWW-Authenticate: Basic` if credentials are missing or wrong
/// - Continues to the next handler otherwise
#[instrument(skip_all, name = "sc.middleware.auth")]
pub async fn require_basic_auth(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, ScError> {
    let (username, password) = extract_basic_credentials(req.headers())?;

    if !state.accepts(&username, &password) {
        tracing::warn!(target: "sc.middleware.auth", username = %username, "Rejected credentials");
        return Err(ScError::Unauthorized);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState {
            username: "operator".to_string(),
            password: SecretString::from("hunter2"),
        })
    }

    fn basic(username: &str, password: &str) -> String {
        format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{username}:{password}"))
        )
    }

    fn test_app() -> Router {
        Router::new()
            .route("/streams", get(|| async { "OK" }))
            .route_layer(middleware::from_fn_with_state(
                auth_state(),
                require_basic_auth,
            ))
    }

    async fn send(authorization: Option<String>) -> axum::response::Response {
        let mut builder = HttpRequest::builder().method("GET").uri("/streams");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let request = builder.body(Body::empty()).unwrap();
        test_app().oneshot(request).await.unwrap()
    }

    #[test]
    fn test_extract_basic_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", basic("user", "pa:ss").parse().unwrap());

        let (username, password) = extract_basic_credentials(&headers).unwrap();
        assert_eq!(username, "user");
        assert_eq!(password, "pa:ss");
    }

    #[test]
    fn test_extract_rejects_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc".parse().unwrap());

        assert_eq!(
            extract_basic_credentials(&headers),
            Err(ScError::Unauthorized)
        );
    }

    #[test]
    fn test_extract_rejects_bad_base64() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic !!!".parse().unwrap());

        assert_eq!(
            extract_basic_credentials(&headers),
            Err(ScError::Unauthorized)
        );
    }

    #[test]
    fn test_credential_matches() {
        assert!(credential_matches("hunter2", "hunter2"));
        assert!(!credential_matches("hunter3", "hunter2"));
        assert!(!credential_matches("hunter", "hunter2"));
        assert!(!credential_matches("hunter22", "hunter2"));
        assert!(!credential_matches("", "hunter2"));
    }

    #[test]
    fn test_accepts_requires_both() {
        let state = auth_state();
        assert!(state.accepts("operator", "hunter2"));
        assert!(!state.accepts("operato", "hunter2"));
        assert!(!state.accepts("operator", "hunter2!"));
    }

    #[tokio::test]
    async fn test_valid_credentials_pass() {
        let response = send(Some(basic("operator", "hunter2"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let response = send(None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let response = send(Some(basic("operator", "wrong"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_prefix_of_username_rejected() {
        let response = send(Some(basic("oper", "hunter2"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
