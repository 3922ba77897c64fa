use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::jwt::{JwtKeys, TokenKind};
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::state::AppState;

/// Extracts the bearer token, validates it and loads the (non-deleted)
/// user it references. Fails closed: any defect is a 401.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::unauthorized("Invalid or expired token")
        })?;

        if claims.kind != TokenKind::Access {
            return Err(ApiError::unauthorized("Access token required"));
        }

        let user = User::find_active(&state.db, claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token references missing or deleted user");
                ApiError::unauthorized("Invalid or expired token")
            })?;

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(state: &AppState, auth_header: Option<&str>) -> Result<AuthUser, ApiError> {
        let mut builder = Request::builder().uri("/api/v1/meals");
        if let Some(value) = auth_header {
            builder = builder.header(axum::http::header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = AppState::fake();
        assert!(matches!(
            extract(&state, None).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn non_bearer_header_is_unauthorized() {
        let state = AppState::fake();
        assert!(matches!(
            extract(&state, Some("Basic abc123")).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let state = AppState::fake();
        assert!(matches!(
            extract(&state, Some("Bearer not.a.jwt")).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn refresh_token_is_rejected_for_api_access() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_refresh(uuid::Uuid::new_v4()).unwrap();
        let result = extract(&state, Some(&format!("Bearer {token}"))).await;
        match result {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Access token required"),
            other => panic!("expected unauthorized, got {:?}", other.is_ok()),
        }
    }
}
