use axum::{
    extract::{FromRef, State},
    response::IntoResponse,
    Json,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        dto::{
            AuthResponse, GoogleVerifyRequest, LoginRequest, PublicUser, RefreshRequest,
            RegisterRequest, UpdateProfileRequest,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{constant_time_eq, hash_password, verify_password},
        repo::{RefreshToken, User},
    },
    error::ApiError,
    response,
    state::AppState,
};

/// Issue a fresh access/refresh pair and persist the refresh token,
/// revoking whatever was stored before.
async fn issue_tokens(
    state: &AppState,
    keys: &JwtKeys,
    user_id: Uuid,
) -> Result<(String, String), ApiError> {
    let access_token = keys.sign_access(user_id)?;
    let refresh_token = keys.sign_refresh(user_id)?;
    let expires_at =
        OffsetDateTime::now_utc() + Duration::seconds(keys.refresh_ttl.as_secs() as i64);
    RefreshToken::replace_for_user(&state.db, user_id, &refresh_token, expires_at).await?;
    Ok((access_token, refresh_token))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.validate()?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &payload.email,
        Some(&hash),
        None,
        payload.name.as_deref(),
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = issue_tokens(&state, &keys, user.id).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(response::created(
        "Registration successful",
        AuthResponse {
            access_token,
            refresh_token,
            user: PublicUser::from(user),
        },
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email, google-only account and wrong password all look the
    // same to the caller.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::unauthorized("Invalid credentials")
        })?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&payload.password, hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = issue_tokens(&state, &keys, user.id).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(response::ok(
        "Login successful",
        AuthResponse {
            access_token,
            refresh_token,
            user: PublicUser::from(user),
        },
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_google(
    State(state): State<AppState>,
    Json(payload): Json<GoogleVerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = state.google.verify(&payload.id_token).await.map_err(|e| {
        warn!(error = %e, "google token verification failed");
        ApiError::unauthorized("Invalid Google token")
    })?;

    let user = match User::find_by_google_id(&state.db, &identity.sub).await? {
        Some(user) => user,
        None => {
            let email = identity.email.trim().to_lowercase();
            match User::find_by_email(&state.db, &email).await? {
                Some(_) => {
                    warn!(email = %email, "google sign-in for existing email");
                    return Err(ApiError::conflict("Email already registered"));
                }
                None => {
                    let user = User::create(
                        &state.db,
                        &email,
                        None,
                        Some(&identity.sub),
                        identity.name.as_deref(),
                    )
                    .await?;
                    info!(user_id = %user.id, "user created via google sign-in");
                    user
                }
            }
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = issue_tokens(&state, &keys, user.id).await?;

    Ok(response::ok(
        "Google sign-in successful",
        AuthResponse {
            access_token,
            refresh_token,
            user: PublicUser::from(user),
        },
    ))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    // The token must also occupy the single active slot; anything else
    // has been rotated away.
    let stored = RefreshToken::find_for_user(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Refresh token revoked"))?;
    if !constant_time_eq(&stored.token, &payload.refresh_token)
        || stored.expires_at <= OffsetDateTime::now_utc()
    {
        warn!(user_id = %claims.sub, "stale refresh token presented");
        return Err(ApiError::unauthorized("Refresh token revoked"));
    }

    let user = User::find_active(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    let (access_token, refresh_token) = issue_tokens(&state, &keys, user.id).await?;

    info!(user_id = %user.id, "tokens rotated");
    Ok(response::ok(
        "Token refreshed",
        AuthResponse {
            access_token,
            refresh_token,
            user: PublicUser::from(user),
        },
    ))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Result<impl IntoResponse, ApiError> {
    Ok(response::ok("Profile retrieved", PublicUser::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.check()?;
    let updated = User::update_profile(&state.db, user.id, &payload)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(response::ok("Profile updated", PublicUser::from(updated)))
}

#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    User::soft_delete(&state.db, user.id).await?;
    RefreshToken::delete_for_user(&state.db, user.id).await?;
    info!(user_id = %user.id, "account soft-deleted");
    Ok(response::ok_empty("Account deleted"))
}
