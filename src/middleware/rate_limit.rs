//! Sliding-window rate limiting backed by Postgres, so limits hold across
//! restarts and replicas. Counting failures never take the API down; on a
//! database error the request is allowed through.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    body::Body,
};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Auth endpoints get a much tighter budget than the rest of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Auth,
    General,
}

impl RouteClass {
    pub fn of(path: &str) -> Self {
        if path.starts_with("/api/v1/auth") {
            RouteClass::Auth
        } else {
            RouteClass::General
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Auth => "auth",
            RouteClass::General => "general",
        }
    }

    pub fn limit(self, config: &RateLimitConfig) -> i64 {
        match self {
            RouteClass::Auth => config.auth_limit,
            RouteClass::General => config.general_limit,
        }
    }
}

/// First hop of X-Forwarded-For when present, otherwise the peer address.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Allow,
    Block { retry_after: i64 },
}

/// Pure decision rule: an unexpired block wins regardless of the current
/// window, otherwise the window count is measured against the class limit.
fn decide(
    block: Option<OffsetDateTime>,
    window_count: i64,
    limit: i64,
    block_secs: i64,
    now: OffsetDateTime,
) -> Decision {
    if let Some(until) = block {
        if until > now {
            return Decision::Block {
                retry_after: (until - now).whole_seconds().max(1),
            };
        }
    }
    if window_count > limit {
        Decision::Block {
            retry_after: block_secs,
        }
    } else {
        Decision::Allow
    }
}

async fn check(
    db: &PgPool,
    config: &RateLimitConfig,
    ip: &str,
    class: RouteClass,
) -> sqlx::Result<Decision> {
    let now = OffsetDateTime::now_utc();
    let limit = class.limit(config);

    let blocked_until: Option<OffsetDateTime> = sqlx::query_scalar(
        "SELECT blocked_until FROM rate_limit_blocks WHERE ip = $1 AND route_class = $2",
    )
    .bind(ip)
    .bind(class.as_str())
    .fetch_optional(db)
    .await?;
    if let blocked @ Decision::Block { .. } = decide(blocked_until, 0, limit, config.block_secs, now)
    {
        return Ok(blocked);
    }

    let window_start = now - time::Duration::seconds(config.window_secs);

    // Old rows are dead weight; clear them while we are here.
    sqlx::query("DELETE FROM rate_limit_requests WHERE requested_at < $1")
        .bind(window_start)
        .execute(db)
        .await?;

    sqlx::query(
        "INSERT INTO rate_limit_requests (id, ip, route_class, requested_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(ip)
    .bind(class.as_str())
    .bind(now)
    .execute(db)
    .await?;

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM rate_limit_requests \
         WHERE ip = $1 AND route_class = $2 AND requested_at >= $3",
    )
    .bind(ip)
    .bind(class.as_str())
    .bind(window_start)
    .fetch_one(db)
    .await?;

    let decision = decide(None, count, limit, config.block_secs, now);
    if let Decision::Block { .. } = decision {
        let until = now + time::Duration::seconds(config.block_secs);
        sqlx::query(
            "INSERT INTO rate_limit_blocks (ip, route_class, blocked_until) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (ip, route_class) DO UPDATE SET blocked_until = EXCLUDED.blocked_until",
        )
        .bind(ip)
        .bind(class.as_str())
        .bind(until)
        .execute(db)
        .await?;
    }
    Ok(decision)
}

pub async fn layer(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let class = RouteClass::of(request.uri().path());
    let ip = client_ip(request.headers(), peer);

    match check(&state.db, &state.config.rate_limit, &ip, class).await {
        Ok(Decision::Allow) => next.run(request).await,
        Ok(Decision::Block { retry_after }) => {
            tracing::info!(ip = %ip, class = class.as_str(), "rate limit hit");
            ApiError::RateLimited { retry_after }.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "rate limit check failed, allowing request");
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_routes_get_the_tight_class() {
        assert_eq!(RouteClass::of("/api/v1/auth/login"), RouteClass::Auth);
        assert_eq!(RouteClass::of("/api/v1/auth/register"), RouteClass::Auth);
        assert_eq!(RouteClass::of("/api/v1/meals"), RouteClass::General);
        assert_eq!(RouteClass::of("/health"), RouteClass::General);
    }

    #[test]
    fn class_limits_come_from_config() {
        let config = RateLimitConfig {
            auth_limit: 5,
            general_limit: 100,
            window_secs: 60,
            block_secs: 300,
        };
        assert_eq!(RouteClass::Auth.limit(&config), 5);
        assert_eq!(RouteClass::General.limit(&config), 100);
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let peer: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&headers, peer), "203.0.113.7");
    }

    #[test]
    fn active_block_persists_until_it_expires() {
        let now = OffsetDateTime::now_utc();
        let until = now + time::Duration::seconds(120);
        assert_eq!(
            decide(Some(until), 0, 5, 300, now),
            Decision::Block { retry_after: 120 }
        );
        // still blocked near the end of the window
        let late = until - time::Duration::seconds(1);
        assert_eq!(
            decide(Some(until), 0, 5, 300, late),
            Decision::Block { retry_after: 1 }
        );
    }

    #[test]
    fn expired_block_no_longer_applies() {
        let now = OffsetDateTime::now_utc();
        let past = now - time::Duration::seconds(1);
        assert_eq!(decide(Some(past), 3, 5, 300, now), Decision::Allow);
    }

    #[test]
    fn exceeding_the_window_limit_blocks_for_the_block_duration() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(decide(None, 5, 5, 300, now), Decision::Allow);
        assert_eq!(
            decide(None, 6, 5, 300, now),
            Decision::Block { retry_after: 300 }
        );
    }

    #[test]
    fn missing_or_empty_header_falls_back_to_peer() {
        let peer: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), peer), "10.0.0.1");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "".parse().unwrap());
        assert_eq!(client_ip(&headers, peer), "10.0.0.1");
    }
}
