use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per window for routes under /api/v1/auth.
    pub auth_limit: i64,
    /// Requests per window for everything else.
    pub general_limit: i64,
    pub window_secs: i64,
    pub block_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub google_client_id: Option<String>,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "vitalog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "vitalog-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_i64("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 30),
        };
        let rate_limit = RateLimitConfig {
            auth_limit: env_i64("AUTH_RATE_LIMIT_REQUESTS", 5),
            general_limit: env_i64("RATE_LIMIT_REQUESTS", 100),
            window_secs: env_i64("RATE_LIMIT_WINDOW_SECS", 60),
            block_secs: env_i64("RATE_LIMIT_BLOCK_SECS", 300),
        };
        Ok(Self {
            database_url,
            jwt,
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
            rate_limit,
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
