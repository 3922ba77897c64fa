use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// The claims we care about from a verified Google id token.
#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
}

/// Seam for Google id-token verification so handlers can be exercised
/// without the network.
#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> anyhow::Result<GoogleIdentity>;
}

/// Verifies id tokens against Google's tokeninfo endpoint and checks the
/// audience against the configured OAuth client id.
pub struct TokenInfoVerifier {
    http: reqwest::Client,
    client_id: Option<String>,
}

impl TokenInfoVerifier {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: String,
    name: Option<String>,
}

#[async_trait]
impl GoogleVerifier for TokenInfoVerifier {
    async fn verify(&self, id_token: &str) -> anyhow::Result<GoogleIdentity> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GOOGLE_CLIENT_ID is not configured"))?;

        let response = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("token rejected by google ({})", response.status());
        }

        let info: TokenInfo = response.json().await?;
        if info.aud != client_id {
            anyhow::bail!("token audience mismatch");
        }

        debug!(sub = %info.sub, "google id token verified");
        Ok(GoogleIdentity {
            sub: info.sub,
            email: info.email,
            name: info.name,
        })
    }
}
