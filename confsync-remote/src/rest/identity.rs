//! Identity service over HTTP (GoTrue password grant + profiles table).

use async_trait::async_trait;
use confsync_types::PrincipalId;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use super::RestConfig;
use crate::error::{IdentityError, IdentityResult};
use crate::identity::{IdentityService, ProfileRecord, VerifiedIdentity};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: PrincipalId,
    #[serde(default)]
    email: Option<String>,
}

/// GoTrue / PostgREST backed identity service.
pub struct RestIdentityService {
    config: RestConfig,
    client: Client,
}

impl RestIdentityService {
    /// Creates a new identity service for the given backend.
    pub fn new(config: RestConfig) -> IdentityResult<Self> {
        let client = config.build_client().map_err(|e| {
            IdentityError::InvalidConfig(format!("failed to create HTTP client: {e}"))
        })?;
        Ok(Self { config, client })
    }
}

fn transport_error(what: &str, e: reqwest::Error) -> IdentityError {
    if e.is_timeout() {
        IdentityError::Timeout
    } else {
        IdentityError::Unavailable(format!("{what} failed: {e}"))
    }
}

/// 5xx means unreachable; any other failure on the auth endpoints is a
/// rejection of the credentials or token.
async fn check_status(response: Response, what: &str) -> IdentityResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(IdentityError::Unavailable(format!("{what} failed ({status}): {body}")))
    } else {
        debug!("{} rejected ({}): {}", what, status, body);
        Err(IdentityError::Rejected)
    }
}

#[async_trait]
impl IdentityService for RestIdentityService {
    async fn verify(&self, identifier: &str, secret: &str) -> IdentityResult<VerifiedIdentity> {
        let response = self
            .client
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "email": identifier,
                "password": secret,
            }))
            .send()
            .await
            .map_err(|e| transport_error("sign-in", e))?;

        let response = check_status(response, "sign-in").await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Protocol(format!("failed to parse token response: {e}")))?;

        Ok(VerifiedIdentity {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| identifier.to_string()),
            access_token: token.access_token,
        })
    }

    async fn fetch_profile(
        &self,
        identity: &VerifiedIdentity,
    ) -> IdentityResult<Option<ProfileRecord>> {
        let response = self
            .client
            .get(self.config.rest_url(&self.config.profiles_table))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&identity.access_token)
            .query(&[
                ("id", format!("eq.{}", identity.user_id)),
                ("select", "*".to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport_error("profile lookup", e))?;

        let response = check_status(response, "profile lookup").await?;
        let rows: Vec<ProfileRecord> = response
            .json()
            .await
            .map_err(|e| IdentityError::Protocol(format!("failed to parse profile: {e}")))?;
        Ok(rows.into_iter().next())
    }

    async fn sign_out(&self, identity: &VerifiedIdentity) -> IdentityResult<()> {
        let response = self
            .client
            .post(self.config.auth_url("logout"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&identity.access_token)
            .send()
            .await
            .map_err(|e| transport_error("sign-out", e))?;
        check_status(response, "sign-out").await?;
        Ok(())
    }
}
