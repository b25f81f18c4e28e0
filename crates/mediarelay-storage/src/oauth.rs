//! OAuth2 refresh-token renewal against `{oauth_url}/oauth2/token`

use crate::credential::{RenewalError, TokenRenewer};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

pub struct OAuthRenewer {
    http_client: Client,
    token_url: String,
    refresh_token: String,
    app_key: String,
    app_secret: String,
}

impl Debug for OAuthRenewer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("OAuthRenewer")
            .field("token_url", &self.token_url)
            .field("app_key", &self.app_key)
            .finish()
    }
}

impl OAuthRenewer {
    pub fn new(
        oauth_url: &str,
        refresh_token: String,
        app_key: String,
        app_secret: String,
        timeout: Duration,
    ) -> Result<Self, RenewalError> {
        if refresh_token.is_empty() || app_key.is_empty() || app_secret.is_empty() {
            return Err(RenewalError::InvalidConfiguration(
                "refresh token, app key and app secret are required".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenewalError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            token_url: format!("{}/oauth2/token", oauth_url.trim_end_matches('/')),
            refresh_token,
            app_key,
            app_secret,
        })
    }
}

#[async_trait]
impl TokenRenewer for OAuthRenewer {
    async fn renew(&self) -> Result<String, RenewalError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.app_key.as_str()),
            ("client_secret", self.app_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| RenewalError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RenewalError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RenewalError::Transport(format!("Failed to parse token response: {}", e)))?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(RenewalError::MissingToken)
    }
}
