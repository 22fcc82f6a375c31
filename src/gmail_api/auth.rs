use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::gmail_api::operations::AuthorizedClient;
use crate::gmail_api::token::StoredToken;
use crate::types::{TokenErrorResponse, TokenResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex};
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

/// The only scope ever requested: send mail, nothing else.
pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

// Define a trait for the provider's token endpoints to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Trade a refresh token for a fresh access token.
    async fn refresh_token(
        &self,
        secret: &ApplicationSecret,
        refresh_token: &str,
    ) -> Result<StoredToken>;

    /// Run the interactive consent flow and exchange the returned code.
    async fn exchange_auth_code(
        &self,
        secret: &ApplicationSecret,
        scopes: &[String],
    ) -> Result<StoredToken>;
}

/// Talks to Google's real OAuth2 endpoints.
pub struct GoogleOAuthFlow {
    http: reqwest::Client,
}

impl GoogleOAuthFlow {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for GoogleOAuthFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OAuthFlow for GoogleOAuthFlow {
    async fn refresh_token(
        &self,
        secret: &ApplicationSecret,
        refresh_token: &str,
    ) -> Result<StoredToken> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&secret.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::auth(format!("token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = match response.json::<TokenErrorResponse>().await {
                Ok(err) => format!("{} {}", err.error, err.error_description),
                Err(_) => status.to_string(),
            };
            return Err(Error::auth(format!("token refresh rejected: {}", detail.trim())));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("invalid token refresh response: {}", e)))?;
        Ok(StoredToken::from_response(token_response))
    }

    async fn exchange_auth_code(
        &self,
        secret: &ApplicationSecret,
        scopes: &[String],
    ) -> Result<StoredToken> {
        let captured = Arc::new(Mutex::new(None));
        let auth = InstalledFlowAuthenticator::builder(
            secret.clone(),
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(CapturedToken {
            slot: captured.clone(),
        }))
        .build()
        .await
        .map_err(|e| Error::auth(format!("could not start authorization flow: {}", e)))?;

        let scope_refs: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
        let access = auth
            .token(&scope_refs)
            .await
            .map_err(|e| Error::auth(e.to_string()))?;

        let info = captured.lock().ok().and_then(|mut slot| slot.take());
        let token = match info {
            Some(info) => stored_from_info(info, scopes),
            None => {
                // Storage was bypassed, so there is no refresh token to keep
                let mut token = StoredToken::new(access.token().unwrap_or_default())
                    .with_scopes(scopes.to_vec());
                token.expires_at = access.expiration_time().and_then(to_utc);
                token
            }
        };

        if token.access_token.is_empty() {
            return Err(Error::auth("authorization flow returned no access token"));
        }
        Ok(token)
    }
}

// yup-oauth2 hands the full token (refresh token included) to its storage;
// keep it in memory so it can be written in our own cache format.
struct CapturedToken {
    slot: Arc<Mutex<Option<TokenInfo>>>,
}

#[async_trait]
impl TokenStorage for CapturedToken {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(token);
        }
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        None
    }
}

fn to_utc(t: time::OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.unix_timestamp(), t.nanosecond())
}

fn stored_from_info(info: TokenInfo, scopes: &[String]) -> StoredToken {
    StoredToken {
        access_token: info.access_token.unwrap_or_default(),
        refresh_token: info.refresh_token,
        expires_at: info.expires_at.and_then(to_utc),
        scopes: scopes.to_vec(),
    }
}

async fn load_client_secret(path: &Path) -> Result<ApplicationSecret> {
    if !path.exists() {
        return Err(Error::CredentialFileNotFound(path.to_path_buf()));
    }
    yup_oauth2::read_application_secret(path).await.map_err(|e| {
        Error::auth(format!(
            "could not read OAuth client file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Produces a bearer token for the Gmail API, reusing the cached one when it
/// is still good.
pub struct CredentialManager<F: OAuthFlow> {
    flow: F,
    scopes: Vec<String>,
}

impl<F: OAuthFlow> CredentialManager<F> {
    pub fn new(flow: F) -> Self {
        Self {
            flow,
            scopes: vec![GMAIL_SEND_SCOPE.to_string()],
        }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub async fn authorized_client(&self, config: &Configuration) -> Result<AuthorizedClient> {
        let token = self.authorized_token(config).await?;
        Ok(AuthorizedClient::new(token.access_token))
    }

    /// Load, refresh or request a token and write it back to the cache.
    pub async fn authorized_token(&self, config: &Configuration) -> Result<StoredToken> {
        let cached = StoredToken::load(&config.token_cache);

        let token = match cached {
            Some(token) if token.is_valid() => {
                tracing::debug!("Using cached access token");
                token
            }
            Some(token) if token.is_expired() && token.refresh_token.is_some() => {
                tracing::info!("Cached access token expired, refreshing");
                let secret = load_client_secret(&config.credential_file).await?;
                let refresh_token = token.refresh_token.as_deref().unwrap_or_default();
                let mut refreshed = self.flow.refresh_token(&secret, refresh_token).await?;

                // Google omits the refresh token from refresh responses
                if refreshed.refresh_token.is_none() {
                    refreshed.refresh_token = token.refresh_token.clone();
                }
                if refreshed.scopes.is_empty() {
                    refreshed.scopes = token.scopes.clone();
                }
                refreshed
            }
            _ => {
                tracing::info!("No usable cached token, starting authorization flow");
                let secret = load_client_secret(&config.credential_file).await?;
                self.flow.exchange_auth_code(&secret, &self.scopes).await?
            }
        };

        token.save(&config.token_cache)?;
        Ok(token)
    }
}
