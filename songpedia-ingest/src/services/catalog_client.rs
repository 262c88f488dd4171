//! Music catalog search client
//!
//! The crawler only needs one operation: a page of track results for a
//! keyword query. [`SpotifyCatalogClient`] implements it against the Spotify
//! Web API using the client-credentials flow.

use crate::models::CatalogRecord;
use crate::utils::{retry_with_backoff, RetryPolicy};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use songpedia_common::config::{get_user_agent, CatalogConfig, CatalogCredentials};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Access token rejected")]
    TokenRejected,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl CatalogError {
    /// Network failures, 429 and 5xx are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Network(_)
            | CatalogError::TokenRejected
            | CatalogError::RateLimited { .. } => true,
            CatalogError::Api(status, _) => *status >= 500,
            CatalogError::Auth(_) | CatalogError::Parse(_) => false,
        }
    }

    /// Wait requested by the service before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CatalogError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// One page of search results
///
/// `slots` counts every item the service returned, including null slots that
/// carry no record. Pagination decides on `slots`, not on `records.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackPage {
    pub records: Vec<CatalogRecord>,
    pub slots: usize,
}

impl TrackPage {
    pub fn from_slots(items: Vec<Option<CatalogRecord>>) -> Self {
        let slots = items.len();
        Self {
            records: items.into_iter().flatten().collect(),
            slots,
        }
    }
}

/// Paginated track search
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// One page of track results for `query`
    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackItems,
}

#[derive(Debug, Deserialize)]
struct TrackItems {
    #[serde(default)]
    items: Vec<Option<CatalogRecord>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry_secs")]
    expires_in: u64,
}

fn default_expiry_secs() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Spotify Web API catalog client
pub struct SpotifyCatalogClient {
    client: Client,
    base_url: String,
    token_url: String,
    credentials: CatalogCredentials,
    token: Mutex<Option<AccessToken>>,
    retry_policy: RetryPolicy,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl SpotifyCatalogClient {
    pub fn new(
        config: &CatalogConfig,
        credentials: CatalogCredentials,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(get_user_agent())
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            credentials,
            token: Mutex::new(None),
            retry_policy: RetryPolicy::new(config.max_retries),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    async fn access_token(&self) -> Result<String, CatalogError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Requesting catalog access token");
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                CatalogError::Api(status.as_u16(), body)
            } else {
                CatalogError::Auth(format!("token endpoint returned {}: {}", status, body))
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        // Refresh one minute before expiry
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        *guard = Some(AccessToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn search_once(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, CatalogError> {
        self.rate_limiter.until_ready().await;

        let token = self.access_token().await?;
        let url = format!("{}/search", self.base_url);
        let limit_param = limit.to_string();
        let offset_param = offset.to_string();

        tracing::debug!(query = %query, limit, offset, "Querying catalog search");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", limit_param.as_str()),
                ("offset", offset_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            // Token revoked or expired early; next attempt fetches a new one
            self.invalidate_token().await;
            return Err(CatalogError::TokenRejected);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(CatalogError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api(status.as_u16(), error_text));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        // The service occasionally returns null slots in a page
        Ok(TrackPage::from_slots(body.tracks.items))
    }
}

#[async_trait]
impl CatalogService for SpotifyCatalogClient {
    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, CatalogError> {
        retry_with_backoff(
            "catalog search",
            self.retry_policy,
            |err: &CatalogError| {
                err.is_transient()
                    .then(|| err.retry_after().unwrap_or(Duration::ZERO))
            },
            || self.search_once(query, limit, offset),
        )
        .await
    }
}
