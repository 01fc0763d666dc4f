//! IAM bearer token cache.
//!
//! watsonx.ai calls are authenticated with a short-lived bearer token minted
//! by IBM Cloud IAM from the long-lived API key. [`TokenCache`] keeps one
//! token, hands out clones of it while it is still inside its validity window,
//! and exchanges the API key for a new one otherwise.
//!
//! The slot is guarded by an async mutex that is held across the exchange, so
//! concurrent callers that find the token stale wait for a single refresh
//! instead of each minting their own.

use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A bearer token together with the instant after which it must not be handed out.
///
/// `expires_at` already has the refresh margin subtracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct TokenCache {
    client: reqwest::Client,
    iam_url: String,
    api_key: String,
    refresh_margin: chrono::Duration,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<Credential>>,
}

impl TokenCache {
    pub fn new(
        client: reqwest::Client,
        iam_url: impl Into<String>,
        api_key: impl Into<String>,
        refresh_margin: Duration,
        timeout: Duration,
    ) -> Self {
        let margin_secs = i64::try_from(refresh_margin.as_secs()).unwrap_or(i64::MAX / 1000);
        Self {
            client,
            iam_url: iam_url.into(),
            api_key: api_key.into(),
            refresh_margin: chrono::Duration::seconds(margin_secs),
            timeout,
            clock: Arc::new(SystemClock),
            slot: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Return a token that is valid right now, minting a new one if needed.
    ///
    /// # Errors
    /// Returns `GatewayError::Auth` when IAM is unreachable, answers with a
    /// non-success status, or sends a body without a token.
    pub async fn get_token(&self) -> Result<Credential> {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();

        if let Some(cached) = slot.as_ref().filter(|c| c.is_valid_at(now)) {
            tracing::debug!("Using cached IAM token");
            return Ok(cached.clone());
        }

        let fresh = self.exchange(now).await?;
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<Credential> {
        tracing::debug!(url = %self.iam_url, "Fetching new IAM token");

        let response = self
            .client
            .post(&self.iam_url)
            .header("Accept", "application/json")
            .form(&[("grant_type", APIKEY_GRANT_TYPE), ("apikey", self.api_key.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| GatewayError::auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %body, "IAM token exchange rejected");
            return Err(GatewayError::auth(format!(
                "IAM returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: IamTokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::auth(format!("Malformed IAM response: {e}")))?;

        let lifetime = chrono::Duration::seconds(parsed.expires_in) - self.refresh_margin;
        tracing::debug!(expires_in = parsed.expires_in, "IAM token fetched");

        Ok(Credential {
            token: parsed.access_token,
            expires_at: now + lifetime,
        })
    }
}
