use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client as ReqwestClient, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::streaming::SseEventStream;
use crate::domain::errors::ApiError;
use crate::domain::models::{
    ApiConfig, Bet, BettorProfile, Credential, Nudge, NudgeStatus, PlaceBetRequest,
    ResolveBetResponse, Task,
};
use crate::domain::ports::{BetBackend, NudgeBackend, PushStream};
use crate::infrastructure::logging::SecretScrubber;

/// Configuration for the backend HTTP client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for all action endpoints
    pub base_url: String,

    /// Request timeout in seconds for request/response calls
    pub timeout_secs: u64,

    /// Path of the push subscription endpoint
    pub stream_path: String,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        ApiConfig::default().into()
    }
}

impl From<ApiConfig> for ApiClientConfig {
    fn from(config: ApiConfig) -> Self {
        Self {
            base_url: config.base_url,
            timeout_secs: config.timeout_secs,
            stream_path: config.stream_path,
        }
    }
}

/// HTTP client for the NudgeEngine, MicroBet and TaskManager backends
///
/// All request/response endpoints are action-style `POST {base}/<Concept>/<action>`
/// calls with a JSON body carrying the credential as `accessToken`. Failures
/// are reported as `{"error": "..."}`, sometimes with a 200 status.
pub struct ApiClient {
    http_client: ReqwestClient,
    /// Separate client without a total timeout for the long-lived stream
    stream_client: ReqwestClient,
    base_url: String,
    stream_path: String,
}

impl ApiClient {
    /// Create a new backend client
    ///
    /// # Example
    /// ```no_run
    /// use nudgebet::infrastructure::api::{ApiClient, ApiClientConfig};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ApiClient::new(ApiClientConfig::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiError> {
        info!(
            "Initializing backend client: base_url={}, timeout={}s",
            config.base_url, config.timeout_secs
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(config.timeout_secs))
            .tcp_nodelay(true)
            .build()?;

        let stream_client = ReqwestClient::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            http_client,
            stream_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            stream_path: config.stream_path,
        })
    }

    /// List the user's tasks (used to populate the task directory)
    #[instrument(skip_all)]
    pub async fn fetch_tasks(&self, credential: &Credential) -> Result<Vec<Task>, ApiError> {
        let listing: Listing<Task> = self
            .post("/TaskManager/getTasks", with_token(credential, json!({})))
            .await?;
        Ok(listing.into_items())
    }

    async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let response = self.http_client.post(&url).json(&body).send().await?;
        let value = Self::handle_response(response).await?;

        Ok(serde_json::from_value(value)?)
    }

    /// Check status and surface backend `error` fields as typed errors
    async fn handle_response(response: Response) -> Result<Value, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(
                "API error ({}): {}",
                status,
                SecretScrubber::global().scrub(&text)
            );
            return Err(ApiError::from_status(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(json!({}));
        }

        let value: Value = serde_json::from_str(&text)?;
        if let Some(error) = value.get("error") {
            let message = error.as_str().map_or_else(|| error.to_string(), str::to_string);
            return Err(ApiError::from_backend_message(message));
        }

        Ok(value)
    }
}

/// List responses come either bare or wrapped in a named field.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "bets", alias = "nudges", alias = "tasks")]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { items } => items,
        }
    }
}

#[derive(Deserialize)]
struct PlacedBet {
    bet: String,
}

/// A single bet comes back bare or wrapped as `{"bet": ...}`; `{}` means none.
#[derive(Deserialize)]
#[serde(untagged)]
enum SingleBet {
    // Must stay first: `Wrapped` also accepts any object without a `bet` field
    Bare(Bet),
    Wrapped {
        #[serde(default)]
        bet: Option<Bet>,
    },
}

impl SingleBet {
    fn into_bet(self) -> Option<Bet> {
        match self {
            Self::Bare(bet) => Some(bet),
            Self::Wrapped { bet } => bet,
        }
    }
}

fn with_token(credential: &Credential, mut body: Value) -> Value {
    if let Some(map) = body.as_object_mut() {
        map.insert("accessToken".to_string(), json!(credential.expose()));
    }
    body
}

#[async_trait]
impl NudgeBackend for ApiClient {
    async fn open_stream(&self, credential: &Credential) -> Result<PushStream, ApiError> {
        let url = format!("{}{}", self.base_url, self.stream_path);
        debug!("GET {} (event stream)", url);

        let response = self
            .stream_client
            .get(&url)
            .query(&[("accessToken", credential.expose())])
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "stream subscription rejected ({}): {}",
                status,
                SecretScrubber::global().scrub(&body)
            );
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        Ok(SseEventStream::new(response.bytes_stream()).boxed())
    }

    #[instrument(skip_all)]
    async fn ready_nudges(&self, credential: &Credential) -> Result<Vec<Nudge>, ApiError> {
        let listing: Listing<Nudge> = self
            .post("/NudgeEngine/getReadyNudges", with_token(credential, json!({})))
            .await?;
        Ok(listing.into_items())
    }

    #[instrument(skip(self, credential))]
    async fn user_nudges(
        &self,
        credential: &Credential,
        status: Option<NudgeStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<Nudge>, ApiError> {
        let body = with_token(credential, json!({ "status": status, "limit": limit }));
        let listing: Listing<Nudge> = self.post("/NudgeEngine/getUserNudges", body).await?;
        Ok(listing.into_items())
    }
}

#[async_trait]
impl BetBackend for ApiClient {
    #[instrument(skip(self, credential))]
    async fn resolve_bet(
        &self,
        credential: &Credential,
        task_id: &str,
        completion_time: DateTime<Utc>,
    ) -> Result<ResolveBetResponse, ApiError> {
        let body = with_token(
            credential,
            json!({ "task": task_id, "completionTime": completion_time }),
        );
        self.post("/MicroBet/resolveBet", body).await
    }

    #[instrument(skip(self, credential))]
    async fn resolve_expired_bet(
        &self,
        credential: &Credential,
        task_id: &str,
    ) -> Result<ResolveBetResponse, ApiError> {
        let body = with_token(credential, json!({ "task": task_id }));
        self.post("/MicroBet/resolveExpiredBet", body).await
    }

    async fn expired_bets(&self, credential: &Credential) -> Result<Vec<Bet>, ApiError> {
        let listing: Listing<Bet> = self
            .post("/MicroBet/getExpiredBets", with_token(credential, json!({})))
            .await?;
        Ok(listing.into_items())
    }

    async fn active_bets(&self, credential: &Credential) -> Result<Vec<Bet>, ApiError> {
        let listing: Listing<Bet> = self
            .post("/MicroBet/getActiveBets", with_token(credential, json!({})))
            .await?;
        Ok(listing.into_items())
    }

    async fn profile(&self, credential: &Credential) -> Result<BettorProfile, ApiError> {
        self.post("/MicroBet/getUserProfile", with_token(credential, json!({})))
            .await
    }

    #[instrument(skip_all)]
    async fn initialize_bettor(&self, credential: &Credential) -> Result<(), ApiError> {
        let _: Value = self
            .post("/MicroBet/initializeBettor", with_token(credential, json!({})))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, credential))]
    async fn bet(&self, credential: &Credential, task_id: &str) -> Result<Option<Bet>, ApiError> {
        let body = with_token(credential, json!({ "task": task_id }));
        match self.post::<SingleBet>("/MicroBet/getBet", body).await {
            Ok(single) => Ok(single.into_bet()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, credential))]
    async fn recent_activity(
        &self,
        credential: &Credential,
        limit: u32,
    ) -> Result<Vec<Bet>, ApiError> {
        let body = with_token(credential, json!({ "limit": limit }));
        let listing: Listing<Bet> = self.post("/MicroBet/getRecentActivity", body).await?;
        Ok(listing.into_items())
    }

    #[instrument(skip(self, credential), fields(task = %request.task, wager = request.wager))]
    async fn place_bet(
        &self,
        credential: &Credential,
        request: &PlaceBetRequest,
    ) -> Result<String, ApiError> {
        let body = with_token(credential, serde_json::to_value(request)?);
        let placed: PlacedBet = self.post("/MicroBet/placeBet", body).await?;
        Ok(placed.bet)
    }

    #[instrument(skip(self, credential))]
    async fn cancel_bet(&self, credential: &Credential, task_id: &str) -> Result<(), ApiError> {
        let body = with_token(credential, json!({ "task": task_id }));
        let _: Value = self.post("/MicroBet/cancelBet", body).await?;
        Ok(())
    }
}
