use crate::errors::{ApiError, HttpError, Result};
use log::{debug, error, info, trace, warn};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;
use vast_core::{
    ActionResponse, CreateInstanceRequest, DefJobRequest, InstanceState, InstanceUpdate,
    InvoiceSummary, ListMachineRequest, PriceChange, SearchRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://console.vast.ai/api/v0";
pub const DEFAULT_RETRY: u32 = 3;

/// Delay unit between attempts after a 429; attempt `n` waits `n` units.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_millis(150);

/// Trait for providing configuration to the API client
/// This allows the main application to implement config without circular dependencies
pub trait ApiConfig {
    type Error;

    /// API key used for authentication. Read-only endpoints work without one.
    fn get_api_key(&self) -> std::result::Result<Option<String>, Self::Error>;

    /// Get the base URL for the API (optional, defaults to official API)
    fn get_base_url(&self) -> std::result::Result<Option<String>, Self::Error> {
        Ok(None)
    }

    /// Attempts per request when the server rate limits us
    fn get_retry(&self) -> std::result::Result<Option<u32>, Self::Error> {
        Ok(None)
    }
}

fn masked(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    }
}

/// HTTP client for the Vast.ai REST API
#[derive(Debug, Clone)]
pub struct VastApiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    retry: u32,
    backoff: Duration,
}

impl VastApiClient {
    /// Create a new API client
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        debug!("Creating VastApiClient");
        match api_key {
            Some(ref key) => debug!("  API Key: {}", masked(key)),
            None => debug!("  API Key: <none>"),
        }
        debug!("  Base URL: {}", base_url);

        Self {
            client: Client::new(),
            api_key,
            base_url,
            retry: DEFAULT_RETRY,
            backoff: RATE_LIMIT_BACKOFF,
        }
    }

    /// Create API client from environment variable
    pub fn from_env() -> Result<Self> {
        debug!("Creating VastApiClient from environment variable");
        let api_key = std::env::var("VAST_API_KEY").map_err(|_| {
            error!("VAST_API_KEY environment variable not set");
            ApiError::Http(HttpError::Config(
                "VAST_API_KEY environment variable not set".to_string(),
            ))
        })?;

        Ok(Self::new(Some(api_key), None))
    }

    /// Create API client from any configuration implementing ApiConfig trait
    pub fn from_config<C>(config: &C) -> std::result::Result<Self, C::Error>
    where
        C: ApiConfig,
    {
        debug!("Creating VastApiClient from config");
        let api_key = config.get_api_key()?;
        let base_url = config.get_base_url()?;

        if let Some(ref url) = base_url {
            debug!("Got custom base URL from config: {}", url);
        } else {
            debug!("Using default base URL");
        }

        let mut client = Self::new(api_key, base_url);
        if let Some(retry) = config.get_retry()? {
            client.retry = retry;
        }
        Ok(client)
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the endpoint URL for `subpath`.
    ///
    /// String arguments are sent as-is, everything else as JSON. The API key,
    /// when present, is appended as the last query argument.
    pub fn api_url(&self, subpath: &str, query_args: &[(&str, Value)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url.trim_end_matches('/'), subpath))?;

        if !query_args.is_empty() || self.api_key.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query_args {
                match value {
                    Value::String(s) => pairs.append_pair(name, s),
                    other => pairs.append_pair(name, &other.to_string()),
                };
            }
            if let Some(ref key) = self.api_key {
                pairs.append_pair("api_key", key);
            }
        }

        Ok(url)
    }

    /// Send a request, retrying while the server answers 429
    async fn send(
        &self,
        method: Method,
        subpath: &str,
        query_args: &[(&str, Value)],
        body: Option<&Value>,
    ) -> Result<Response> {
        let url = self.api_url(subpath, query_args)?;
        let attempts = self.retry.max(1);
        let mut attempt = 1;

        debug!("HTTP {} request to: {}{}", method, self.base_url, subpath);
        if let Some(body) = body {
            trace!(
                "Request body: {}",
                serde_json::to_string_pretty(body).unwrap_or_else(|_| "Invalid JSON".to_string())
            );
        }

        loop {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| {
                error!("{} request failed: {:?}", method, e);
                HttpError::Request(e)
            })?;

            debug!("Response status: {}", response.status());

            if response.status() == StatusCode::TOO_MANY_REQUESTS && attempt < attempts {
                let delay = self.backoff * attempt;
                warn!(
                    "Rate limited on {} (attempt {}/{}), retrying in {:?}",
                    subpath, attempt, attempts, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return self.handle_response(response).await;
        }
    }

    async fn get(&self, subpath: &str, query_args: &[(&str, Value)]) -> Result<Response> {
        self.send(Method::GET, subpath, query_args, None).await
    }

    async fn put(&self, subpath: &str, body: &Value) -> Result<Response> {
        self.send(Method::PUT, subpath, &[], Some(body)).await
    }

    async fn delete(&self, subpath: &str, body: Option<&Value>) -> Result<Response> {
        self.send(Method::DELETE, subpath, &[], body).await
    }

    /// Handle HTTP response and convert errors
    async fn handle_response(&self, response: Response) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        error!("Request failed with status: {}", status);
        debug!("Error response body: {}", error_text);

        let api_error = match status {
            StatusCode::UNAUTHORIZED => HttpError::AuthenticationFailed,
            StatusCode::FORBIDDEN => HttpError::InvalidApiKey,
            StatusCode::TOO_MANY_REQUESTS => HttpError::RateLimited,
            StatusCode::SERVICE_UNAVAILABLE => HttpError::ServiceUnavailable,
            StatusCode::REQUEST_TIMEOUT => HttpError::Timeout,
            _ => HttpError::HttpError {
                status: status.as_u16(),
                message: error_message(&error_text),
            },
        };

        Err(ApiError::Http(api_error))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        Ok(response.json().await.map_err(HttpError::Request)?)
    }

    /// Search rentable offers
    pub async fn search_offers(&self, request: &SearchRequest) -> Result<Vec<Value>> {
        debug!("Searching offers");
        let q = serde_json::to_value(request)?;
        let response = self.get("/bundles", &[("q", q)]).await?;
        let offers = take_rows(Self::json(response).await?, "offers")?;

        info!("Successfully fetched {} offers", offers.len());
        Ok(offers)
    }

    /// Instances rented by the current user
    pub async fn show_instances(&self) -> Result<Vec<Value>> {
        debug!("Fetching instances");
        let response = self.get("/instances", &owner_me()).await?;
        let instances = take_rows(Self::json(response).await?, "instances")?;

        info!("Successfully fetched {} instances", instances.len());
        Ok(instances)
    }

    /// Machines hosted by the current user
    pub async fn show_machines(&self) -> Result<Vec<Value>> {
        debug!("Fetching machines");
        let response = self.get("/machines", &owner_me()).await?;
        let machines = take_rows(Self::json(response).await?, "machines")?;

        info!("Successfully fetched {} machines", machines.len());
        Ok(machines)
    }

    pub async fn show_invoices(&self) -> Result<InvoiceSummary> {
        debug!("Fetching invoices");
        let response = self.get("/users/me/invoices", &owner_me()).await?;
        let summary: InvoiceSummary = Self::json(response).await?;

        info!("Successfully fetched {} invoices", summary.invoices.len());
        Ok(summary)
    }

    /// Current user's account details, without the API key
    pub async fn show_user(&self) -> Result<Value> {
        debug!("Fetching user information");
        let response = self.get("/users/current", &owner_me()).await?;
        let mut user: Value = Self::json(response).await?;

        if let Some(fields) = user.as_object_mut() {
            fields.remove("api_key");
        }
        Ok(user)
    }

    /// Rent offer `id` as a new instance
    pub async fn create_instance(
        &self,
        id: u64,
        request: &CreateInstanceRequest,
    ) -> Result<ActionResponse> {
        debug!("Creating instance from offer {}", id);
        let body = serde_json::to_value(request)?;
        let response = self.put(&format!("/asks/{}/", id), &body).await?;
        let result: ActionResponse = Self::json(response).await?;

        info!("Create instance on offer {}: success={}", id, result.success);
        Ok(result)
    }

    pub async fn start_instance(&self, id: u64) -> Result<ActionResponse> {
        self.update_instance(
            id,
            InstanceUpdate::State {
                state: InstanceState::Running,
            },
        )
        .await
    }

    pub async fn stop_instance(&self, id: u64) -> Result<ActionResponse> {
        self.update_instance(
            id,
            InstanceUpdate::State {
                state: InstanceState::Stopped,
            },
        )
        .await
    }

    pub async fn label_instance(&self, id: u64, label: &str) -> Result<ActionResponse> {
        self.update_instance(
            id,
            InstanceUpdate::Label {
                label: label.to_string(),
            },
        )
        .await
    }

    async fn update_instance(&self, id: u64, update: InstanceUpdate) -> Result<ActionResponse> {
        debug!("Updating instance {}: {:?}", id, update);
        let body = serde_json::to_value(&update)?;
        let response = self.put(&format!("/instances/{}/", id), &body).await?;
        Self::json(response).await
    }

    pub async fn destroy_instance(&self, id: u64) -> Result<ActionResponse> {
        debug!("Destroying instance {}", id);
        let response = self
            .delete(&format!("/instances/{}/", id), Some(&Value::Object(Default::default())))
            .await?;
        let result: ActionResponse = Self::json(response).await?;

        info!("Destroy instance {}: success={}", id, result.success);
        Ok(result)
    }

    /// Change the bid of an interruptible instance. `None` picks a winning bid.
    pub async fn change_bid(&self, id: u64, price: Option<f64>) -> Result<ActionResponse> {
        debug!("Changing bid of instance {} to {:?}", id, price);
        let body = serde_json::to_value(PriceChange::new(price))?;
        let response = self
            .put(&format!("/instances/bid_price/{}/", id), &body)
            .await?;
        Self::json(response).await
    }

    /// Offer a hosted machine for rent
    pub async fn list_machine(&self, request: &ListMachineRequest) -> Result<ActionResponse> {
        debug!("Listing machine {}", request.machine);
        let body = serde_json::to_value(request)?;
        let response = self.put("/machines/create_asks/", &body).await?;
        Self::json(response).await
    }

    pub async fn unlist_machine(&self, id: u64) -> Result<ActionResponse> {
        debug!("Unlisting machine {}", id);
        let response = self.delete(&format!("/machines/{}/asks/", id), None).await?;
        Self::json(response).await
    }

    /// Create the default (background) job on a hosted machine
    pub async fn set_defjob(&self, request: &DefJobRequest) -> Result<ActionResponse> {
        debug!("Setting default job on machine {}", request.machine);
        let body = serde_json::to_value(request)?;
        let response = self.put("/machines/create_bids/", &body).await?;
        Self::json(response).await
    }

    pub async fn remove_defjob(&self, id: u64) -> Result<ActionResponse> {
        debug!("Removing default job from machine {}", id);
        let response = self
            .delete(&format!("/machines/{}/defjob/", id), None)
            .await?;
        Self::json(response).await
    }

    pub async fn set_min_bid(&self, id: u64, price: Option<f64>) -> Result<ActionResponse> {
        debug!("Setting min bid of machine {} to {:?}", id, price);
        let body = serde_json::to_value(PriceChange::new(price))?;
        let response = self.put(&format!("/machines/{}/minbid/", id), &body).await?;
        Self::json(response).await
    }
}

fn owner_me() -> [(&'static str, Value); 1] {
    [("owner", Value::String("me".to_string()))]
}

fn take_rows(mut body: Value, key: &str) -> Result<Vec<Value>> {
    match body.get_mut(key).map(Value::take) {
        Some(Value::Array(rows)) => Ok(rows),
        _ => Err(ApiError::Http(HttpError::HttpError {
            status: 200,
            message: format!("response has no '{}' list", key),
        })),
    }
}

/// The `msg` field of a JSON error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("msg").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "(no detail message supplied)".to_string()
            } else {
                body.to_string()
            }
        })
}
