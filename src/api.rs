// HTTP client for the travel search backend
// Stateless: every call is exactly one request, no retries and no caching

use async_trait::async_trait;
use config::{Config, Environment};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use crate::types::{ErrorResponse, HistoryEntry, SearchRequest, SearchResponse};

pub const SEARCH_PATH: &str = "/api/v1/travel/search";
pub const HISTORY_PATH: &str = "/api/v1/travel/history";
pub const HEALTH_PATH: &str = "/health";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

// Environment variables are read as TRAVEL_BASE_URL, TRAVEL_TIMEOUT_MS
pub const ENV_PREFIX: &str = "TRAVEL";

/// Failure of a backend call.
///
/// Callers treat every variant the same way; the split only exists so the
/// message is useful when displayed.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {status_code} - {message}")]
    ApiResponse { status_code: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Init(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    // None leaves the transport's own behaviour in place
    pub timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Loads the configuration from `TRAVEL_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn load() -> Result<Self, ClientError> {
        Self::from_environment(Self::environment())
    }

    pub(crate) fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    pub(crate) fn from_environment(environment: Environment) -> Result<Self, ClientError> {
        let settings = Config::builder()
            .add_source(environment)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let config: ClientConfig = settings
            .try_deserialize()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ClientError::Config(format!("invalid base_url {:?}: {}", self.base_url, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ClientError::Config(format!(
                "unsupported base_url scheme: {}",
                other
            ))),
        }
    }
}

// Operations the search store needs from the backend
#[async_trait]
pub trait TravelApi: Send + Sync + 'static {
    async fn search_travel(&self, request: SearchRequest) -> Result<SearchResponse, ApiError>;

    async fn get_search_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, ApiError>;

    // Liveness probe, the payload is not validated
    async fn check_health(&self) -> Result<Value, ApiError>;
}

pub struct HttpTravelApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTravelApi {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Init(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::load()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // Non-2xx statuses become ApiResponse, carrying the backend's message when it sent one
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|b| b.best_message())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown status").to_string());

            return Err(ApiError::ApiResponse {
                status_code: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn post_search(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError> {
        let response = self
            .client
            .post(self.endpoint(SEARCH_PATH))
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        let response = self
            .client
            .get(self.endpoint(HISTORY_PATH))
            .header(ACCEPT, "application/json")
            .query(&[("userId", user_id)])
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_health(&self) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(self.endpoint(HEALTH_PATH))
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl TravelApi for HttpTravelApi {
    async fn search_travel(&self, request: SearchRequest) -> Result<SearchResponse, ApiError> {
        match self.post_search(&request).await {
            Ok(response) => {
                debug!(
                    destination = %request.destination,
                    search_id = response.search_id,
                    "travel search completed"
                );
                Ok(response)
            }
            Err(e) => {
                error!(error = %e, destination = %request.destination, "Failed to search travel");
                Err(e)
            }
        }
    }

    async fn get_search_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        match self.get_history(user_id).await {
            Ok(history) => {
                debug!(user_id, entries = history.len(), "search history loaded");
                Ok(history)
            }
            Err(e) => {
                error!(error = %e, user_id, "Failed to get search history");
                Err(e)
            }
        }
    }

    async fn check_health(&self) -> Result<Value, ApiError> {
        self.get_health().await.map_err(|e| {
            error!(error = %e, "Health check failed");
            e
        })
    }
}

// In-process stand-in for the backend, used by the store tests
#[cfg(test)]
pub mod mock_server {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;

    #[derive(Debug, Clone)]
    pub enum Failure {
        Status(u16, String),
        // An error whose message is empty
        Blank,
    }

    impl Failure {
        fn to_error(&self) -> ApiError {
            match self {
                Failure::Status(status_code, message) => ApiError::ApiResponse {
                    status_code: *status_code,
                    message: message.clone(),
                },
                Failure::Blank => ApiError::Other(String::new()),
            }
        }
    }

    pub struct MockServer {
        request_count: AtomicUsize,
        fail_next_requests: AtomicUsize,
        failure: Mutex<Failure>,
        search_responses: Mutex<HashMap<String, SearchResponse>>,
        histories: Mutex<HashMap<String, Vec<HistoryEntry>>>,
        delays_ms: Mutex<HashMap<String, u64>>,
        health: Mutex<Value>,
    }

    impl MockServer {
        pub fn new() -> Self {
            Self {
                request_count: AtomicUsize::new(0),
                fail_next_requests: AtomicUsize::new(0),
                failure: Mutex::new(Failure::Status(500, "Internal Server Error".to_string())),
                search_responses: Mutex::new(HashMap::new()),
                histories: Mutex::new(HashMap::new()),
                delays_ms: Mutex::new(HashMap::new()),
                health: Mutex::new(serde_json::json!({
                    "status": "healthy",
                    "services": {"database": "healthy"},
                    "time": "2025-01-01T00:00:00Z"
                })),
            }
        }

        pub fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }

        pub fn fail_next_requests(&self, count: usize) {
            self.fail_next_requests.store(count, Ordering::SeqCst);
        }

        pub async fn set_failure(&self, failure: Failure) {
            *self.failure.lock().await = failure;
        }

        pub async fn add_search_response(&self, destination: &str, response: SearchResponse) {
            let mut responses = self.search_responses.lock().await;
            responses.insert(destination.to_string(), response);
        }

        pub async fn add_history(&self, user_id: &str, history: Vec<HistoryEntry>) {
            let mut histories = self.histories.lock().await;
            histories.insert(user_id.to_string(), history);
        }

        // Delay applied to searches for `destination` or history loads for a user id
        pub async fn set_delay(&self, key: &str, delay_ms: u64) {
            let mut delays = self.delays_ms.lock().await;
            delays.insert(key.to_string(), delay_ms);
        }

        async fn simulate(&self, key: &str) -> Result<(), ApiError> {
            self.request_count.fetch_add(1, Ordering::SeqCst);

            let delay = self.delays_ms.lock().await.get(key).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let remaining = self.fail_next_requests.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_next_requests
                    .store(remaining - 1, Ordering::SeqCst);
                return Err(self.failure.lock().await.to_error());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TravelApi for MockServer {
        async fn search_travel(
            &self,
            request: SearchRequest,
        ) -> Result<SearchResponse, ApiError> {
            self.simulate(&request.destination).await?;

            let responses = self.search_responses.lock().await;
            if let Some(response) = responses.get(&request.destination) {
                return Ok(response.clone());
            }

            Ok(SearchResponse {
                search_id: rand::random::<u32>() as i64,
                destination: request.destination.clone(),
                summary: format!("Trip to {}", request.destination),
                recommendations: vec![],
                weather: None,
                flights: None,
                estimated_cost: request.budget.unwrap_or_default(),
                created_at: "2025-01-01T00:00:00Z".to_string(),
            })
        }

        async fn get_search_history(
            &self,
            user_id: &str,
        ) -> Result<Vec<HistoryEntry>, ApiError> {
            self.simulate(user_id).await?;
            let histories = self.histories.lock().await;
            Ok(histories.get(user_id).cloned().unwrap_or_default())
        }

        async fn check_health(&self) -> Result<Value, ApiError> {
            self.simulate(HEALTH_PATH).await?;
            Ok(self.health.lock().await.clone())
        }
    }

    pub fn header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    // Reads one request from `socket`, answers it and returns the raw request text
    async fn answer(mut socket: TcpStream, status_line: &str, body: &str) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = header_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .map(|value| value.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;

        String::from_utf8_lossy(&buf).to_string()
    }

    // Answers one connection per entry, in order, then resolves to the raw requests
    pub async fn serve_sequence(
        responses: Vec<(&'static str, String)>,
    ) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status_line, body) in responses {
                let (socket, _) = listener.accept().await.unwrap();
                requests.push(answer(socket, status_line, &body).await);
            }
            requests
        });

        (format!("http://{}", addr), handle)
    }

    pub async fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
        let (base_url, requests) = serve_sequence(vec![(status_line, body)]).await;
        let handle = tokio::spawn(async move { requests.await.unwrap().remove(0) });
        (base_url, handle)
    }
}
