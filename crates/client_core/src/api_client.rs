//! HTTP gateway to the planning backend with in-flight request deduplication.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Serialize;
use shared::{
    domain::{MechanicId, ScenarioId, TaskId, TeamName},
    error::ApiError,
    protocol::{
        AssignTaskRequest, Document, GenerateAssignmentsRequest, SimulatePriorityRequest,
        TeamTaskFilters,
    },
};
use thiserror::Error;
use tracing::{debug, warn};

/// A settled or in-flight response shared by every caller that issued the same request.
pub type PendingResponse = Shared<BoxFuture<'static, Result<Document, RequestError>>>;

#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("API Error: {status_text}")]
    Status {
        status: u16,
        status_text: String,
        message: Option<String>,
    },
    #[error("transport error: {0}")]
    Transport(#[source] Arc<reqwest::Error>),
    #[error("invalid response body: {0}")]
    Decode(#[source] Arc<serde_json::Error>),
    #[error("failed to encode request body: {0}")]
    Encode(#[source] Arc<serde_json::Error>),
    #[error("request task ended abnormally: {0}")]
    Aborted(String),
    #[error("failed to build http client: {0}")]
    Client(#[source] Arc<reqwest::Error>),
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Transport(error) if error.is_timeout())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    /// Already-serialized JSON body.
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post_json<T: Serialize>(body: &T) -> Result<Self, RequestError> {
        let body =
            serde_json::to_string(body).map_err(|e| RequestError::Encode(Arc::new(e)))?;
        Ok(Self {
            method: Method::Post,
            body: Some(body),
            headers: Vec::new(),
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(method: Method, url: &str, body: Option<&str>) -> Self {
        Self(format!("{method}-{url}-{}", body.unwrap_or_default()))
    }
}

struct PendingEntry {
    id: u64,
    response: PendingResponse,
}

type PendingMap = Arc<Mutex<HashMap<RequestKey, PendingEntry>>>;

pub struct ApiClient {
    http: Client,
    base_url: String,
    pending: PendingMap,
    next_request: AtomicU64,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RequestError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Client(Arc::new(e)))?;
        Ok(Self::with_http(http, base_url))
    }

    pub fn with_http(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_request: AtomicU64::new(1),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of distinct requests currently in flight.
    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }

    /// Issues `options.method` against `base_url + endpoint`, or joins an identical request that
    /// is already in flight.
    ///
    /// The network exchange runs on its own Tokio task, so dropping the returned future does not
    /// cancel it; the pending entry is always cleared when the exchange settles, before any
    /// caller observes the result. Must be called from within a Tokio runtime.
    pub fn request(&self, endpoint: &str, options: RequestOptions) -> PendingResponse {
        let url = format!("{}{}", self.base_url, endpoint);
        let key = RequestKey::new(options.method, &url, options.body.as_deref());

        let mut pending = lock_pending(&self.pending);
        if let Some(entry) = pending.get(&key) {
            debug!(method = %options.method, %url, "joining in-flight request");
            return entry.response.clone();
        }

        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        debug!(method = %options.method, %url, request_id = id, "issuing request");
        let task = tokio::spawn(exchange_and_release(
            self.http.clone(),
            url,
            options,
            Arc::clone(&self.pending),
            key.clone(),
            id,
        ));

        let release_on_abort = Arc::clone(&self.pending);
        let abort_key = key.clone();
        let response = async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    release(&release_on_abort, &abort_key, id);
                    Err(RequestError::Aborted(join_error.to_string()))
                }
            }
        }
        .boxed()
        .shared();

        pending.insert(
            key,
            PendingEntry {
                id,
                response: response.clone(),
            },
        );
        response
    }

    pub async fn get_scenarios(&self) -> Result<Document, RequestError> {
        self.request("/api/scenarios", RequestOptions::get()).await
    }

    pub async fn get_scenario_data(&self, scenario: &ScenarioId) -> Result<Document, RequestError> {
        self.request(&format!("/api/scenario/{scenario}"), RequestOptions::get())
            .await
    }

    pub async fn get_team_tasks(
        &self,
        team: &TeamName,
        filters: &TeamTaskFilters,
    ) -> Result<Document, RequestError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(filters.query_pairs())
            .finish();
        self.request(
            &format!("/api/team/{team}/tasks?{query}"),
            RequestOptions::get(),
        )
        .await
    }

    pub async fn generate_assignments(
        &self,
        team: &TeamName,
        body: &GenerateAssignmentsRequest,
    ) -> Result<Document, RequestError> {
        self.request(
            &format!("/api/team/{team}/generate_assignments"),
            RequestOptions::post_json(body)?,
        )
        .await
    }

    pub async fn assign_task(
        &self,
        task_id: &TaskId,
        mechanic_id: &MechanicId,
        scenario: &ScenarioId,
    ) -> Result<Document, RequestError> {
        let body = AssignTaskRequest {
            task_id: task_id.clone(),
            mechanic_id: mechanic_id.clone(),
            scenario: scenario.clone(),
        };
        self.request("/api/assign_task", RequestOptions::post_json(&body)?)
            .await
    }

    pub async fn get_late_parts_impact(
        &self,
        scenario: &ScenarioId,
    ) -> Result<Document, RequestError> {
        self.request(
            &format!("/api/late_parts_impact/{scenario}"),
            RequestOptions::get(),
        )
        .await
    }

    pub async fn simulate_priority(
        &self,
        body: &SimulatePriorityRequest,
    ) -> Result<Document, RequestError> {
        self.request("/api/simulate_priority", RequestOptions::post_json(body)?)
            .await
    }

    /// Download location for a scenario export. The caller navigates to it; nothing is fetched
    /// here and the pending map is not involved.
    pub fn export_scenario(&self, scenario: &ScenarioId) -> String {
        format!("{}/api/export/{scenario}", self.base_url)
    }
}

async fn exchange_and_release(
    http: Client,
    url: String,
    options: RequestOptions,
    pending: PendingMap,
    key: RequestKey,
    id: u64,
) -> Result<Document, RequestError> {
    let result = exchange(&http, &url, options).await;
    release(&pending, &key, id);
    if let Err(error) = &result {
        warn!(%url, %error, "request failed");
    }
    result
}

async fn exchange(
    http: &Client,
    url: &str,
    options: RequestOptions,
) -> Result<Document, RequestError> {
    let mut builder = http
        .request(options.method.to_reqwest(), url)
        .header(CONTENT_TYPE, "application/json");
    for (name, value) in &options.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = options.body {
        builder = builder.body(body);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| RequestError::Transport(Arc::new(e)))?;

    let status = response.status();
    if !status.is_success() {
        let status_text = status
            .canonical_reason()
            .unwrap_or("Unknown Status")
            .to_string();
        let message = response.json::<ApiError>().await.ok().map(|body| body.error);
        return Err(RequestError::Status {
            status: status.as_u16(),
            status_text,
            message,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RequestError::Transport(Arc::new(e)))?;
    if bytes.is_empty() {
        return Ok(Document::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| RequestError::Decode(Arc::new(e)))
}

/// Drops the pending entry for `key` if it still belongs to request `id`.
fn release(pending: &PendingMap, key: &RequestKey, id: u64) {
    let mut pending = lock_pending(pending);
    if pending.get(key).is_some_and(|entry| entry.id == id) {
        pending.remove(key);
    }
}

fn lock_pending(pending: &PendingMap) -> MutexGuard<'_, HashMap<RequestKey, PendingEntry>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/api_client_tests.rs"]
mod tests;
