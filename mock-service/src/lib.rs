//! In-memory stand-in for the pull request reviewer service.
mod store;

pub use store::{PrStatus, PullRequest, Statistics, Store, StoreError, User};

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use rand::Rng;
use revload_core::{CreatePullRequest, MergePullRequest, ReassignReviewer, SetIsActive, Team};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Knobs for degrading the service on purpose.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Added to every request.
    pub delay: Duration,
    /// Probability of answering 500 instead of handling the request.
    pub error_rate: f64,
    /// Requests beyond this rate are answered with 503.
    pub max_rps: Option<NonZeroU32>,
}

#[derive(Clone)]
struct AppState {
    store: Arc<RwLock<Store>>,
    config: MockConfig,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl AppState {
    async fn admit(&self, route: &'static str) -> Result<(), ApiError> {
        counter!("mock_service.requests", "route" => route).increment(1);
        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                return Err(ApiError::Overloaded);
            }
        }
        if rand::thread_rng().gen_bool(self.config.error_rate.clamp(0., 1.)) {
            debug!("Injected failure on {route}");
            return Err(ApiError::Injected);
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Store) -> T) -> T {
        f(&self.store.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        f(&mut self.store.write().unwrap_or_else(PoisonError::into_inner))
    }
}

enum ApiError {
    Store(StoreError),
    BadRequest(String),
    Overloaded,
    Injected,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        ApiError::BadRequest("invalid request body".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Store(err) => (err.status(), err.code(), err.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            ApiError::Overloaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "OVERLOADED",
                "too many requests".to_string(),
            ),
            ApiError::Injected => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "injected failure".to_string(),
            ),
        };
        let body = json!({ "error": { "code": code, "message": message } });
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

/// Parse an injected failure probability, rejecting anything outside `[0, 1]`.
pub fn parse_error_rate(raw: &str) -> anyhow::Result<f64> {
    let rate: f64 = raw.trim().parse()?;
    anyhow::ensure!(
        (0. ..=1.).contains(&rate),
        "error rate must be within [0, 1], got {raw}"
    );
    Ok(rate)
}

pub fn router(mut config: MockConfig) -> Router {
    if !config.error_rate.is_finite() {
        warn!("Ignoring non-finite error rate {}.", config.error_rate);
        config.error_rate = 0.;
    }
    let limiter = config
        .max_rps
        .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));
    let state = AppState {
        store: Arc::new(RwLock::new(Store::default())),
        config,
        limiter,
    };

    Router::new()
        .route("/api/v1/team/add", post(add_team))
        .route("/api/v1/team/get", get(get_team))
        .route("/api/v1/users/setIsActive", post(set_is_active))
        .route("/api/v1/users/getReview", get(get_review))
        .route("/api/v1/pullRequests/create", post(create_pull_request))
        .route("/api/v1/pullRequests/merge", post(merge_pull_request))
        .route("/api/v1/pullRequests/reassign", post(reassign_reviewer))
        .route("/api/v1/statistics", get(statistics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `addr` until the process exits.
pub async fn run(addr: SocketAddr, config: MockConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(config)).await?;
    Ok(())
}

/// Serve on an ephemeral localhost port in the background, returning the bound address.
pub async fn spawn(config: MockConfig) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router(config)).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });
    Ok(addr)
}

async fn add_team(
    State(state): State<AppState>,
    body: Result<Json<Team>, JsonRejection>,
) -> ApiResult {
    state.admit("team/add").await?;
    let Json(team) = body?;
    let team = state.write(|s| s.add_team(team))?;
    Ok((StatusCode::CREATED, Json(json!({ "team": team }))))
}

#[derive(Deserialize)]
struct TeamQuery {
    team_name: Option<String>,
}

async fn get_team(State(state): State<AppState>, Query(query): Query<TeamQuery>) -> ApiResult {
    state.admit("team/get").await?;
    let team_name = query
        .team_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("team_name query parameter is required".to_string()))?;
    let team = state.read(|s| s.get_team(&team_name))?;
    Ok((StatusCode::OK, Json(json!({ "team": team }))))
}

async fn set_is_active(
    State(state): State<AppState>,
    body: Result<Json<SetIsActive>, JsonRejection>,
) -> ApiResult {
    state.admit("users/setIsActive").await?;
    let Json(req) = body?;
    let user = state.write(|s| s.set_is_active(&req.user_id, req.is_active))?;
    Ok((StatusCode::OK, Json(json!({ "user": user }))))
}

#[derive(Deserialize)]
struct ReviewQuery {
    user_id: Option<String>,
}

async fn get_review(State(state): State<AppState>, Query(query): Query<ReviewQuery>) -> ApiResult {
    state.admit("users/getReview").await?;
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id query parameter is required".to_string()))?;
    let pull_requests = state.read(|s| s.reviews(&user_id));
    Ok((
        StatusCode::OK,
        Json(json!({ "user_id": user_id, "pull_requests": pull_requests })),
    ))
}

async fn create_pull_request(
    State(state): State<AppState>,
    body: Result<Json<CreatePullRequest>, JsonRejection>,
) -> ApiResult {
    state.admit("pullRequests/create").await?;
    let Json(req) = body?;
    let pr = state.write(|s| s.create_pull_request(req, &mut rand::thread_rng()))?;
    Ok((StatusCode::CREATED, Json(json!({ "pr": pr }))))
}

async fn merge_pull_request(
    State(state): State<AppState>,
    body: Result<Json<MergePullRequest>, JsonRejection>,
) -> ApiResult {
    state.admit("pullRequests/merge").await?;
    let Json(req) = body?;
    let pr = state.write(|s| s.merge_pull_request(&req.pull_request_id))?;
    Ok((StatusCode::OK, Json(json!({ "pr": pr }))))
}

async fn reassign_reviewer(
    State(state): State<AppState>,
    body: Result<Json<ReassignReviewer>, JsonRejection>,
) -> ApiResult {
    state.admit("pullRequests/reassign").await?;
    let Json(req) = body?;
    let (pr, replaced_by) = state.write(|s| {
        s.reassign_reviewer(&req.pull_request_id, &req.old_user_id, &mut rand::thread_rng())
    })?;
    Ok((
        StatusCode::OK,
        Json(json!({ "pr": pr, "replaced_by": replaced_by })),
    ))
}

async fn statistics(State(state): State<AppState>) -> ApiResult {
    state.admit("statistics").await?;
    let stats = state.read(|s| s.statistics());
    Ok((StatusCode::OK, Json(json!(stats))))
}
