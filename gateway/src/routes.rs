//! HTTP route definitions and handlers.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use crdp_core::{
    extract_protected_from_protect_response, extract_protected_list_from_protect_response,
    extract_restored_from_reveal_response, extract_restored_list_from_reveal_response, run_bulk, run_single,
    BulkIterationResult, ClientConfig, ConfigOverride, CrdpClient, Envelope, IterationResult, DEFAULT_BATCH_SIZE,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{issue_token, verify_credentials, AuthUser};
use crate::error::GatewayError;
use crate::extract::{ValidForm, ValidJson, ValidQuery};
use crate::state::AppState;

/// Run blocking upstream work off the async executor.
async fn blocking<F, R>(work: F) -> Result<R, GatewayError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await?)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

async fn login(
    State(state): State<AppState>,
    ValidForm(form): ValidForm<LoginForm>,
) -> Result<Json<TokenResponse>, GatewayError> {
    if !verify_credentials(&state.settings, &form.username, &form.password) {
        info!(username = %form.username, "login rejected");
        return Err(GatewayError::Unauthorized("Incorrect username or password".to_string()));
    }
    let access_token = issue_token(&state.settings.secret_key, &form.username, state.settings.token_ttl())?;
    info!(username = %form.username, "login succeeded");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

async fn me(AuthUser(username): AuthUser) -> Json<Value> {
    Json(json!({ "username": username }))
}

// ---------------------------------------------------------------------------
// Protect / reveal
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProtectRequest {
    pub data: String,
    #[serde(flatten)]
    pub target: ConfigOverride,
}

#[derive(Deserialize)]
pub struct RevealRequest {
    pub protected_data: String,
    pub username: Option<String>,
    #[serde(flatten)]
    pub target: ConfigOverride,
}

#[derive(Deserialize)]
pub struct ProtectBulkRequest {
    pub data_array: Vec<String>,
    #[serde(flatten)]
    pub target: ConfigOverride,
}

#[derive(Deserialize)]
pub struct RevealBulkRequest {
    pub protected_data_array: Vec<String>,
    pub username: Option<String>,
    #[serde(flatten)]
    pub target: ConfigOverride,
}

#[derive(Serialize, Deserialize)]
pub struct ProtectResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RevealResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ProtectBulkResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected_data_array: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RevealBulkResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_array: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn status_of(envelope: &Envelope) -> u16 {
    envelope.status().unwrap_or(200)
}

/// Bulk answers are positional, so a short or long list cannot be paired
/// with the inputs.
fn positional(values: Vec<String>, expected: usize) -> Result<Vec<String>, GatewayError> {
    if values.len() == expected {
        return Ok(values);
    }
    tracing::warn!(expected, returned = values.len(), "bulk response length mismatch");
    Err(GatewayError::Upstream {
        status: 502,
        detail: format!("upstream returned {} values for {expected} inputs", values.len()),
    })
}

async fn protect(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidJson(req): ValidJson<ProtectRequest>,
) -> Result<Json<ProtectResponse>, GatewayError> {
    let config = state.resolve(&req.target);
    let envelope = blocking(move || CrdpClient::new(config).protect(&req.data)).await??;
    Ok(Json(ProtectResponse {
        status_code: status_of(&envelope),
        protected_data: extract_protected_from_protect_response(&envelope),
        error: None,
    }))
}

async fn reveal(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidJson(req): ValidJson<RevealRequest>,
) -> Result<Json<RevealResponse>, GatewayError> {
    let config = state.resolve(&req.target);
    let envelope =
        blocking(move || CrdpClient::new(config).reveal(&req.protected_data, req.username.as_deref())).await??;
    Ok(Json(RevealResponse {
        status_code: status_of(&envelope),
        data: extract_restored_from_reveal_response(&envelope),
        error: None,
    }))
}

async fn protect_bulk(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidJson(req): ValidJson<ProtectBulkRequest>,
) -> Result<Json<ProtectBulkResponse>, GatewayError> {
    let config = state.resolve(&req.target);
    let expected = req.data_array.len();
    let envelope = blocking(move || CrdpClient::new(config).protect_bulk(&req.data_array)).await??;
    let protected = positional(extract_protected_list_from_protect_response(&envelope), expected)?;
    Ok(Json(ProtectBulkResponse {
        status_code: status_of(&envelope),
        protected_data_array: Some(protected),
        error: None,
    }))
}

async fn reveal_bulk(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidJson(req): ValidJson<RevealBulkRequest>,
) -> Result<Json<RevealBulkResponse>, GatewayError> {
    let config = state.resolve(&req.target);
    let expected = req.protected_data_array.len();
    let envelope = blocking(move || {
        CrdpClient::new(config).reveal_bulk(&req.protected_data_array, req.username.as_deref())
    })
    .await??;
    let restored = positional(extract_restored_list_from_reveal_response(&envelope), expected)?;
    Ok(Json(RevealBulkResponse {
        status_code: status_of(&envelope),
        data_array: Some(restored),
        error: None,
    }))
}

// ---------------------------------------------------------------------------
// Round-trip verification
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub data: String,
    pub username: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(flatten)]
    pub target: ConfigOverride,
}

#[derive(Deserialize)]
pub struct VerifyBulkRequest {
    pub data_array: Vec<String>,
    pub batch_size: Option<usize>,
    pub username: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(flatten)]
    pub target: ConfigOverride,
}

/// Raw upstream envelopes, included on request.
#[derive(Serialize)]
pub struct DebugEnvelopes {
    pub protect_response: Envelope,
    pub reveal_response: Envelope,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub data: String,
    pub protected_data: Option<String>,
    pub restored: Option<String>,
    #[serde(rename = "match")]
    pub matched: bool,
    pub success: bool,
    pub time_s: f64,
    pub protect_status: Option<u16>,
    pub reveal_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugEnvelopes>,
}

impl VerifyResponse {
    fn from_result(result: IterationResult, debug: bool) -> Self {
        Self {
            matched: result.is_match(),
            success: result.success(),
            time_s: result.elapsed.as_secs_f64(),
            protect_status: result.protect_response.status(),
            reveal_status: result.reveal_response.status(),
            debug: debug.then(|| DebugEnvelopes {
                protect_response: result.protect_response.clone(),
                reveal_response: result.reveal_response.clone(),
            }),
            data: result.data,
            protected_data: result.protected_token,
            restored: result.restored,
        }
    }
}

#[derive(Serialize)]
pub struct BatchReport {
    pub inputs: Vec<String>,
    pub protected_data_array: Vec<String>,
    pub data_array: Vec<String>,
    pub matches: Vec<bool>,
    pub success: bool,
    pub time_s: f64,
    pub protect_status: Option<u16>,
    pub reveal_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugEnvelopes>,
}

impl BatchReport {
    fn from_result(result: BulkIterationResult, debug: bool) -> Self {
        Self {
            matches: result.matches(),
            success: result.success(),
            time_s: result.elapsed.as_secs_f64(),
            protect_status: result.protect_response.status(),
            reveal_status: result.reveal_response.status(),
            debug: debug.then(|| DebugEnvelopes {
                protect_response: result.protect_response.clone(),
                reveal_response: result.reveal_response.clone(),
            }),
            inputs: result.inputs,
            protected_data_array: result.protected_tokens,
            data_array: result.restored_values,
        }
    }
}

#[derive(Serialize)]
pub struct VerifyBulkResponse {
    pub batches: usize,
    pub total: usize,
    pub matched: usize,
    pub all_success: bool,
    pub time_s: f64,
    pub results: Vec<BatchReport>,
}

async fn verify(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidJson(req): ValidJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, GatewayError> {
    let config = state.resolve(&req.target);
    let debug = req.debug;
    let result = blocking(move || run_single(&CrdpClient::new(config), &req.data, req.username.as_deref())).await?;
    Ok(Json(VerifyResponse::from_result(result, debug)))
}

async fn verify_bulk(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidJson(req): ValidJson<VerifyBulkRequest>,
) -> Result<Json<VerifyBulkResponse>, GatewayError> {
    let config = state.resolve(&req.target);
    let debug = req.debug;
    let batch_size = req.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    let results = blocking(move || {
        run_bulk(&CrdpClient::new(config), &req.data_array, batch_size, req.username.as_deref())
    })
    .await??;

    let reports: Vec<BatchReport> = results
        .into_iter()
        .map(|result| BatchReport::from_result(result, debug))
        .collect();
    Ok(Json(VerifyBulkResponse {
        batches: reports.len(),
        total: reports.iter().map(|r| r.inputs.len()).sum(),
        matched: reports.iter().flat_map(|r| &r.matches).filter(|m| **m).count(),
        all_success: reports.iter().all(|r| r.success),
        time_s: reports.iter().map(|r| r.time_s).sum(),
        results: reports,
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct HealthStep {
    pub stage: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub crdp_api_host: String,
    pub crdp_api_port: u16,
    pub healthz_port: u16,
    pub protection_policy: String,
    pub steps: Vec<HealthStep>,
}

async fn probe_healthz(config: ClientConfig) -> HealthStep {
    let client = CrdpClient::new(config);
    let url = client.healthz_url();
    let outcome = blocking(move || client.healthz()).await;
    match outcome {
        Ok(Ok(envelope)) => HealthStep {
            stage: "healthz".to_string(),
            url,
            status_code: envelope.status(),
            ok: true,
            detail: None,
        },
        Ok(Err(err)) => HealthStep {
            stage: "healthz".to_string(),
            url,
            status_code: err.status(),
            ok: false,
            detail: Some(err.to_string()),
        },
        Err(err) => HealthStep {
            stage: "healthz".to_string(),
            url,
            status_code: None,
            ok: false,
            detail: Some(err.to_string()),
        },
    }
}

/// Probe the upstream health endpoint. Answers 200 whatever the upstream
/// does; the outcome is in `status` and `steps`. An unparseable query is a
/// 422 like any other malformed request.
async fn crdp_health(
    State(state): State<AppState>,
    ValidQuery(overrides): ValidQuery<ConfigOverride>,
) -> Json<HealthResponse> {
    let config = state.resolve(&overrides);
    let step = probe_healthz(config.clone()).await;
    let status = if step.ok { "healthy" } else { "unhealthy" };
    if !step.ok {
        tracing::warn!(url = %step.url, detail = ?step.detail, "upstream health check failed");
    }
    Json(HealthResponse {
        status: status.to_string(),
        healthz_port: config.effective_healthz_port(),
        crdp_api_host: config.host,
        crdp_api_port: config.port,
        protection_policy: config.policy,
        steps: vec![step],
    })
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
}

fn crdp_routes() -> Router<AppState> {
    Router::new()
        .route("/protect", post(protect))
        .route("/reveal", post(reveal))
        .route("/protect-bulk", post(protect_bulk))
        .route("/reveal-bulk", post(reveal_bulk))
        .route("/verify", post(verify))
        .route("/verify-bulk", post(verify_bulk))
        .route("/health", get(crdp_health))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth_routes())
        .nest("/api/crdp", crdp_routes())
}
