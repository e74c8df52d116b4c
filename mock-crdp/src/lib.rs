use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_POLICY: &str = "P03";

#[derive(Deserialize)]
pub struct ProtectRequest {
    pub protection_policy_name: String,
    pub data: String,
}

#[derive(Deserialize)]
pub struct RevealRequest {
    pub protection_policy_name: String,
    pub protected_data: String,
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct ProtectBulkRequest {
    pub protection_policy_name: String,
    pub data_array: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectedItem {
    pub protected_data: String,
}

#[derive(Deserialize)]
pub struct RevealBulkRequest {
    pub protection_policy_name: String,
    pub protected_data_array: Vec<ProtectedItem>,
    pub username: Option<String>,
}

/// Issued tokens and the policies this instance accepts.
#[derive(Default)]
pub struct Vault {
    policies: HashSet<String>,
    tokens: HashMap<String, (String, String)>,
}

impl Vault {
    fn check_policy(&self, policy: &str) -> Result<(), Rejection> {
        if self.policies.contains(policy) {
            Ok(())
        } else {
            Err(reject(format!("protection policy '{policy}' not found")))
        }
    }

    fn protect(&mut self, policy: &str, data: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens
            .insert(token.clone(), (policy.to_string(), data.to_string()));
        token
    }

    fn reveal(&self, policy: &str, token: &str) -> Result<String, Rejection> {
        match self.tokens.get(token) {
            Some((issued_for, data)) if issued_for == policy => Ok(data.clone()),
            _ => Err(reject(format!("unable to reveal protected data '{token}'"))),
        }
    }
}

pub type Db = Arc<RwLock<Vault>>;

type Rejection = (StatusCode, Json<Value>);

fn reject(message: String) -> Rejection {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

pub fn app() -> Router {
    app_with_policies(&[DEFAULT_POLICY])
}

pub fn app_with_policies(policies: &[&str]) -> Router {
    let vault = Vault {
        policies: policies.iter().map(|p| p.to_string()).collect(),
        tokens: HashMap::new(),
    };
    let db: Db = Arc::new(RwLock::new(vault));
    Router::new()
        .route("/v1/protect", post(protect))
        .route("/v1/reveal", post(reveal))
        .route("/v1/protectbulk", post(protect_bulk))
        .route("/v1/revealbulk", post(reveal_bulk))
        .route("/healthz", get(healthz))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn protect(
    State(db): State<Db>,
    Json(input): Json<ProtectRequest>,
) -> Result<Json<Value>, Rejection> {
    let mut vault = db.write().await;
    vault.check_policy(&input.protection_policy_name)?;
    let token = vault.protect(&input.protection_policy_name, &input.data);
    Ok(Json(json!({ "protected_data": token })))
}

async fn reveal(
    State(db): State<Db>,
    Json(input): Json<RevealRequest>,
) -> Result<Json<Value>, Rejection> {
    let vault = db.read().await;
    vault.check_policy(&input.protection_policy_name)?;
    let data = vault.reveal(&input.protection_policy_name, &input.protected_data)?;
    tracing::debug!(username = ?input.username, "reveal");
    Ok(Json(json!({ "data": data })))
}

async fn protect_bulk(
    State(db): State<Db>,
    Json(input): Json<ProtectBulkRequest>,
) -> Result<Json<Value>, Rejection> {
    let mut vault = db.write().await;
    vault.check_policy(&input.protection_policy_name)?;
    let items: Vec<ProtectedItem> = input
        .data_array
        .iter()
        .map(|data| ProtectedItem {
            protected_data: vault.protect(&input.protection_policy_name, data),
        })
        .collect();
    Ok(Json(json!({
        "status": "Success",
        "total_count": items.len(),
        "success_count": items.len(),
        "error_count": 0,
        "protected_data_array": items,
    })))
}

async fn reveal_bulk(
    State(db): State<Db>,
    Json(input): Json<RevealBulkRequest>,
) -> Result<Json<Value>, Rejection> {
    let vault = db.read().await;
    vault.check_policy(&input.protection_policy_name)?;
    let items = input
        .protected_data_array
        .iter()
        .map(|item| {
            vault
                .reveal(&input.protection_policy_name, &item.protected_data)
                .map(|data| json!({ "data": data }))
        })
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(username = ?input.username, count = items.len(), "reveal bulk");
    Ok(Json(json!({
        "status": "Success",
        "total_count": items.len(),
        "success_count": items.len(),
        "error_count": 0,
        "data_array": items,
    })))
}
