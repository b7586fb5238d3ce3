//! HTTP routes for accounts, transfers and chain inspection.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounts::{AccountCreation, AccountView};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::model::Record;

/// Shared application state passed to Axum handlers. The mutex serializes
/// every ledger operation across concurrent requests.
#[derive(Clone, Default)]
pub struct AppState {
    pub ledger: Arc<Mutex<Ledger>>,
}

impl AppState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }
}

type Rejection = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/:id", get(get_account))
        .route("/accounts/:id/deposit", post(deposit))
        .route("/auth", post(authenticate))
        .route("/transfers", post(transfer))
        .route("/chain", get(list_records))
        .route("/chain/:index", get(get_record))
        .route("/validate", get(validate_chain))
        .route("/health", get(health))
        .route("/version", get(version))
        .with_state(state)
}

fn lock(state: &AppState) -> Result<MutexGuard<'_, Ledger>, Rejection> {
    state.ledger.lock().map_err(|_| {
        tracing::error!("ledger lock poisoned");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ledger unavailable".to_string(),
        )
    })
}

fn reject(err: LedgerError) -> Rejection {
    let status = match err {
        LedgerError::InvalidAmount(_) | LedgerError::InvalidAccountId => StatusCode::BAD_REQUEST,
        LedgerError::UnknownAccount(_) => StatusCode::NOT_FOUND,
        LedgerError::InsufficientFunds { .. } => StatusCode::CONFLICT,
        LedgerError::Overflow(_) | LedgerError::PrecisionLoss { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    (status, err.to_string())
}

#[derive(Deserialize)]
pub struct Credentials {
    pub id: String,
    pub credential: String,
}

#[derive(Serialize)]
pub struct CreateAccountResp {
    pub id: String,
    pub created: bool,
}

/// POST /accounts — 201 when created, 200 when the id already existed
pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<(StatusCode, Json<CreateAccountResp>), Rejection> {
    let outcome = lock(&state)?
        .create_account(&payload.id, &payload.credential)
        .map_err(reject)?;
    let (status, created) = match outcome {
        AccountCreation::Created => (StatusCode::CREATED, true),
        AccountCreation::AlreadyExists => (StatusCode::OK, false),
    };
    Ok((
        status,
        Json(CreateAccountResp {
            id: payload.id,
            created,
        }),
    ))
}

/// GET /accounts
pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountView>>, Rejection> {
    let guard = lock(&state)?;
    Ok(Json(guard.accounts().collect()))
}

/// GET /accounts/:id
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountView>, Rejection> {
    let balance = lock(&state)?
        .balance(&id)
        .ok_or_else(|| reject(LedgerError::UnknownAccount(id.clone())))?;
    Ok(Json(AccountView { id, balance }))
}

#[derive(Deserialize)]
pub struct DepositReq {
    pub amount: Decimal,
}

/// POST /accounts/:id/deposit
pub async fn deposit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<DepositReq>,
) -> Result<Json<AccountView>, Rejection> {
    let balance = lock(&state)?
        .deposit(&id, payload.amount)
        .map_err(reject)?;
    Ok(Json(AccountView { id, balance }))
}

#[derive(Serialize)]
pub struct AuthResp {
    pub authenticated: bool,
}

/// POST /auth
pub async fn authenticate(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<AuthResp>, Rejection> {
    let authenticated = lock(&state)?.authenticate(&payload.id, &payload.credential);
    Ok(Json(AuthResp { authenticated }))
}

#[derive(Deserialize)]
pub struct TransferReq {
    pub sender: String,
    pub receiver: String,
    pub amount: Decimal,
}

/// POST /transfers — returns the record appended for the settled transfer
pub async fn transfer(
    State(state): State<AppState>,
    Json(payload): Json<TransferReq>,
) -> Result<(StatusCode, Json<Record>), Rejection> {
    let mut guard = lock(&state)?;
    let record = guard
        .authorize_transfer(&payload.sender, &payload.receiver, payload.amount)
        .map_err(reject)?
        .clone();
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /chain
pub async fn list_records(State(state): State<AppState>) -> Result<Json<Vec<Record>>, Rejection> {
    let guard = lock(&state)?;
    Ok(Json(guard.records().to_vec()))
}

/// GET /chain/:index
pub async fn get_record(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<Record>, Rejection> {
    let guard = lock(&state)?;
    let record = guard
        .chain()
        .get(index)
        .ok_or((StatusCode::NOT_FOUND, "not found".to_string()))?;
    Ok(Json(record.clone()))
}

/// GET /validate — recompute every link; `error` names the first violation
#[derive(Serialize)]
pub struct ValidateResp {
    pub ok: bool,
    pub error: Option<String>,
}
pub async fn validate_chain(State(state): State<AppState>) -> Result<Json<ValidateResp>, Rejection> {
    let guard = lock(&state)?;
    let resp = match guard.verify_chain() {
        Ok(()) => ValidateResp {
            ok: true,
            error: None,
        },
        Err(e) => ValidateResp {
            ok: false,
            error: Some(e.to_string()),
        },
    };
    Ok(Json(resp))
}

/// GET /health
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// GET /version
#[derive(Serialize)]
pub struct Version {
    pub version: &'static str,
    pub git_sha: Option<&'static str>,
}
pub async fn version() -> Json<Version> {
    Json(Version {
        version: env!("CARGO_PKG_VERSION"),
        git_sha: option_env!("GIT_SHA"),
    })
}
