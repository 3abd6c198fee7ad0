use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use ledge_core::alert::{Alert, AlertStatus};
use ledge_core::ids::{AlertId, LoanId};
use ledge_engine::validity::{check_loan_validity, ValidityReport};
use ledge_engine::SweepReport;
use ledge_store::alerts::{AlertRepo, AlertSummary};
use ledge_store::loans::LoanRepo;

use crate::error::ApiError;
use crate::server::AppState;

const DEFAULT_PAGE_SIZE: u32 = 50;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let ok = state
        .db
        .with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(ledge_store::StoreError::from)
        })
        .is_ok();

    if ok {
        (StatusCode::OK, Json(serde_json::json!({ "status": "healthy" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unhealthy" })),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<AlertStatus>()
                .map_err(ApiError::BadRequest)
        })
        .transpose()?;

    let alerts = AlertRepo::new(state.db.clone()).list(
        status,
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        query.offset.unwrap_or(0),
    )?;
    Ok(Json(alerts))
}

pub async fn alerts_summary(
    State(state): State<AppState>,
) -> Result<Json<AlertSummary>, ApiError> {
    let summary = AlertRepo::new(state.db.clone()).summary()?;
    Ok(Json(summary))
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    let id = AlertId::from_raw(id);
    let repo = AlertRepo::new(state.db.clone());
    repo.acknowledge(&id, Utc::now())?;
    Ok(Json(repo.get(&id)?))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    let id = AlertId::from_raw(id);
    let repo = AlertRepo::new(state.db.clone());
    repo.resolve(&id, Utc::now())?;
    Ok(Json(repo.get(&id)?))
}

/// Manual sweep trigger, same pass the scheduler runs.
pub async fn run_sweep(State(state): State<AppState>) -> Result<Json<SweepReport>, ApiError> {
    let report = state.sweep.run_sweep(Utc::now())?;
    Ok(Json(report))
}

/// Loan-level validity check; cancels the loan when the offer has expired.
pub async fn loan_validity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ValidityReport>, ApiError> {
    let loans = LoanRepo::new(state.db.clone());
    let report = check_loan_validity(&loans, &LoanId::from_raw(id), Utc::now())?;
    Ok(Json(report))
}
