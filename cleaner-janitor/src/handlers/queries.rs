use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde_derive::{Deserialize, Serialize};

use cleaner_common::audit::AuditRecord;
use cleaner_common::error::CleanerError;
use cleaner_common::job::{HookSummary, JobStatus};

use crate::cleanup::Cleaner;

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct CountResponse {
    count: i64,
}

#[derive(Debug, Deserialize)]
pub struct AuditParams {
    limit: Option<i64>,
}

pub async fn pending_count(State(cleaner): State<Cleaner>) -> Result<Json<CountResponse>, ApiError> {
    let count = cleaner.count_pending().await?;
    Ok(Json(CountResponse { count }))
}

pub async fn completed_by_hook(
    State(cleaner): State<Cleaner>,
) -> Result<Json<Vec<HookSummary>>, ApiError> {
    Ok(Json(cleaner.group_by_hook(JobStatus::Complete).await?))
}

pub async fn failed_by_hook(
    State(cleaner): State<Cleaner>,
) -> Result<Json<Vec<HookSummary>>, ApiError> {
    Ok(Json(cleaner.group_by_hook(JobStatus::Failed).await?))
}

pub async fn recent_audit(
    State(cleaner): State<Cleaner>,
    params: Result<Query<AuditParams>, QueryRejection>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    let Query(params) =
        params.map_err(|rejection| CleanerError::InvalidInput(rejection.body_text()))?;
    Ok(Json(cleaner.recent_audit(params.limit).await?))
}
