use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_derive::Deserialize;

use cleaner_common::error::CleanerError;

use crate::cleanup::{Cleaner, Command, CommandOutcome};

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CleanSelectedRequest {
    hooks: Vec<String>,
}

pub async fn clean_all(State(cleaner): State<Cleaner>) -> Result<Json<CommandOutcome>, ApiError> {
    Ok(Json(cleaner.execute(Command::CleanAll).await?))
}

pub async fn clean_selected(
    State(cleaner): State<Cleaner>,
    request: Result<Json<CleanSelectedRequest>, JsonRejection>,
) -> Result<Json<CommandOutcome>, ApiError> {
    let Json(request) =
        request.map_err(|rejection| CleanerError::InvalidInput(rejection.body_text()))?;
    let command = Command::CleanSelected {
        hooks: request.hooks,
    };

    Ok(Json(cleaner.execute(command).await?))
}

pub async fn clean_failed(
    State(cleaner): State<Cleaner>,
) -> Result<Json<CommandOutcome>, ApiError> {
    Ok(Json(cleaner.execute(Command::CleanFailed).await?))
}

pub async fn clear_logs(State(cleaner): State<Cleaner>) -> Result<Json<CommandOutcome>, ApiError> {
    Ok(Json(cleaner.execute(Command::ClearLogs).await?))
}
