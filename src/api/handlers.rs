use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{Issue, IssueStatus, TransitionRecord};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> Result<String> {
    if !state.prometheus_enabled {
        return Err(AppError::NotFound("Metrics disabled".to_string()));
    }
    crate::metrics::render()
}

/// Create an issue directly
pub async fn create_issue(
    State(state): State<AppState>,
    Json(request): Json<CreateIssueRequest>,
) -> Result<(StatusCode, Json<Issue>)> {
    request.validate()?;

    let mut issue = Issue::new(
        request.title,
        request.description,
        request.reporter,
        request.vin,
    );
    issue.attributes = request.attributes;

    let created = state.workflow.create_issue(issue).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIssueRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 255))]
    pub reporter: String,
    pub vin: Option<String>,
    #[serde(flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Get an issue by id
pub async fn get_issue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Issue>> {
    Ok(Json(state.workflow.get_issue(&id).await?))
}

/// Valid transition targets from a status
pub async fn valid_transitions(
    State(state): State<AppState>,
    Path(from): Path<String>,
) -> Result<Json<ValidTransitionsResponse>> {
    let from = IssueStatus::from_str(&from)
        .map_err(|_| AppError::Validation(format!("Unknown status: {}", from)))?;

    Ok(Json(ValidTransitionsResponse {
        from,
        allowed: state.workflow.valid_transitions(from),
    }))
}

#[derive(Debug, Serialize)]
pub struct ValidTransitionsResponse {
    pub from: IssueStatus,
    pub allowed: Vec<IssueStatus>,
}

/// Execute a lifecycle transition
pub async fn execute_transition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ExecuteTransitionRequest>,
) -> Result<Json<Issue>> {
    request.validate()?;

    let updated = state
        .workflow
        .execute_transition(
            &id,
            request.to_status,
            &request.actor,
            request.reason,
            request.metadata,
        )
        .await?;

    Ok(Json(updated))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExecuteTransitionRequest {
    pub to_status: IssueStatus,
    #[validate(length(min = 1, max = 255))]
    pub actor: String,
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Full audit trail for an issue
pub async fn list_transitions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransitionRecord>>> {
    Ok(Json(state.workflow.transition_history(&id).await?))
}
