//! Team member API endpoints.
//!
//! Each handler walks one request through validation, the store and the
//! envelope. Failures come back as [`AppError`] and are rendered by its
//! `IntoResponse` impl, so every response is a JSON envelope.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, StatusCode},
    Json,
};

use super::{success, ApiResponse, ApiResult};
use crate::errors::AppError;
use crate::models::{MemberPayload, NewTeamMember, TeamMember};
use crate::validation::{coerce_text, validate_member, WriteMode};
use crate::AppState;

pub const CREATED_MESSAGE: &str = "Team member created successfully";
pub const UPDATED_MESSAGE: &str = "Team member updated successfully";
pub const DELETED_MESSAGE: &str = "Team member deleted successfully";

/// Ids that do not parse can never resolve, so they are reported as missing.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| AppError::member_not_found(raw))
}

fn parse_payload(
    payload: Result<Json<MemberPayload>, JsonRejection>,
) -> Result<MemberPayload, AppError> {
    payload
        .map(|Json(p)| p)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Look up who currently holds the email the payload wants to write.
async fn email_owner(state: &AppState, payload: &MemberPayload) -> Result<Option<i64>, AppError> {
    let email = payload.email.as_ref().and_then(|v| coerce_text(v).ok());
    match email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => state.repo.find_email_owner(email).await,
        _ => Ok(None),
    }
}

/// GET /api/team-members/ - List all team members.
#[tracing::instrument(skip(state))]
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Vec<TeamMember>> {
    let members = state.repo.list_members().await?;
    tracing::debug!("Listing {} team members", members.len());
    Ok(ApiResponse::list(members))
}

/// GET /api/team-members/{id}/ - Get a single team member.
#[tracing::instrument(skip(state))]
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TeamMember> {
    let id = parse_id(&id)?;

    match state.repo.get_member(id).await? {
        Some(member) => success(member),
        None => Err(AppError::member_not_found(id)),
    }
}

/// POST /api/team-members/ - Create a new team member.
#[tracing::instrument(skip(state, payload))]
pub async fn create_member(
    State(state): State<AppState>,
    payload: Result<Json<MemberPayload>, JsonRejection>,
) -> ApiResult<TeamMember> {
    let payload = parse_payload(payload)?;
    let owner = email_owner(&state, &payload).await?;

    let changes = validate_member(&payload, WriteMode::Create, None, owner).map_err(|errors| {
        tracing::info!("Create rejected by validation: {}", errors);
        AppError::from(errors)
    })?;
    let new = NewTeamMember::from_changes(changes)
        .ok_or_else(|| AppError::Internal("Validated create is missing fields".to_string()))?;

    let member = state.repo.create_member(&new).await?;
    tracing::info!(id = member.id, "Created team member {}", member);

    Ok(ApiResponse::new(member)
        .with_message(CREATED_MESSAGE)
        .with_status(StatusCode::CREATED))
}

/// PUT /api/team-members/{id}/ - Replace a team member.
pub async fn update_member(
    state: State<AppState>,
    id: Path<String>,
    payload: Result<Json<MemberPayload>, JsonRejection>,
) -> ApiResult<TeamMember> {
    write_member(state, id, payload, WriteMode::Replace).await
}

/// PATCH /api/team-members/{id}/ - Change only the supplied fields.
pub async fn partial_update_member(
    state: State<AppState>,
    id: Path<String>,
    payload: Result<Json<MemberPayload>, JsonRejection>,
) -> ApiResult<TeamMember> {
    write_member(state, id, payload, WriteMode::Partial).await
}

#[tracing::instrument(skip(state, payload))]
async fn write_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MemberPayload>, JsonRejection>,
    mode: WriteMode,
) -> ApiResult<TeamMember> {
    let id = parse_id(&id)?;
    let mut member = state
        .repo
        .get_member(id)
        .await?
        .ok_or_else(|| AppError::member_not_found(id))?;

    let payload = parse_payload(payload)?;
    let owner = email_owner(&state, &payload).await?;

    let changes = validate_member(&payload, mode, Some(id), owner).map_err(|errors| {
        tracing::info!(id, "Update rejected by validation: {}", errors);
        AppError::from(errors)
    })?;
    member.apply(changes);

    let member = state.repo.update_member(&member).await?;
    tracing::info!(id, "Updated team member {}", member);

    Ok(ApiResponse::new(member).with_message(UPDATED_MESSAGE))
}

/// DELETE /api/team-members/{id}/ - Delete a team member.
#[tracing::instrument(skip(state))]
pub async fn delete_member(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_id(&id)?;

    state.repo.delete_member(id).await?;
    tracing::info!(id, "Deleted team member");

    Ok(ApiResponse::new(()).with_message(DELETED_MESSAGE))
}

/// Fallback for paths outside the route table.
pub async fn route_not_found() -> AppError {
    AppError::NotFound("The requested resource was not found".to_string())
}

/// Fallback for known paths hit with an unsupported verb.
pub async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(format!("Method \"{}\" not allowed.", method))
}
