//! Team member API endpoints.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Path, State};

use super::{acknowledged, created, read_submission, success, ApiResult};
use crate::models::TeamMember;
use crate::AppState;

/// GET /api/team-members - List all members, newest first.
pub async fn list_team_members(State(state): State<AppState>) -> ApiResult<Vec<TeamMember>> {
    let members = state.service.list().await?;
    let base = &state.config.public_url;

    success(
        members
            .into_iter()
            .map(|member| member.with_public_image_url(base))
            .collect(),
    )
}

/// GET /api/team-members/:id - Get a single member.
pub async fn get_team_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TeamMember> {
    let member = state.service.get(&id).await?;
    success(member.with_public_image_url(&state.config.public_url))
}

/// POST /api/team-members - Create a member from a multipart form.
pub async fn create_team_member(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<TeamMember> {
    let submission = read_submission(multipart?, &state.config.limits).await?;

    let member = state
        .service
        .create(&submission.form, submission.upload.as_ref())
        .await?;

    created(
        member.with_public_image_url(&state.config.public_url),
        "Team member created successfully.",
    )
}

/// PUT /api/team-members/:id - Replace a member's fields, optionally with a new image.
pub async fn update_team_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<TeamMember> {
    let submission = read_submission(multipart?, &state.config.limits).await?;

    let member = state
        .service
        .update(&id, &submission.form, submission.upload.as_ref())
        .await?;

    Ok(success(member.with_public_image_url(&state.config.public_url))?
        .with_message("Team member updated successfully."))
}

/// DELETE /api/team-members/:id - Delete a member and its image.
pub async fn delete_team_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.service.delete(&id).await?;
    acknowledged("Team member deleted successfully.")
}
