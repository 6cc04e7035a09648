//! Admin web surface for managing team members.
//!
//! Server-rendered pages: list, create/edit forms, and submit/delete actions
//! that redirect back to the list with a flash message.

mod views;

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::api::{read_submission, MemberSubmission};
use crate::errors::AppError;
use crate::models::MemberForm;
use crate::AppState;

pub use views::FormTarget;

/// Mount point of the admin pages.
pub const ADMIN_BASE: &str = "/admin/team-members";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub flash: Option<String>,
}

/// GET /admin/team-members
pub async fn index(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    match state.service.list().await {
        Ok(members) => Html(views::index_page(
            &members,
            query.flash.as_deref().and_then(flash_message),
            &state.config.public_url,
        ))
        .into_response(),
        Err(e) => error_page(e),
    }
}

/// GET /admin/team-members/create
pub async fn create_form() -> Html<String> {
    Html(views::member_form(
        &FormTarget::Create,
        &MemberForm::default(),
        None,
    ))
}

/// POST /admin/team-members
pub async fn store(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let submission = match submission(&state, multipart).await {
        Ok(submission) => submission,
        Err(e) => return form_error(&FormTarget::Create, &MemberForm::default(), e),
    };

    match state
        .service
        .create(&submission.form, submission.upload.as_ref())
        .await
    {
        Ok(_) => redirect_with_flash("created"),
        Err(e) => form_error(&FormTarget::Create, &submission.form, e),
    }
}

/// GET /admin/team-members/:id/edit
pub async fn edit(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.get(&id).await {
        Ok(member) => {
            let values = MemberForm {
                name: Some(member.name.clone()),
                title: Some(member.title.clone()),
                description: Some(member.description.clone()),
                telegram_link: member.telegram_link.clone(),
                facebook_link: member.facebook_link.clone(),
                phone_number: member.phone_number.clone(),
            };
            let target = FormTarget::Edit {
                id: member.id.clone(),
                current_image: member
                    .with_public_image_url(&state.config.public_url)
                    .profile_image,
            };
            Html(views::member_form(&target, &values, None)).into_response()
        }
        Err(e) => error_page(e),
    }
}

/// POST /admin/team-members/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let existing = match state.service.get(&id).await {
        Ok(member) => member,
        Err(e) => return error_page(e),
    };
    let target = FormTarget::Edit {
        id: id.clone(),
        current_image: existing
            .with_public_image_url(&state.config.public_url)
            .profile_image,
    };

    let submission = match submission(&state, multipart).await {
        Ok(submission) => submission,
        Err(e) => return form_error(&target, &MemberForm::default(), e),
    };

    match state
        .service
        .update(&id, &submission.form, submission.upload.as_ref())
        .await
    {
        Ok(_) => redirect_with_flash("updated"),
        Err(e) => form_error(&target, &submission.form, e),
    }
}

/// DELETE /admin/team-members/:id, POST /admin/team-members/:id/delete
pub async fn destroy(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.delete(&id).await {
        Ok(()) => redirect_with_flash("deleted"),
        Err(e) => error_page(e),
    }
}

async fn submission(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<MemberSubmission, AppError> {
    read_submission(multipart?, &state.config.limits).await
}

fn flash_message(key: &str) -> Option<&'static str> {
    match key {
        "created" => Some("Team member created successfully."),
        "updated" => Some("Team member updated successfully."),
        "deleted" => Some("Team member deleted successfully."),
        _ => None,
    }
}

fn redirect_with_flash(key: &str) -> Response {
    Redirect::to(&format!("{ADMIN_BASE}?flash={key}")).into_response()
}

/// Re-render the form with the submitted values and per-field errors.
fn form_error(target: &FormTarget, values: &MemberForm, err: AppError) -> Response {
    match err.field_errors() {
        Some(errors) => (
            err.status_code(),
            Html(views::member_form(target, values, Some(&errors))),
        )
            .into_response(),
        None => error_page(err),
    }
}

fn error_page(err: AppError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(code = err.error_code(), "{}", err.message());
    }
    let heading = if status == StatusCode::NOT_FOUND {
        "Not Found"
    } else {
        "Something went wrong"
    };
    (status, Html(views::message_page(heading, &err.message()))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_messages() {
        assert_eq!(flash_message("created"), Some("Team member created successfully."));
        assert_eq!(flash_message("deleted"), Some("Team member deleted successfully."));
        assert_eq!(flash_message("<script>"), None);
    }

    #[test]
    fn test_redirect_targets_list() {
        let response = redirect_with_flash("updated");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/admin/team-members?flash=updated"
        );
    }

    #[test]
    fn test_upload_error_rerenders_form() {
        let values = MemberForm {
            name: Some("Ada".to_string()),
            ..Default::default()
        };
        let err = AppError::Upload(crate::upload::UploadError::TooLarge { size_bytes: 1 });

        let response = form_error(&FormTarget::Create, &values, err);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
