//! Multipart form reading for member submissions.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::BytesMut;

use crate::config::TransportLimits;
use crate::errors::AppError;
use crate::models::MemberForm;
use crate::upload::{TransportFault, UploadCandidate};

/// Form field carrying the profile image file.
pub const PROFILE_IMAGE_FIELD: &str = "profile_image";

/// A decoded create/update submission.
#[derive(Debug, Default)]
pub struct MemberSubmission {
    pub form: MemberForm,
    pub upload: Option<UploadCandidate>,
}

/// Read text fields into a [`MemberForm`] and the image field into an
/// [`UploadCandidate`].
///
/// Transport problems with the file (limits exceeded, broken stream) become a
/// faulted candidate rather than an error so the validator can classify them.
pub async fn read_submission(
    mut multipart: Multipart,
    limits: &TransportLimits,
) -> Result<MemberSubmission, AppError> {
    let mut submission = MemberSubmission::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                submission.upload = Some(UploadCandidate::faulted(
                    None,
                    TransportFault::ExceedsRequestLimit,
                ));
                break;
            }
            Err(e) => return Err(AppError::BadRequest(e.body_text())),
        };

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == PROFILE_IMAGE_FIELD {
            submission.upload = read_file(field, limits).await;
            if matches!(
                submission.upload.as_ref().and_then(|c| c.fault.as_ref()),
                Some(TransportFault::ExceedsRequestLimit)
            ) {
                break;
            }
            continue;
        }

        match field.text().await {
            Ok(value) => submission.form.set(&name, value),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                submission.upload = Some(UploadCandidate::faulted(
                    None,
                    TransportFault::ExceedsRequestLimit,
                ));
                break;
            }
            Err(e) => return Err(AppError::BadRequest(e.body_text())),
        }
    }

    Ok(submission)
}

/// Read the image field. `None` when the browser sent an empty file input.
async fn read_file(mut field: Field<'_>, limits: &TransportLimits) -> Option<UploadCandidate> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.is_empty());
    let content_type = field.content_type().map(str::to_string);
    let mut buf = BytesMut::new();

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if (buf.len() + chunk.len()) as u64 > limits.upload_max_bytes {
                    return Some(UploadCandidate::faulted(
                        file_name,
                        TransportFault::ExceedsUploadLimit,
                    ));
                }
                buf.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => return Some(UploadCandidate::faulted(file_name, fault_for(&e))),
        }
    }

    if buf.is_empty() && file_name.is_none() {
        return None;
    }

    Some(UploadCandidate::new(file_name, content_type, buf.freeze()))
}

fn fault_for(err: &MultipartError) -> TransportFault {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        TransportFault::ExceedsRequestLimit
    } else {
        TransportFault::Partial(err.body_text())
    }
}
