//! Team member service.
//!
//! Sequences field validation, image upload and record persistence so a
//! member's `profile_image` and the blob store stay in step. Update stores the
//! new image before deleting the old one; a crash between deleting the old blob
//! and writing the record leaves the record pointing at the deleted path and
//! the new blob orphaned.

use std::sync::Arc;

use tracing::Span;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{MemberForm, TeamMember};
use crate::storage::BlobStore;
use crate::upload::{TransportFault, UploadCandidate, UploadValidator};

#[derive(Clone)]
pub struct TeamMemberService {
    repo: Repository,
    blobs: Arc<dyn BlobStore>,
    validator: UploadValidator,
    span: Span,
}

impl TeamMemberService {
    pub fn new(
        repo: Repository,
        blobs: Arc<dyn BlobStore>,
        validator: UploadValidator,
        span: Span,
    ) -> Self {
        Self {
            repo,
            blobs,
            validator,
            span,
        }
    }

    /// All members, newest first.
    pub async fn list(&self) -> Result<Vec<TeamMember>, AppError> {
        self.repo.list_members().await
    }

    pub async fn get(&self, id: &str) -> Result<TeamMember, AppError> {
        self.repo
            .get_member(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(
        &self,
        form: &MemberForm,
        upload: Option<&UploadCandidate>,
    ) -> Result<TeamMember, AppError> {
        self.reject_truncated(upload)?;
        let fields = form.validate()?;

        let image = match upload {
            Some(candidate) => {
                let accepted = self
                    .validator
                    .validate(Some(candidate), self.blobs.as_ref())
                    .await?;
                tracing::debug!(
                    parent: &self.span,
                    mime = %accepted.mime_type,
                    bytes = accepted.size_bytes,
                    dimensions = ?accepted.dimensions,
                    "Accepted profile image"
                );
                Some(accepted.path)
            }
            None => None,
        };

        match self.repo.create_member(&fields, image.as_deref()).await {
            Ok(member) => {
                tracing::info!(parent: &self.span, id = %member.id, "Team member created");
                Ok(member)
            }
            Err(e) => {
                if let Some(path) = &image {
                    self.discard_blob(path).await;
                }
                Err(e)
            }
        }
    }

    pub async fn update(
        &self,
        id: &str,
        form: &MemberForm,
        upload: Option<&UploadCandidate>,
    ) -> Result<TeamMember, AppError> {
        let existing = self.get(id).await?;
        self.reject_truncated(upload)?;
        let fields = form.validate()?;

        let Some(candidate) = upload else {
            let member = self
                .repo
                .update_member(id, &fields, existing.profile_image.as_deref())
                .await?;
            tracing::info!(parent: &self.span, id = %id, "Team member updated");
            return Ok(member);
        };

        let accepted = self
            .validator
            .validate(Some(candidate), self.blobs.as_ref())
            .await?;

        if let Some(old) = &existing.profile_image {
            self.discard_blob(old).await;
        }

        match self
            .repo
            .update_member(id, &fields, Some(&accepted.path))
            .await
        {
            Ok(member) => {
                tracing::info!(parent: &self.span, id = %id, image = %accepted.path, "Team member updated");
                Ok(member)
            }
            Err(e) => {
                self.discard_blob(&accepted.path).await;
                Err(e)
            }
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let existing = self.get(id).await?;

        if let Some(path) = &existing.profile_image {
            self.discard_blob(path).await;
        }

        self.repo.delete_member(id).await?;
        tracing::info!(parent: &self.span, id = %id, "Team member deleted");
        Ok(())
    }

    /// A body cut off at the request limit leaves the form incomplete, so the
    /// limit is reported instead of missing fields.
    fn reject_truncated(&self, upload: Option<&UploadCandidate>) -> Result<(), AppError> {
        match upload {
            Some(candidate) if candidate.fault == Some(TransportFault::ExceedsRequestLimit) => {
                Ok(self.validator.check_transport(candidate)?)
            }
            _ => Ok(()),
        }
    }

    /// Best-effort blob removal; failures are logged and swallowed.
    async fn discard_blob(&self, path: &str) {
        match self.blobs.delete(path).await {
            Ok(true) => tracing::debug!(parent: &self.span, path = %path, "Deleted blob"),
            Ok(false) => tracing::debug!(parent: &self.span, path = %path, "Blob already gone"),
            Err(e) => tracing::warn!(parent: &self.span, path = %path, "Failed to delete blob: {}", e),
        }
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Team member {} not found", id))
}
