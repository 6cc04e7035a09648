//! Profile image upload validation.
//!
//! A candidate file is checked for transport faults, the size ceiling and its
//! MIME category, probed for dimensions (diagnostics only) and then written to
//! the blob store. Every failure comes back as an [`UploadError`] variant.

use bytes::Bytes;
use thiserror::Error;
use tracing::Span;

use crate::config::TransportLimits;
use crate::storage::BlobStore;

/// Blob store namespace for profile images.
pub const PROFILE_IMAGE_NAMESPACE: &str = "team-members";

/// Size ceiling in KiB (30 MiB).
pub const MAX_IMAGE_KIB: u64 = 30_720;

/// Image types accepted without a warning.
pub const KNOWN_IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/svg+xml",
    "image/x-icon",
    "image/tiff",
    "image/tif",
    "image/heic",
    "image/heif",
];

/// Why the transport layer could not hand over a usable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFault {
    /// The file alone exceeded the per-file upload limit.
    ExceedsUploadLimit,
    /// The whole request body exceeded the request limit.
    ExceedsRequestLimit,
    /// The file stream ended early or could not be read.
    Partial(String),
    /// No file was received.
    Missing,
}

impl TransportFault {
    pub fn code(&self) -> &'static str {
        match self {
            TransportFault::ExceedsUploadLimit => "upload_limit_exceeded",
            TransportFault::ExceedsRequestLimit => "request_limit_exceeded",
            TransportFault::Partial(_) => "partial_upload",
            TransportFault::Missing => "no_file",
        }
    }
}

/// An uploaded file that has not been validated yet.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub file_name: Option<String>,
    /// Content type claimed by the client.
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub fault: Option<TransportFault>,
}

impl UploadCandidate {
    pub fn new(
        file_name: Option<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
            fault: None,
        }
    }

    /// A candidate the transport layer flagged as unusable.
    pub fn faulted(file_name: Option<String>, fault: TransportFault) -> Self {
        Self {
            file_name,
            content_type: None,
            bytes: Bytes::new(),
            fault: Some(fault),
        }
    }

    fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("unknown")
    }
}

/// A candidate that passed validation and is now stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedUpload {
    pub path: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub dimensions: Option<(usize, usize)>,
}

/// Upload failure taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error("{message}")]
    InvalidFile { code: &'static str, message: String },
    #[error("The image is too large. Maximum size is 30MB.")]
    TooLarge { size_bytes: u64 },
    #[error("The file must be an image. Detected type: {mime_type}")]
    UnsupportedType { mime_type: String },
    #[error("The profile image failed to upload. Please try again.")]
    StorageWriteFailed,
    #[error("The profile image failed to upload: {0}")]
    InternalError(String),
}

/// Decides whether a candidate may become a stored profile image.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    limits: TransportLimits,
    span: Span,
}

impl UploadValidator {
    pub fn new(limits: TransportLimits, span: Span) -> Self {
        Self { limits, span }
    }

    /// Reject a candidate the transport layer already flagged.
    pub fn check_transport(&self, candidate: &UploadCandidate) -> Result<(), UploadError> {
        match &candidate.fault {
            Some(fault) => Err(self.invalid(fault)),
            None => Ok(()),
        }
    }

    /// Validate `candidate` and store it in `blobs` under [`PROFILE_IMAGE_NAMESPACE`].
    pub async fn validate(
        &self,
        candidate: Option<&UploadCandidate>,
        blobs: &dyn BlobStore,
    ) -> Result<AcceptedUpload, UploadError> {
        let Some(candidate) = candidate else {
            return Err(self.invalid(&TransportFault::Missing));
        };
        self.check_transport(candidate)?;

        let size_bytes = candidate.bytes.len() as u64;
        if size_bytes > MAX_IMAGE_KIB * 1024 {
            tracing::info!(parent: &self.span, size_bytes, "Rejected oversized image");
            return Err(UploadError::TooLarge { size_bytes });
        }

        let dimensions = self
            .probe_dimensions(candidate.bytes.clone(), size_bytes)
            .await?;

        let sniffed = infer::get(&candidate.bytes);
        let mime_type = match sniffed {
            Some(kind) => kind.mime_type().to_string(),
            None => unsniffed_mime(
                candidate.content_type.as_deref(),
                &candidate.bytes,
                dimensions.is_some(),
            ),
        };

        if !KNOWN_IMAGE_MIME_TYPES.contains(&mime_type.as_str()) {
            tracing::warn!(
                parent: &self.span,
                mime = %mime_type,
                filename = candidate.display_name(),
                "Unsupported MIME type"
            );
            if !mime_type.starts_with("image/") {
                return Err(UploadError::UnsupportedType { mime_type });
            }
        }

        let extension = sniffed
            .map(|kind| kind.extension().to_string())
            .or_else(|| extension_for_mime(&mime_type).map(str::to_string))
            .or_else(|| candidate.file_name.as_deref().and_then(client_extension))
            .unwrap_or_else(|| "bin".to_string());

        let path = match blobs
            .put(PROFILE_IMAGE_NAMESPACE, &candidate.bytes, &extension)
            .await
        {
            Ok(Some(path)) if !path.is_empty() => path,
            Ok(_) => {
                tracing::error!(
                    parent: &self.span,
                    filename = candidate.display_name(),
                    mime = %mime_type,
                    size_bytes,
                    "File store returned no path"
                );
                return Err(UploadError::StorageWriteFailed);
            }
            Err(e) => {
                tracing::error!(
                    parent: &self.span,
                    filename = candidate.display_name(),
                    "Image upload error: {}",
                    e
                );
                return Err(UploadError::InternalError(e.to_string()));
            }
        };

        tracing::info!(
            parent: &self.span,
            path = %path,
            mime = %mime_type,
            size_bytes,
            "Image uploaded successfully"
        );

        Ok(AcceptedUpload {
            path,
            mime_type,
            size_bytes,
            dimensions,
        })
    }

    fn invalid(&self, fault: &TransportFault) -> UploadError {
        let code = fault.code();
        let mut message = format!("The uploaded file is not valid. Error code: {code}");
        match fault {
            TransportFault::ExceedsUploadLimit => message.push_str(&format!(
                ". Server upload limit is {}. Please increase TEAM_UPLOAD_MAX_FILESIZE and TEAM_POST_MAX_SIZE.",
                self.limits.upload_max_filesize
            )),
            TransportFault::ExceedsRequestLimit => message.push_str(&format!(
                ". Server request limit is {}. Please increase TEAM_UPLOAD_MAX_FILESIZE and TEAM_POST_MAX_SIZE.",
                self.limits.post_max_size
            )),
            TransportFault::Partial(_) | TransportFault::Missing => {}
        }

        tracing::error!(
            parent: &self.span,
            error = code,
            upload_max_filesize = %self.limits.upload_max_filesize,
            post_max_size = %self.limits.post_max_size,
            "Invalid file upload"
        );

        UploadError::InvalidFile { code, message }
    }

    /// Best-effort width/height probe. Only a crashed probe is an error.
    async fn probe_dimensions(
        &self,
        bytes: Bytes,
        size_bytes: u64,
    ) -> Result<Option<(usize, usize)>, UploadError> {
        let probe = tokio::task::spawn_blocking(move || imagesize::blob_size(&bytes));

        match probe.await {
            Ok(Ok(size)) => {
                tracing::info!(
                    parent: &self.span,
                    width = size.width,
                    height = size.height,
                    size_bytes,
                    "Image dimensions"
                );
                Ok(Some((size.width, size.height)))
            }
            Ok(Err(e)) => {
                tracing::debug!(parent: &self.span, "Dimension probe failed: {}", e);
                Ok(None)
            }
            Err(e) => Err(UploadError::InternalError(format!(
                "dimension probe aborted: {e}"
            ))),
        }
    }
}

/// Type for content `infer` does not recognise.
///
/// A claimed image type is kept only when the probe found dimensions. SVG is
/// recognised from its markup. Anything else is reported as text or opaque
/// binary.
fn unsniffed_mime(claimed: Option<&str>, bytes: &[u8], has_dimensions: bool) -> String {
    if looks_like_svg(bytes) {
        return "image/svg+xml".to_string();
    }
    if has_dimensions {
        if let Some(mime) = claimed.map(normalize_mime).filter(|m| m.starts_with("image/")) {
            return mime;
        }
    }
    if std::str::from_utf8(bytes).is_ok() {
        "text/plain".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with('<') && text.contains("<svg")
}

/// Lowercase and drop any `; param=...` suffix.
fn normalize_mime(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/x-icon" => "ico",
        "image/tiff" | "image/tif" => "tiff",
        "image/heic" => "heic",
        "image/heif" => "heif",
        _ => return None,
    };
    Some(ext)
}

fn client_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBlobStore;
    use crate::testing::{BrokenBlobStore, RefusingBlobStore, TINY_PNG};
    use tempfile::TempDir;

    fn validator() -> UploadValidator {
        UploadValidator::new(TransportLimits::default(), Span::none())
    }

    fn png(bytes: &[u8]) -> UploadCandidate {
        UploadCandidate::new(
            Some("avatar.png".to_string()),
            Some("image/png".to_string()),
            bytes.to_vec(),
        )
    }

    #[tokio::test]
    async fn test_accepts_png_and_stores_it() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let accepted = validator()
            .validate(Some(&png(TINY_PNG)), &blobs)
            .await
            .unwrap();

        assert!(accepted.path.starts_with("team-members/"));
        assert!(accepted.path.ends_with(".png"));
        assert_eq!(accepted.mime_type, "image/png");
        assert_eq!(accepted.size_bytes, TINY_PNG.len() as u64);
        assert_eq!(accepted.dimensions, Some((1, 1)));
        assert_eq!(blobs.get(&accepted.path).await.unwrap().unwrap(), TINY_PNG);
    }

    #[tokio::test]
    async fn test_missing_candidate_is_invalid() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let err = validator().validate(None, &blobs).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidFile { code: "no_file", .. }));
    }

    #[tokio::test]
    async fn test_size_limit_fault_names_configured_limit() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());
        let limits = TransportLimits::new("2M", "8M").unwrap();
        let validator = UploadValidator::new(limits, Span::none());

        let candidate = UploadCandidate::faulted(
            Some("huge.png".to_string()),
            TransportFault::ExceedsUploadLimit,
        );
        let err = validator.validate(Some(&candidate), &blobs).await.unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("The uploaded file is not valid. Error code: upload_limit_exceeded"));
        assert!(message.contains("Server upload limit is 2M"));
    }

    #[tokio::test]
    async fn test_partial_fault_has_no_limit_hint() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let candidate = UploadCandidate::faulted(None, TransportFault::Partial("eof".to_string()));
        let err = validator().validate(Some(&candidate), &blobs).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "The uploaded file is not valid. Error code: partial_upload"
        );
    }

    #[tokio::test]
    async fn test_size_ceiling_boundary() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let mut at_limit = TINY_PNG.to_vec();
        at_limit.resize((MAX_IMAGE_KIB * 1024) as usize, 0);
        assert!(validator().validate(Some(&png(&at_limit)), &blobs).await.is_ok());

        at_limit.push(0);
        let err = validator()
            .validate(Some(&png(&at_limit)), &blobs)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UploadError::TooLarge {
                size_bytes: MAX_IMAGE_KIB * 1024 + 1
            }
        );
    }

    #[tokio::test]
    async fn test_non_image_is_rejected_without_writing() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let candidate = UploadCandidate::new(
            Some("notes.txt".to_string()),
            Some("text/plain".to_string()),
            b"just some words".to_vec(),
        );
        let err = validator().validate(Some(&candidate), &blobs).await.unwrap_err();

        assert_eq!(
            err,
            UploadError::UnsupportedType {
                mime_type: "text/plain".to_string()
            }
        );
        assert!(!dir.path().join(PROFILE_IMAGE_NAMESPACE).exists());
    }

    #[tokio::test]
    async fn test_sniffed_type_wins_over_claimed_type() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        // PDF magic bytes dressed up as a PNG.
        let candidate = UploadCandidate::new(
            Some("cv.png".to_string()),
            Some("image/png".to_string()),
            b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec(),
        );
        let err = validator().validate(Some(&candidate), &blobs).await.unwrap_err();
        assert_eq!(
            err,
            UploadError::UnsupportedType {
                mime_type: "application/pdf".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unlisted_image_type_is_accepted() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        // Farbfeld header: magic, then big-endian width and height.
        let mut farbfeld = b"farbfeld".to_vec();
        farbfeld.extend_from_slice(&2u32.to_be_bytes());
        farbfeld.extend_from_slice(&3u32.to_be_bytes());
        farbfeld.extend_from_slice(&[0xFF; 2 * 3 * 8]);

        let candidate = UploadCandidate::new(
            Some("sprite.ff".to_string()),
            Some("image/x-farbfeld; charset=binary".to_string()),
            farbfeld,
        );
        let accepted = validator().validate(Some(&candidate), &blobs).await.unwrap();

        assert_eq!(accepted.mime_type, "image/x-farbfeld");
        assert!(accepted.path.ends_with(".ff"));
        assert_eq!(accepted.dimensions, Some((2, 3)));
    }

    #[tokio::test]
    async fn test_claimed_image_type_needs_image_content() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let err = validator()
            .validate(Some(&png(b"hello")), &blobs)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UploadError::UnsupportedType {
                mime_type: "text/plain".to_string()
            }
        );

        let err = validator()
            .validate(Some(&png(&[0x00, 0x9F, 0x92, 0x96, 0x01])), &blobs)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UploadError::UnsupportedType {
                mime_type: "application/octet-stream".to_string()
            }
        );
        assert!(!dir.path().join(PROFILE_IMAGE_NAMESPACE).exists());
    }

    #[tokio::test]
    async fn test_html_claimed_as_svg_is_rejected() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let candidate = UploadCandidate::new(
            Some("logo.svg".to_string()),
            Some("image/svg+xml".to_string()),
            b"<html><body>not a drawing</body></html>".to_vec(),
        );
        let err = validator().validate(Some(&candidate), &blobs).await.unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType { .. }));
    }

    #[tokio::test]
    async fn test_svg_recognised_from_markup() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());

        let candidate = UploadCandidate::new(
            Some("logo.svg".to_string()),
            Some("image/svg+xml".to_string()),
            br#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"></svg>"#.to_vec(),
        );
        let accepted = validator().validate(Some(&candidate), &blobs).await.unwrap();
        assert_eq!(accepted.mime_type, "image/svg+xml");
        assert!(accepted.path.ends_with(".svg"));
    }

    #[tokio::test]
    async fn test_refused_write_is_storage_failure() {
        let err = validator()
            .validate(Some(&png(TINY_PNG)), &RefusingBlobStore)
            .await
            .unwrap_err();
        assert_eq!(err, UploadError::StorageWriteFailed);
    }

    #[tokio::test]
    async fn test_backend_error_is_internal_error() {
        let err = validator()
            .validate(Some(&png(TINY_PNG)), &BrokenBlobStore)
            .await
            .unwrap_err();
        match err {
            UploadError::InternalError(message) => assert!(message.contains("disk unplugged")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_transport_passes_clean_candidate() {
        let limits = TransportLimits::new("1M", "2K").unwrap();
        let validator = UploadValidator::new(limits, Span::none());

        assert!(validator.check_transport(&png(TINY_PNG)).is_ok());

        let truncated = UploadCandidate::faulted(None, TransportFault::ExceedsRequestLimit);
        let message = validator.check_transport(&truncated).unwrap_err().to_string();
        assert!(message.contains("request_limit_exceeded"));
        assert!(message.contains("Server request limit is 2K"));
    }

    #[test]
    fn test_client_extension() {
        assert_eq!(client_extension("photo.JPEG").as_deref(), Some("jpeg"));
        assert_eq!(client_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(client_extension("noext"), None);
        assert_eq!(client_extension("weird.p/ng"), None);
    }
}
