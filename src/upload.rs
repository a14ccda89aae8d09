use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::api::{ApiClient, ApiResponse, API_UPLOAD_PREPARE, API_UPLOAD_URL};
use crate::document::{MediaKind, SourceKind};

/// Media resolution failure. `Status` variants are remote calls that
/// answered with a non-success code; `MissingForm`/`MissingEndpoint`/
/// `MissingFileId` are calls that succeeded on the wire but returned an
/// unusable body.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot infer a file type from the extension of '{0}'")]
    UnknownFileType(String),
    #[error("declared file type '{declared}' does not match the extension-derived type '{derived}'")]
    KindMismatch { declared: MediaKind, derived: MediaKind },
    #[error("'{0}' has no usable file name")]
    BadFileName(String),
    #[error("failed to read '{path}': {source}")]
    Io { path: String, source: std::io::Error },
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{call} returned status {status}: {body}")]
    Status {
        call: &'static str,
        status: u16,
        body: String,
    },
    #[error("upload prepare response missing 'form' fields")]
    MissingForm,
    #[error("upload form missing 'endpoint' field")]
    MissingEndpoint,
    #[error("upload response missing file identifier")]
    MissingFileId,
}

/// Resolves a media descriptor to the stable identifier the note body
/// embeds. The seam exists so the conversion engine can be exercised
/// without network access.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(
        &self,
        kind: MediaKind,
        source: SourceKind,
        path: &str,
    ) -> Result<String, UploadError>;
}

/// One-shot upload form returned by the prepare call: the target endpoint
/// plus the fields to replay verbatim. Consumed by a single upload and
/// never persisted or reused.
pub struct UploadSession {
    pub endpoint: String,
    pub fields: HashMap<String, String>,
}

impl UploadSession {
    pub fn from_response(resp: &ApiResponse) -> Result<Self, UploadError> {
        let form = resp
            .body
            .as_ref()
            .and_then(|b| b.get("form"))
            .and_then(|f| f.as_object())
            .ok_or(UploadError::MissingForm)?;

        let mut endpoint = None;
        let mut fields = HashMap::new();
        for (key, value) in form {
            let value = value.as_str().ok_or(UploadError::MissingForm)?.to_string();
            if key == "endpoint" {
                endpoint = Some(value);
            } else {
                fields.insert(key.clone(), value);
            }
        }

        Ok(Self {
            endpoint: endpoint.ok_or(UploadError::MissingEndpoint)?,
            fields,
        })
    }
}

/// Uploads media through the note service and returns hosted file ids.
pub struct Uploader<'a> {
    api: &'a ApiClient,
}

impl<'a> Uploader<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Two-phase local upload: prepare for a one-shot session form, then
    /// multipart-post the file bytes to the endpoint the form names.
    async fn upload_local(&self, declared: MediaKind, path: &str) -> Result<String, UploadError> {
        let derived = kind_for_path(path)?;
        if derived != declared {
            return Err(UploadError::KindMismatch { declared, derived });
        }
        let file_name = file_name_of(path)?.to_string();

        log::info!("Uploading local {} file: {}", declared, path);

        let payload = serde_json::json!({
            "fileType": declared.type_code(),
            "fileName": file_name,
        });
        let prepare = self.api.post_json(API_UPLOAD_PREPARE, &payload).await?;
        if !prepare.is_ok() {
            return Err(UploadError::Status {
                call: "upload prepare",
                status: prepare.status.as_u16(),
                body: prepare.raw,
            });
        }
        let session = UploadSession::from_response(&prepare)?;

        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_string(),
            source,
        })?;

        let mut form = reqwest::multipart::Form::new();
        for (key, value) in &session.fields {
            form = form.text(key.clone(), value.clone());
        }
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type_for(path))?;
        form = form.part("file", part);

        let upload = self.api.multipart_upload(&session.endpoint, form).await?;
        let status = upload.status.as_u16();
        if status != 200 && status != 204 {
            return Err(UploadError::Status {
                call: "upload",
                status,
                body: upload.raw,
            });
        }

        file_id_from(&upload)
    }

    /// Single-call relay: the service fetches the URL and hosts it itself.
    async fn upload_from_url(&self, kind: MediaKind, url: &str) -> Result<String, UploadError> {
        log::info!("Relaying {} upload from URL: {}", kind, url);

        let payload = serde_json::json!({
            "fileType": kind.type_code(),
            "url": url,
            "fileName": file_name_from_url(url),
        });
        let resp = self.api.post_json(API_UPLOAD_URL, &payload).await?;
        if !resp.is_ok() {
            return Err(UploadError::Status {
                call: "url upload",
                status: resp.status.as_u16(),
                body: resp.raw,
            });
        }

        file_id_from(&resp)
    }
}

#[async_trait]
impl MediaResolver for Uploader<'_> {
    async fn resolve(
        &self,
        kind: MediaKind,
        source: SourceKind,
        path: &str,
    ) -> Result<String, UploadError> {
        match source {
            SourceKind::Local => self.upload_local(kind, path).await,
            SourceKind::Url => self.upload_from_url(kind, path).await,
        }
    }
}

fn file_id_from(resp: &ApiResponse) -> Result<String, UploadError> {
    resp.str_field("/file/fileId")
        .map(str::to_string)
        .ok_or(UploadError::MissingFileId)
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Extension-derived media kind, independent of what the caller declared.
fn kind_for_path(path: &str) -> Result<MediaKind, UploadError> {
    match extension_of(path).as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" => Ok(MediaKind::Image),
        "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a" => Ok(MediaKind::Audio),
        "pdf" => Ok(MediaKind::Pdf),
        _ => Err(UploadError::UnknownFileType(path.to_string())),
    }
}

/// Content type for the multipart file part, inferred from the extension.
fn content_type_for(path: &str) -> &'static str {
    match extension_of(path).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn file_name_of(path: &str) -> Result<&str, UploadError> {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| UploadError::BadFileName(path.to_string()))
}

/// Last path segment of the URL, which the relay endpoint uses as the
/// hosted file name.
fn file_name_from_url(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;

    fn response_with(body: serde_json::Value) -> ApiResponse {
        ApiResponse {
            status: StatusCode::OK,
            body: Some(body),
            raw: String::new(),
        }
    }

    #[test]
    fn test_kind_for_path() {
        assert_eq!(kind_for_path("/a/photo.JPG").unwrap(), MediaKind::Image);
        assert_eq!(kind_for_path("clip.webp").unwrap(), MediaKind::Image);
        assert_eq!(kind_for_path("song.m4a").unwrap(), MediaKind::Audio);
        assert_eq!(kind_for_path("paper.pdf").unwrap(), MediaKind::Pdf);
        assert!(matches!(
            kind_for_path("notes.txt"),
            Err(UploadError::UnknownFileType(_))
        ));
        assert!(matches!(
            kind_for_path("no_extension"),
            Err(UploadError::UnknownFileType(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_kind_rejected_before_any_request() {
        // The cross-check runs before the prepare call, so an unreachable
        // client never gets contacted.
        let api = ApiClient::new("http://127.0.0.1:9".to_string(), "k".to_string());
        let err = Uploader::new(&api)
            .resolve(MediaKind::Image, SourceKind::Local, "/tmp/song.mp3")
            .await
            .unwrap_err();
        match err {
            UploadError::KindMismatch { declared, derived } => {
                assert_eq!(declared, MediaKind::Image);
                assert_eq!(derived, MediaKind::Audio);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_content_type_defaults_to_octet_stream() {
        assert_eq!(content_type_for("x.png"), "image/png");
        assert_eq!(content_type_for("x.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("x.weird"), "application/octet-stream");
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_from_url("https://h/a/b/pic.jpg"), "pic.jpg");
        assert_eq!(file_name_from_url("https://h/a/b/"), "b");
    }

    #[test]
    fn test_session_from_response() {
        let resp = response_with(json!({
            "form": {"endpoint": "https://oss/up", "key": "k1", "policy": "p1"}
        }));
        let session = UploadSession::from_response(&resp).unwrap();
        assert_eq!(session.endpoint, "https://oss/up");
        assert_eq!(session.fields.len(), 2);
        assert_eq!(session.fields.get("key").map(String::as_str), Some("k1"));
        assert!(!session.fields.contains_key("endpoint"));
    }

    #[test]
    fn test_session_missing_form() {
        let resp = response_with(json!({"other": 1}));
        assert!(matches!(
            UploadSession::from_response(&resp),
            Err(UploadError::MissingForm)
        ));
    }

    #[test]
    fn test_session_missing_endpoint() {
        let resp = response_with(json!({"form": {"key": "k1"}}));
        assert!(matches!(
            UploadSession::from_response(&resp),
            Err(UploadError::MissingEndpoint)
        ));
    }

    #[test]
    fn test_file_id_extraction() {
        let ok = response_with(json!({"file": {"fileId": "f-7"}}));
        assert_eq!(file_id_from(&ok).unwrap(), "f-7");

        let missing = response_with(json!({"file": {}}));
        assert!(matches!(file_id_from(&missing), Err(UploadError::MissingFileId)));
    }
}
