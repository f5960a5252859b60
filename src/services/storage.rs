// src/services/storage.rs

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use axum::{extract::Multipart, http::HeaderMap};
use regex::Regex;

use crate::{config::MAX_UPLOAD_BYTES, error::AppError, models::content::UploadKind};

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9._-]+").expect("static filename regex is valid")
});

/// A file received in a multipart request, plus its text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file_name: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub fields: std::collections::HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// A file written below the upload root.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Name on disk (also the last URL segment).
    pub file_name: String,
    pub path: PathBuf,
}

/// Reduces a client-provided name to a safe basename.
pub fn sanitized_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c == '_');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}

/// Lowercased extension of a filename, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Rejects files whose extension is not allowed for `kind`.
pub fn validate_extension(kind: UploadKind, name: &str) -> Result<(), AppError> {
    match extension_of(name) {
        Some(ext) if kind.allowed_extensions().contains(&ext.as_str()) => Ok(()),
        _ => Err(AppError::BadRequest(format!(
            "Unsupported file type. Allowed: {}",
            kind.allowed_extensions().join(", ")
        ))),
    }
}

/// Base URL for links to uploaded files: the configured public URL, or the
/// request's `Host` header.
pub fn base_url(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:3000");
    let scheme = match headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .map(|p| p.trim().to_ascii_lowercase())
    {
        Some(p) if p == "https" => "https",
        _ => "http",
    };
    format!("{scheme}://{host}")
}

/// Public URL of a stored file.
pub fn public_url(base: &str, kind: UploadKind, file_name: &str) -> String {
    format!("{}/uploads/{}/{}", base.trim_end_matches('/'), kind.dir(), file_name)
}

/// Reads a multipart body: the part named `file_field` becomes the file,
/// every other part is kept as a text field.
pub async fn read_upload_form(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        if name == file_field {
            form.file_name = field.file_name().map(|s| s.to_string());
            let bytes = field.bytes().await?;
            if bytes.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::BadRequest("File is too large".to_string()));
            }
            form.bytes = Some(bytes.to_vec());
        } else {
            form.fields.insert(name, field.text().await?);
        }
    }

    Ok(form)
}

/// Writes `bytes` to `<root>/<kind>/<uuid>_<name>`.
pub async fn save(
    root: &str,
    kind: UploadKind,
    original_name: &str,
    bytes: &[u8],
) -> Result<StoredFile, AppError> {
    validate_extension(kind, original_name)?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }

    let dir = Path::new(root).join(kind.dir());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::internal(e, "Failed to create upload directory"))?;

    let file_name = format!(
        "{}_{}",
        uuid::Uuid::new_v4().simple(),
        sanitized_filename(original_name)
    );
    let path = dir.join(&file_name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AppError::internal(e, "Failed to write uploaded file"))?;

    tracing::info!(path = %path.display(), size = bytes.len(), "Stored upload");
    Ok(StoredFile { file_name, path })
}

/// Deletes a stored file by the name `save` returned. A missing file is not
/// an error.
pub async fn remove(root: &str, kind: UploadKind, file_name: &str) -> Result<(), AppError> {
    if file_name.is_empty()
        || file_name.contains(['/', '\\'])
        || file_name.contains("..")
    {
        return Err(AppError::BadRequest("Invalid stored file name".to_string()));
    }
    let path = Path::new(root).join(kind.dir()).join(file_name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Upload already gone");
            Ok(())
        }
        Err(e) => Err(AppError::internal(e, "Failed to delete uploaded file")),
    }
}

/// Best-effort `remove` for cleanup paths: a failure is logged, never
/// returned, so it cannot mask the error that triggered the cleanup.
pub async fn discard(root: &str, kind: UploadKind, file_name: &str) {
    if let Err(e) = remove(root, kind, file_name).await {
        tracing::warn!(error = %e, file_name, kind = kind.dir(), "Failed to discard upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn sanitized_filename_strips_paths_and_odd_chars() {
        assert_eq!(sanitized_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitized_filename("C:\\docs\\my notes.pdf"), "my_notes.pdf");
        assert_eq!(sanitized_filename("..."), "file");
        assert_eq!(sanitized_filename("ünï cødé.png"), "n_c_d_.png");
    }

    #[test]
    fn extension_checks_follow_kind() {
        assert!(validate_extension(UploadKind::ChatImage, "shot.PNG").is_ok());
        assert!(validate_extension(UploadKind::ChatImage, "shot.pdf").is_err());
        assert!(validate_extension(UploadKind::Document, "notes.pdf").is_ok());
        assert!(validate_extension(UploadKind::Video, "noext").is_err());
    }

    #[test]
    fn urls_embed_host_and_filename() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("api.example.com"));
        let base = base_url(None, &headers);
        assert_eq!(base, "http://api.example.com");
        assert_eq!(
            public_url(&base, UploadKind::Video, "abc_intro.mp4"),
            "http://api.example.com/uploads/videos/abc_intro.mp4"
        );

        assert_eq!(base_url(Some("https://cdn.test/"), &headers), "https://cdn.test");
    }

    #[tokio::test]
    async fn save_and_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();

        let stored = save(root, UploadKind::ChatImage, "pic.png", b"not really a png")
            .await
            .unwrap();
        assert!(stored.file_name.ends_with("_pic.png"));
        assert!(stored.path.starts_with(dir.path().join("chat")));
        assert!(tokio::fs::metadata(&stored.path).await.is_ok());

        remove(root, UploadKind::ChatImage, &stored.file_name)
            .await
            .unwrap();
        assert!(tokio::fs::metadata(&stored.path).await.is_err());
        // second delete is a no-op
        remove(root, UploadKind::ChatImage, &stored.file_name)
            .await
            .unwrap();
    }

    #[test]
    fn forwarded_proto_only_picks_http_or_https() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("api.example.com"));

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(base_url(None, &headers), "https://api.example.com");

        headers.insert(
            "x-forwarded-proto",
            HeaderValue::from_static("javascript:alert(1)//"),
        );
        let base = base_url(None, &headers);
        assert_eq!(base, "http://api.example.com");
        assert!(public_url(&base, UploadKind::ChatImage, "a.png").starts_with("http://"));
    }

    #[tokio::test]
    async fn remove_deletes_files_with_long_original_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let original = format!("{}.pdf", "a".repeat(90));

        let stored = save(root, UploadKind::Document, &original, b"%PDF")
            .await
            .unwrap();
        assert!(stored.file_name.len() > 100);

        remove(root, UploadKind::Document, &stored.file_name)
            .await
            .unwrap();
        assert!(tokio::fs::metadata(&stored.path).await.is_err());
    }

    #[tokio::test]
    async fn remove_refuses_names_that_leave_the_kind_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();

        for name in ["../secret.pdf", "a/b.pdf", "a\\b.pdf", ""] {
            let err = remove(root, UploadKind::Document, name).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn discard_swallows_removal_failures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        // A directory where the file should be makes remove_file fail.
        let blocker = dir.path().join("documents").join("stuck.pdf");
        tokio::fs::create_dir_all(&blocker).await.unwrap();

        assert!(remove(root, UploadKind::Document, "stuck.pdf").await.is_err());
        discard(root, UploadKind::Document, "stuck.pdf").await;
        discard(root, UploadKind::Document, "../escape.pdf").await;
        assert!(blocker.exists());
    }

    #[tokio::test]
    async fn save_rejects_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = save(dir.path().to_str().unwrap(), UploadKind::Document, "a.pdf", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
