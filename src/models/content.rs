// src/models/content.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::config::{DOCUMENT_EXTENSIONS, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

/// Kinds of files stored under the upload directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Video,
    Document,
    ChatImage,
}

impl UploadKind {
    /// Sub-directory below the upload root, also the URL segment.
    pub fn dir(&self) -> &'static str {
        match self {
            UploadKind::Video => "videos",
            UploadKind::Document => "documents",
            UploadKind::ChatImage => "chat",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Video => VIDEO_EXTENSIONS,
            UploadKind::Document => DOCUMENT_EXTENSIONS,
            UploadKind::ChatImage => IMAGE_EXTENSIONS,
        }
    }

    /// Table holding course material of this kind.
    pub fn table(&self) -> Option<&'static str> {
        match self {
            UploadKind::Video => Some("videos"),
            UploadKind::Document => Some("documents"),
            UploadKind::ChatImage => None,
        }
    }
}

/// A row of the 'videos' or 'documents' table. Both share one shape.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CourseMaterial {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub url: String,
    #[serde(skip)]
    pub file_name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}
