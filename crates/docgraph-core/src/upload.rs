//! Document selection and upload error reporting.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use reqwest::StatusCode;

use crate::error::{ApiError, FileRejected};

pub const MEDIA_PDF: &str = "application/pdf";
pub const MEDIA_TEXT: &str = "text/plain";

/// Best guess at a file's media type from its extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => MEDIA_PDF,
        "txt" | "text" | "log" => MEDIA_TEXT,
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

pub fn is_accepted_media_type(media_type: &str) -> bool {
    media_type == MEDIA_PDF || media_type == MEDIA_TEXT
}

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub path: Option<PathBuf>,
    pub name: String,
    pub size: u64,
    pub media_type: String,
}

impl FileSelection {
    pub fn new(name: impl Into<String>, size: u64, media_type: impl Into<String>) -> Self {
        Self {
            path: None,
            name: name.into(),
            size,
            media_type: media_type.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path: Some(path.to_path_buf()),
            name,
            size: metadata.len(),
            media_type: media_type_for(path).to_string(),
        })
    }

    pub fn is_accepted(&self) -> bool {
        is_accepted_media_type(&self.media_type)
    }

    /// Reject anything that is not a PDF or plain text file.
    pub fn check(self) -> Result<Self, FileRejected> {
        if self.is_accepted() {
            Ok(self)
        } else {
            Err(FileRejected::UnsupportedType {
                media_type: self.media_type,
            })
        }
    }

    pub fn display_size(&self) -> String {
        format_file_size(self.size)
    }
}

/// Human-readable size: "0 Bytes", "512 Bytes", "1.5 KB", "2.25 MB".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let mut number = format!("{:.2}", value);
    if number.contains('.') {
        number = number.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{} {}", number, UNITS[unit])
}

/// Why an upload failed, as far as we can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    NoExtractableText,
    TooLarge,
    Other(String),
}

static NO_TEXT: OnceLock<Option<Regex>> = OnceLock::new();
static FILE_SIZE: OnceLock<Option<Regex>> = OnceLock::new();

fn mentions(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

impl UploadFailure {
    /// Prefer the server's error code or status; fall back to matching the message.
    pub fn classify(err: &ApiError) -> Self {
        match err.code() {
            Some("no_text_content") | Some("empty_document") => return UploadFailure::NoExtractableText,
            Some("file_too_large") => return UploadFailure::TooLarge,
            _ => {}
        }
        if err.status() == Some(StatusCode::PAYLOAD_TOO_LARGE) {
            return UploadFailure::TooLarge;
        }

        let message = err.to_string();
        if mentions(&NO_TEXT, r"(?i)no text content could be extracted", &message) {
            UploadFailure::NoExtractableText
        } else if mentions(&FILE_SIZE, r"(?i)file size", &message) {
            UploadFailure::TooLarge
        } else {
            UploadFailure::Other(message)
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            UploadFailure::NoExtractableText => "The file appears to be empty or contains no extractable text. Please check the file and try again.".to_string(),
            UploadFailure::TooLarge => "The file is too large. Please try a smaller file.".to_string(),
            UploadFailure::Other(message) => format!("Error uploading document: {}", message),
        }
    }
}
