// Local uploads and image URL checks

use super::error::{Result, ValidationError};
use super::types::ImageFile;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Limits applied to uploaded files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadPolicy {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_accepted_types")]
    pub accepted_types: Vec<String>,
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_files() -> usize {
    10
}

fn default_accepted_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp", "image/gif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            max_files: default_max_files(),
            accepted_types: default_accepted_types(),
        }
    }
}

/// Outcome of checking a batch of files
#[derive(Debug, Default)]
pub struct UploadBatch {
    pub accepted: Vec<ImageFile>,
    pub rejected: Vec<ValidationError>,
}

impl UploadPolicy {
    pub fn check(&self, file: &ImageFile) -> std::result::Result<(), ValidationError> {
        if !self.accepted_types.iter().any(|t| t == &file.mime) {
            return Err(ValidationError::UnsupportedFileType {
                name: file.name.clone(),
                mime: file.mime.clone(),
            });
        }
        if file.is_empty() {
            return Err(ValidationError::EmptyFile {
                name: file.name.clone(),
            });
        }
        if file.len() as u64 > self.max_bytes {
            return Err(ValidationError::FileTooLarge {
                name: file.name.clone(),
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Split a batch into accepted and rejected files.
    ///
    /// A batch larger than `max_files` is rejected as a whole.
    pub fn check_batch(
        &self,
        files: Vec<ImageFile>,
    ) -> std::result::Result<UploadBatch, ValidationError> {
        if files.len() > self.max_files {
            return Err(ValidationError::TooManyFiles {
                max: self.max_files,
            });
        }

        let mut batch = UploadBatch::default();
        for file in files {
            match self.check(&file) {
                Ok(()) => batch.accepted.push(file),
                Err(reason) => batch.rejected.push(reason),
            }
        }
        Ok(batch)
    }
}

/// Guess an image MIME type from a path or URL extension
pub fn mime_from_path(path: &str) -> Option<&'static str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file_name.rsplit_once('.')?;

    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        _ => "png",
    }
}

/// Read a local image into an `ImageFile`
pub async fn load_file(path: impl AsRef<Path>) -> Result<ImageFile> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    let mime = mime_from_path(&name).unwrap_or("application/octet-stream");

    Ok(ImageFile::new(name, mime, bytes))
}

/// Check that a string parses as an http(s) URL with a host
pub fn validate_image_url(url: &str) -> std::result::Result<String, ValidationError> {
    let url = url.trim();
    let parsed = Url::parse(url).map_err(|_| ValidationError::InvalidUrl(url.to_string()))?;

    let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());
    if !matches!(parsed.scheme(), "http" | "https") || !has_host {
        return Err(ValidationError::InvalidUrl(url.to_string()));
    }

    Ok(url.to_string())
}
