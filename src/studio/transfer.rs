// Transfer pipeline - turns a displayed image back into a file for resubmission

use super::error::{Result, StudioError};
use super::types::{ImageFile, ImageId, ImageKind, ImageRecord};
use super::upload::{extension_for_mime, mime_from_path};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::time::Duration;
use tracing::debug;

/// Bytes fetched from a remote image URL
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

/// Fetches remote image sources
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

/// `SourceFetcher` backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        debug!(url, "Fetching image source");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StudioError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StudioError::Fetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        if let Some(mime) = &mime {
            if !mime.starts_with("image/") {
                return Err(StudioError::Fetch(
                    "URL does not point to a valid image".to_string(),
                ));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StudioError::Fetch(e.to_string()))?;

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            mime,
        })
    }
}

pub fn is_remote(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

/// Decode a `data:<mime>;base64,<payload>` URI into its MIME type and bytes
pub fn parse_data_uri(src: &str) -> Result<(String, Vec<u8>)> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| StudioError::MalformedSource("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| StudioError::MalformedSource("data URI has no payload".to_string()))?;

    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if !params.any(|p| p.trim() == "base64") {
        return Err(StudioError::MalformedSource(
            "data URI is not base64 encoded".to_string(),
        ));
    }

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(cleaned.as_bytes())?;
    let mime = if mime.is_empty() { "image/png" } else { mime };

    Ok((mime.to_string(), bytes))
}

/// Convert an image source into a named file.
///
/// Data URIs are decoded in-process; http(s) URLs go through `fetcher`.
pub async fn src_to_file(fetcher: &dyn SourceFetcher, src: &str, name: &str) -> Result<ImageFile> {
    let (mime, bytes) = if src.starts_with("data:") {
        parse_data_uri(src)?
    } else if is_remote(src) {
        let fetched = fetcher.fetch(src).await?;
        let mime = fetched
            .mime
            .or_else(|| mime_from_path(src).map(str::to_string))
            .unwrap_or_else(|| "image/png".to_string());
        (mime, fetched.bytes)
    } else {
        return Err(StudioError::MalformedSource(format!(
            "unsupported image source: {}",
            truncate(src, 48)
        )));
    };

    if bytes.is_empty() {
        return Err(StudioError::MalformedSource("image source is empty".to_string()));
    }

    let extension = extension_for_mime(&mime);
    let name = if name.contains('.') {
        name.to_string()
    } else {
        format!("{}.{}", name, extension)
    };

    Ok(ImageFile::new(name, mime, bytes))
}

/// Build a `transferred` copy of `source` carrying its file data.
///
/// Prompt, timestamp and aspect ratio are carried forward.
pub async fn transfer_record(
    fetcher: &dyn SourceFetcher,
    source: &ImageRecord,
    new_id: ImageId,
) -> Result<ImageRecord> {
    let file_stem = format!("{}-image-{}", source.kind.as_str(), source.id);
    let file = src_to_file(fetcher, &source.src, &file_stem).await?;

    let mut record = ImageRecord::new(new_id, source.src.clone(), ImageKind::Transferred)
        .with_timestamp(source.timestamp)
        .with_name(file.name.clone())
        .with_file(file);
    if let Some(prompt) = &source.prompt {
        record = record.with_prompt(prompt.clone());
    }
    if let Some(aspect_ratio) = source.aspect_ratio {
        record = record.with_aspect_ratio(aspect_ratio);
    }

    Ok(record)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}
