// Image API - HTTP transport for the generate, edit and compose endpoints

use super::error::{Result, StudioError};
use super::request::{ComposeRequest, EditImage, EditRequest, GenerateRequest, ImageRequest};
use super::types::ImageFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the image service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout; image generation routinely takes tens of seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout for fetching remote images during transfers
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

/// Remote image operations. Each call returns the base64 image on success.
#[async_trait]
pub trait ImageApi: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    async fn edit(&self, request: &EditRequest) -> Result<String>;

    async fn compose(&self, request: &ComposeRequest) -> Result<String>;

    async fn dispatch(&self, request: &ImageRequest) -> Result<String> {
        match request {
            ImageRequest::Generate(r) => self.generate(r).await,
            ImageRequest::Edit(r) => self.edit(r).await,
            ImageRequest::Compose(r) => self.compose(r).await,
        }
    }
}

/// `ImageApi` over HTTP using reqwest
pub struct HttpImageApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpImageApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Image service responded");
        interpret_response(status, &body)
    }
}

#[async_trait]
impl ImageApi for HttpImageApi {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        info!(aspect_ratio = %request.aspect_ratio, "Requesting image generation");
        let builder = self
            .client
            .post(self.endpoint("generate_image"))
            .json(request);
        self.send(builder).await
    }

    async fn edit(&self, request: &EditRequest) -> Result<String> {
        info!(aspect_ratio = %request.aspect_ratio, "Requesting image edit");
        let mut form = Form::new()
            .text("prompt", request.prompt.clone())
            .text("aspect_ratio", request.aspect_ratio.as_str());
        if let Some(resolution) = request.output_resolution {
            form = form.text("output_resolution", resolution.as_str());
        }
        if let Some(format) = request.output_format {
            form = form.text("output_format", format.as_str());
        }
        form = match &request.image {
            EditImage::File(file) => form.part("image_file", file_part(file)?),
            EditImage::Url(url) => form.text("image_urls", url.clone()),
        };

        let builder = self.client.post(self.endpoint("edit_image")).multipart(form);
        self.send(builder).await
    }

    async fn compose(&self, request: &ComposeRequest) -> Result<String> {
        info!(images = request.images.len(), "Requesting image composition");
        let mut form = Form::new().text("prompt", request.prompt.clone());
        if let Some(aspect_ratio) = request.aspect_ratio {
            form = form.text("aspect_ratio", aspect_ratio.as_str());
        }
        if let Some(resolution) = request.output_resolution {
            form = form.text("output_resolution", resolution.as_str());
        }
        if let Some(format) = request.output_format {
            form = form.text("output_format", format.as_str());
        }
        for file in &request.images {
            form = form.part("image_files", file_part(file)?);
        }

        let builder = self
            .client
            .post(self.endpoint("compose_images"))
            .multipart(form);
        self.send(builder).await
    }
}

fn file_part(file: &ImageFile) -> Result<Part> {
    let part = Part::bytes(file.bytes.clone())
        .file_name(file.name.clone())
        .mime_str(&file.mime)?;
    Ok(part)
}

#[derive(Deserialize, Default)]
struct ImageResponse {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<String>,
}

/// Turn a status code and body into the base64 image or an error.
///
/// An `error` field wins regardless of status; otherwise any non-2xx status is
/// an error even when the body looks fine.
pub fn interpret_response(status: u16, body: &str) -> Result<String> {
    let parsed: Option<ImageResponse> = serde_json::from_str(body).ok();

    if let Some(error) = parsed.as_ref().and_then(|p| p.error.as_ref()) {
        let message = match error {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(StudioError::Api(message));
    }

    if !(200..300).contains(&status) {
        let text = body.trim();
        let message = if text.is_empty() {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("request failed")
                .to_string()
        } else {
            text.to_string()
        };
        return Err(StudioError::Http { status, message });
    }

    let parsed = parsed.ok_or_else(|| StudioError::Parse("response is not valid JSON".to_string()))?;

    match parsed.image.filter(|image| !image.is_empty()) {
        Some(image) => Ok(image),
        None => Err(StudioError::NoImage(
            parsed
                .response
                .or(parsed.message)
                .unwrap_or_else(|| "No image generated".to_string()),
        )),
    }
}
