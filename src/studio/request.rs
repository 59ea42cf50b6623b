// Request builder - turns a tab's form into exactly one typed request

use super::error::ValidationError;
use super::types::{AspectRatio, ImageFile, ImageRecord, OutputFormat, Resolution, Tab};
use serde::Serialize;
use tracing::debug;

/// Form fields shared by all three tabs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabForm {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub format: OutputFormat,
}

impl TabForm {
    /// The prompt, if it contains anything besides whitespace
    fn checked_prompt(&self) -> Result<String, ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        Ok(self.prompt.clone())
    }
}

/// JSON body of `POST /api/generate_image`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
}

/// The single image an edit is applied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditImage {
    File(ImageFile),
    Url(String),
}

/// Multipart body of `POST /api/edit_image`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub output_resolution: Option<Resolution>,
    pub output_format: Option<OutputFormat>,
    pub image: EditImage,
}

/// Multipart body of `POST /api/compose_images`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRequest {
    pub prompt: String,
    pub aspect_ratio: Option<AspectRatio>,
    pub output_resolution: Option<Resolution>,
    pub output_format: Option<OutputFormat>,
    pub images: Vec<ImageFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRequest {
    Generate(GenerateRequest),
    Edit(EditRequest),
    Compose(ComposeRequest),
}

impl ImageRequest {
    pub fn tab(&self) -> Tab {
        match self {
            ImageRequest::Generate(_) => Tab::Generate,
            ImageRequest::Edit(_) => Tab::Edit,
            ImageRequest::Compose(_) => Tab::Compose,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            ImageRequest::Generate(r) => &r.prompt,
            ImageRequest::Edit(r) => &r.prompt,
            ImageRequest::Compose(r) => &r.prompt,
        }
    }

    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        match self {
            ImageRequest::Generate(r) => Some(r.aspect_ratio),
            ImageRequest::Edit(r) => Some(r.aspect_ratio),
            ImageRequest::Compose(r) => r.aspect_ratio,
        }
    }
}

pub fn build_generate(form: &TabForm) -> Result<GenerateRequest, ValidationError> {
    let prompt = form.checked_prompt()?;
    debug!(aspect_ratio = %form.aspect_ratio, "Building generate request");

    Ok(GenerateRequest {
        prompt,
        aspect_ratio: form.aspect_ratio,
        output_resolution: Some(form.resolution),
        output_format: Some(form.format),
    })
}

/// Build an edit request.
///
/// Source precedence: the selected working image (when it carries file data),
/// then a non-blank URL, then the raw uploaded file.
pub fn build_edit(
    form: &TabForm,
    selected: Option<&ImageRecord>,
    url: &str,
    upload: Option<&ImageFile>,
) -> Result<EditRequest, ValidationError> {
    let prompt = form.checked_prompt()?;

    let image = if let Some(file) = selected.and_then(|r| r.file.as_ref()) {
        EditImage::File(file.clone())
    } else if !url.trim().is_empty() {
        EditImage::Url(url.trim().to_string())
    } else if let Some(file) = upload {
        EditImage::File(file.clone())
    } else {
        return Err(ValidationError::NoEditSource);
    };

    let source = match &image {
        EditImage::File(f) => f.name.as_str(),
        EditImage::Url(u) => u.as_str(),
    };
    debug!(source, "Building edit request");

    Ok(EditRequest {
        prompt,
        aspect_ratio: form.aspect_ratio,
        output_resolution: Some(form.resolution),
        output_format: Some(form.format),
        image,
    })
}

/// Build a compose request from the selected records, in selection order.
///
/// Records without file data are skipped.
pub fn build_compose(
    form: &TabForm,
    selected: &[&ImageRecord],
) -> Result<ComposeRequest, ValidationError> {
    let prompt = form.checked_prompt()?;
    if selected.is_empty() {
        return Err(ValidationError::EmptySelection);
    }

    let images: Vec<ImageFile> = selected
        .iter()
        .filter_map(|record| record.file.clone())
        .collect();
    if images.is_empty() {
        return Err(ValidationError::NoComposableImages);
    }

    debug!(count = images.len(), "Building compose request");

    Ok(ComposeRequest {
        prompt,
        aspect_ratio: Some(form.aspect_ratio),
        output_resolution: Some(form.resolution),
        output_format: Some(form.format),
        images,
    })
}
