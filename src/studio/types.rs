// Core types shared by the studio tabs

use super::error::ValidationError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an image record, unique within one studio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an image record came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Generated,
    Edited,
    Composed,
    Uploaded,
    Url,
    Transferred,
    Model, // Working copy in the edit tab
}

impl ImageKind {
    pub fn as_str(&self) -> &str {
        match self {
            ImageKind::Generated => "generated",
            ImageKind::Edited => "edited",
            ImageKind::Composed => "composed",
            ImageKind::Uploaded => "uploaded",
            ImageKind::Url => "url",
            ImageKind::Transferred => "transferred",
            ImageKind::Model => "model",
        }
    }
}

/// The three operation tabs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Generate,
    Edit,
    Compose,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Generate, Tab::Edit, Tab::Compose];

    pub fn as_str(&self) -> &str {
        match self {
            Tab::Generate => "generate",
            Tab::Edit => "edit",
            Tab::Compose => "compose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Square,
    Portrait,
    Landscape,
}

/// Aspect ratios accepted by the image service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "2:3")]
    Portrait2x3,
    #[serde(rename = "3:2")]
    Landscape3x2,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "4:5")]
    Portrait4x5,
    #[serde(rename = "5:4")]
    Landscape5x4,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "21:9")]
    Ultrawide,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 10] = [
        AspectRatio::Square,
        AspectRatio::Portrait2x3,
        AspectRatio::Landscape3x2,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait4x5,
        AspectRatio::Landscape5x4,
        AspectRatio::Portrait9x16,
        AspectRatio::Widescreen,
        AspectRatio::Ultrawide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait4x5 => "4:5",
            AspectRatio::Landscape5x4 => "5:4",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Ultrawide => "21:9",
        }
    }

    /// Nominal output size in pixels at 1K resolution
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Portrait2x3 => (832, 1248),
            AspectRatio::Landscape3x2 => (1248, 832),
            AspectRatio::Portrait3x4 => (864, 1184),
            AspectRatio::Landscape4x3 => (1184, 864),
            AspectRatio::Portrait4x5 => (896, 1152),
            AspectRatio::Landscape5x4 => (1152, 896),
            AspectRatio::Portrait9x16 => (768, 1344),
            AspectRatio::Widescreen => (1344, 768),
            AspectRatio::Ultrawide => (1536, 672),
        }
    }

    pub fn orientation(&self) -> Orientation {
        let (w, h) = self.dimensions();
        match w.cmp(&h) {
            std::cmp::Ordering::Equal => Orientation::Square,
            std::cmp::Ordering::Less => Orientation::Portrait,
            std::cmp::Ordering::Greater => Orientation::Landscape,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s)
            .ok_or_else(|| ValidationError::Unsupported {
                field: "aspect_ratio",
                value: s.to_string(),
            })
    }
}

/// Output resolution tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "1K" => Ok(Resolution::OneK),
            "2K" => Ok(Resolution::TwoK),
            "4K" => Ok(Resolution::FourK),
            other => Err(ValidationError::Unsupported {
                field: "output_resolution",
                value: other.to_string(),
            }),
        }
    }
}

/// Encoding requested for the returned image
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::Webp),
            other => Err(ValidationError::Unsupported {
                field: "output_format",
                value: other.to_string(),
            }),
        }
    }
}

/// Binary image ready to be attached to a multipart request
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode the file as a `data:` URI
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

// Bytes are elided so that records stay readable in logs
impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Build the renderable source for a base64 PNG returned by the service
pub fn png_data_uri(b64: &str) -> String {
    format!("data:image/png;base64,{}", b64)
}

/// An image shown in one of the pools
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: ImageId,
    pub src: String,
    pub prompt: Option<String>,
    pub kind: ImageKind,
    pub timestamp: DateTime<Utc>,
    pub aspect_ratio: Option<AspectRatio>,
    pub name: Option<String>,
    pub file: Option<ImageFile>,
    pub derived_from: Option<ImageId>,
}

impl ImageRecord {
    pub fn new(id: ImageId, src: impl Into<String>, kind: ImageKind) -> Self {
        Self {
            id,
            src: src.into(),
            prompt: None,
            kind,
            timestamp: Utc::now(),
            aspect_ratio: None,
            name: None,
            file: None,
            derived_from: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_file(mut self, file: ImageFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn derived_from(mut self, source: ImageId) -> Self {
        self.derived_from = Some(source);
        self
    }

    /// Filename used when saving this record to disk
    pub fn download_name(&self) -> String {
        format!("image-{}.png", self.id)
    }
}
