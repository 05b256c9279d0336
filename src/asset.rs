use std::path::{Path, PathBuf};

use base64::Engine;

use crate::error::{Error, Result};

/// Largest image accepted for inline upload.
pub const MAX_IMAGE_BYTES: u64 = 4 * 1024 * 1024;

pub const DEFAULT_CLAIM_PLACEHOLDER: &str =
    "Enter a claim to check (e.g., 'The Eiffel Tower was moved to Berlin in 2023').";
pub const IMAGE_CLAIM_PLACEHOLDER: &str =
    "Optional: Add a text claim related to this image (e.g., 'This photo shows the President signing the bill').";
pub const TEXT_LOADED_PLACEHOLDER: &str = "Text content loaded from file.";

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "m4v", "wmv", "flv", "mpeg", "mpg", "3gp",
];

/// A file the user picked, with the metadata needed to classify it.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub media_type: String,
    pub size: u64,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>, media_type: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        SelectedFile {
            path,
            name,
            media_type: media_type.into(),
            size,
        }
    }

    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await.map_err(|source| Error::FileRead {
            path: path.clone(),
            source,
        })?;
        let media_type = media_type_for_path(&path);
        Ok(Self::new(path, media_type, metadata.len()))
    }
}

/// Guess a media type from the file extension.
pub fn media_type_for_path(path: &Path) -> String {
    if let Ok(format) = image::ImageFormat::from_path(path) {
        return format.to_mime_type().to_string();
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if ext == "txt" {
        "text/plain".to_string()
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        format!("video/{}", ext)
    } else {
        "application/octet-stream".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Text,
    Video,
    Other,
}

fn classify(media_type: &str) -> MediaKind {
    if media_type.starts_with("image/") {
        MediaKind::Image
    } else if media_type == "text/plain" {
        MediaKind::Text
    } else if media_type.starts_with("video/") {
        MediaKind::Video
    } else {
        MediaKind::Other
    }
}

/// The single staged upload slot. Replaced wholesale on every selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedAsset {
    pub encoded_data: Option<String>,
    pub media_type: Option<String>,
    pub original_name: Option<String>,
}

impl UploadedAsset {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn image(media_type: impl Into<String>, encoded_data: impl Into<String>, name: impl Into<String>) -> Self {
        UploadedAsset {
            encoded_data: Some(encoded_data.into()),
            media_type: Some(media_type.into()),
            original_name: Some(name.into()),
        }
    }

    pub fn is_present(&self) -> bool {
        self.inline().is_some()
    }

    /// `(media_type, encoded_data)` when an image is staged.
    pub fn inline(&self) -> Option<(&str, &str)> {
        match (&self.media_type, &self.encoded_data) {
            (Some(media_type), Some(data)) => Some((media_type.as_str(), data.as_str())),
            _ => None,
        }
    }
}

/// What a successful selection produced.
#[derive(Debug, Clone)]
pub enum Ingested {
    /// An image staged for inline upload, plus its raw bytes for preview.
    Image { asset: UploadedAsset, preview: Vec<u8> },
    /// Text that replaces the claim field. Nothing is staged.
    Text { name: String, content: String },
}

impl Ingested {
    pub fn asset(&self) -> UploadedAsset {
        match self {
            Ingested::Image { asset, .. } => asset.clone(),
            Ingested::Text { .. } => UploadedAsset::absent(),
        }
    }

    /// Placeholder hint the claim field should show afterwards.
    pub fn claim_placeholder(&self) -> &'static str {
        match self {
            Ingested::Image { .. } => IMAGE_CLAIM_PLACEHOLDER,
            Ingested::Text { .. } => TEXT_LOADED_PLACEHOLDER,
        }
    }

    /// New claim text: cleared for images, file content for text.
    pub fn claim_text(&self) -> String {
        match self {
            Ingested::Image { .. } => String::new(),
            Ingested::Text { content, .. } => content.clone(),
        }
    }
}

/// Encode bytes the way a browser data URL would, then drop the scheme prefix.
pub fn encode_payload(media_type: &str, bytes: &[u8]) -> String {
    let data_url = format!(
        "data:{};base64,{}",
        media_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    );
    match data_url.split_once(',') {
        Some((_prefix, data)) => data.to_string(),
        None => data_url,
    }
}

/// Read and classify a selected file.
///
/// Rejections leave nothing behind; the caller resets its slot to
/// [`UploadedAsset::absent`] before calling this, so a failed attempt never
/// leaves a stale asset staged.
pub async fn ingest(file: &SelectedFile) -> Result<Ingested> {
    match classify(&file.media_type) {
        MediaKind::Image => {
            if file.size > MAX_IMAGE_BYTES {
                tracing::info!(name = %file.name, size = file.size, "rejecting oversize image");
                return Err(Error::OversizeAsset {
                    size: file.size,
                    limit: MAX_IMAGE_BYTES,
                });
            }

            let bytes = read_file(&file.path).await?;
            let encoded = encode_payload(&file.media_type, &bytes);
            tracing::debug!(
                name = %file.name,
                media_type = %file.media_type,
                encoded_len = encoded.len(),
                "staged image"
            );

            Ok(Ingested::Image {
                asset: UploadedAsset::image(file.media_type.clone(), encoded, file.name.clone()),
                preview: bytes,
            })
        }
        MediaKind::Text => {
            let bytes = read_file(&file.path).await?;
            let content = String::from_utf8_lossy(&bytes).into_owned();
            tracing::debug!(name = %file.name, chars = content.chars().count(), "loaded text file");
            Ok(Ingested::Text {
                name: file.name.clone(),
                content,
            })
        }
        MediaKind::Video => Err(Error::UnsupportedMediaGuidance),
        MediaKind::Other => Err(Error::UnsupportedMediaType(file.media_type.clone())),
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })
}
