use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::DynamicImage;
use regex::Regex;

use crate::error::StoryError;

static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/[A-Za-z0-9.+-]+(?:;[^;,]+)*;base64,(?P<payload>.*)$")
        .expect("data url pattern is valid")
});

/// Where the picture for a story comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Remote(String),
    /// A `data:image/...;base64,` URL, kept verbatim for the story record.
    Embedded(String),
    Upload { name: String, bytes: Vec<u8> },
}

impl ImageSource {
    pub fn parse(reference: &str) -> Result<Self, StoryError> {
        let reference = reference.trim();
        if reference.starts_with("data:image") {
            Ok(ImageSource::Embedded(reference.to_string()))
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            Ok(ImageSource::Remote(reference.to_string()))
        } else {
            Err(StoryError::ImageDecodeFailed(format!(
                "unsupported image reference `{}`",
                truncate(reference, 48)
            )))
        }
    }

    /// The reference stored on the finished story.
    pub fn reference(&self) -> String {
        match self {
            ImageSource::Remote(url) | ImageSource::Embedded(url) => url.clone(),
            ImageSource::Upload { name, .. } => format!("upload:{name}"),
        }
    }

    /// Fetches or unpacks the raw encoded image bytes.
    pub async fn resolve(&self, client: &reqwest::Client) -> Result<Vec<u8>, StoryError> {
        match self {
            ImageSource::Remote(url) => {
                let response = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| StoryError::ImageDecodeFailed(e.to_string()))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| StoryError::ImageDecodeFailed(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            ImageSource::Embedded(data_url) => decode_data_url(data_url),
            ImageSource::Upload { bytes, .. } => Ok(bytes.clone()),
        }
    }

    /// Resolves and decodes into pixels.
    pub async fn load(&self, client: &reqwest::Client) -> Result<DynamicImage, StoryError> {
        let bytes = self.resolve(client).await?;
        decode_pixels(&bytes)
    }
}

pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, StoryError> {
    let captures = DATA_URL.captures(data_url).ok_or_else(|| {
        StoryError::ImageDecodeFailed("data url is not a base64 image".to_string())
    })?;
    STANDARD
        .decode(captures["payload"].trim())
        .map_err(|e| StoryError::ImageDecodeFailed(format!("invalid base64 payload: {e}")))
}

pub fn decode_pixels(bytes: &[u8]) -> Result<DynamicImage, StoryError> {
    if bytes.is_empty() {
        return Err(StoryError::ImageDecodeFailed("image is empty".to_string()));
    }
    image::load_from_memory(bytes).map_err(|e| StoryError::ImageDecodeFailed(e.to_string()))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
