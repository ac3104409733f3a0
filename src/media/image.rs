//! [`ImageData`] / [`Image`] and their data-URL encodings.

use std::fmt;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

// ---------------------------------------------------------------------------
// MediaError
// ---------------------------------------------------------------------------

/// Errors raised while loading, decoding or fetching images.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The string is not a `data:<mime>;base64,<payload>` URL.
    #[error("malformed data URL")]
    DataUrl,

    /// The base64 payload could not be decoded.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Downloading a remote image failed.
    #[error("failed to fetch image: {0}")]
    Fetch(String),

    /// Reading an image from disk failed.
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ImageData
// ---------------------------------------------------------------------------

/// Encoded image bytes together with their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// JPEG bytes, the format camera frames are captured in.
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new("image/jpeg", bytes)
    }

    /// Read an image file, sniffing the MIME type from its signature.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let bytes = std::fs::read(path)?;
        let mime_type = sniff_mime(&bytes).unwrap_or("image/jpeg");
        Ok(Self::new(mime_type, bytes))
    }

    /// Standard base64 of the raw bytes.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Decode base64 `data` with a known MIME type.
    pub fn from_base64(mime_type: impl Into<String>, data: &str) -> Result<Self, MediaError> {
        Ok(Self::new(mime_type, BASE64.decode(data.trim())?))
    }

    /// `data:<mime>;base64,<payload>` form accepted by the image providers.
    ///
    /// ```
    /// use sound_snapper::media::ImageData;
    ///
    /// let image = ImageData::new("image/png", vec![1, 2, 3]);
    /// assert_eq!(image.to_data_url(), "data:image/png;base64,AQID");
    /// ```
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Parse a base64 data URL.
    pub fn from_data_url(url: &str) -> Result<Self, MediaError> {
        let rest = url.strip_prefix("data:").ok_or(MediaError::DataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(MediaError::DataUrl)?;
        let mime_type = header
            .strip_suffix(";base64")
            .filter(|m| !m.is_empty())
            .ok_or(MediaError::DataUrl)?;
        Self::from_base64(mime_type, payload)
    }
}

/// Detect the MIME type from a file signature.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// An image the session can display: inline bytes or a provider-hosted URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Image {
    Inline(ImageData),
    Remote(String),
}

impl Image {
    /// A reference a provider can consume: the URL itself, or a data URL.
    pub fn to_url(&self) -> String {
        match self {
            Image::Inline(data) => data.to_data_url(),
            Image::Remote(url) => url.clone(),
        }
    }

    /// Short label for logs and the terminal front-end.
    pub fn describe(&self) -> String {
        match self {
            Image::Inline(data) => format!("{} ({} bytes)", data.mime_type, data.bytes.len()),
            Image::Remote(url) => url.clone(),
        }
    }

    /// Bytes of the image, downloading it first when it is remote.
    pub async fn resolve(&self, client: &reqwest::Client) -> Result<ImageData, MediaError> {
        match self {
            Image::Inline(data) => Ok(data.clone()),
            Image::Remote(url) if url.starts_with("data:") => ImageData::from_data_url(url),
            Image::Remote(url) => fetch_image(client, url).await,
        }
    }
}

impl From<ImageData> for Image {
    fn from(data: ImageData) -> Self {
        Image::Inline(data)
    }
}

/// Download `url`, taking the MIME type from the response or the bytes.
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<ImageData, MediaError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::Fetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::Fetch(format!("HTTP {}", status.as_u16())));
    }

    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| v.starts_with("image/"));

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MediaError::Fetch(e.to_string()))?
        .to_vec();

    let mime_type = header_mime
        .or_else(|| sniff_mime(&bytes).map(str::to_string))
        .unwrap_or_else(|| "image/jpeg".to_string());

    Ok(ImageData::new(mime_type, bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
