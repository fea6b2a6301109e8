//! Prescription image intake.
//!
//! Images are accepted as raw bytes, as `data:` URIs or as remote `http(s)` URLs. Inline
//! content is sniffed with `infer`; anything that is not a supported raster format is rejected
//! before the capability is ever called.

use crate::error::{AnalysisError, AnalysisResult};
use crate::request::PrescriptionImage;
use base64::{engine::general_purpose, Engine as _};
use std::fmt;

/// Raster media types the capability is asked to read.
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/bmp",
    "image/tiff",
    "image/heif",
];

/// An image ready to be attached to an inference request.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageAttachment {
    /// Sniffed, size-checked image content.
    Inline {
        media_type: &'static str,
        data: Vec<u8>,
    },
    /// A remote image the capability fetches itself.
    Remote(reqwest::Url),
}

impl ImageAttachment {
    /// URL form understood by the capability: a `data:` URL for inline content.
    pub fn to_url(&self) -> String {
        match self {
            ImageAttachment::Inline { media_type, data } => format!(
                "data:{};base64,{}",
                media_type,
                general_purpose::STANDARD.encode(data)
            ),
            ImageAttachment::Remote(url) => url.to_string(),
        }
    }

    pub fn media_type(&self) -> Option<&'static str> {
        match self {
            ImageAttachment::Inline { media_type, .. } => Some(media_type),
            ImageAttachment::Remote(_) => None,
        }
    }
}

impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageAttachment::Inline { media_type, data } => f
                .debug_struct("Inline")
                .field("media_type", media_type)
                .field("bytes", &data.len())
                .finish(),
            ImageAttachment::Remote(url) => f.debug_tuple("Remote").field(&url.as_str()).finish(),
        }
    }
}

/// Validates a prescription image and turns it into an attachment.
///
/// # Errors
///
/// Returns `InvalidRequest` if the payload is empty, larger than `max_bytes`, not a supported
/// raster format, an undecodable data URI, or a URI with an unsupported scheme.
pub fn prepare_image(image: &PrescriptionImage, max_bytes: usize) -> AnalysisResult<ImageAttachment> {
    match image {
        PrescriptionImage::Bytes(bytes) => inline_attachment(bytes.clone(), max_bytes),
        PrescriptionImage::Uri(uri) => {
            let uri = uri.trim();
            if uri.is_empty() {
                return Err(AnalysisError::invalid_request("image URI is empty"));
            }
            if let Some(rest) = uri.strip_prefix("data:") {
                let data = decode_data_uri(rest)?;
                return inline_attachment(data, max_bytes);
            }
            remote_attachment(uri)
        }
    }
}

fn inline_attachment(data: Vec<u8>, max_bytes: usize) -> AnalysisResult<ImageAttachment> {
    if data.is_empty() {
        return Err(AnalysisError::invalid_request("image payload is empty"));
    }
    if data.len() > max_bytes {
        return Err(AnalysisError::invalid_request(format!(
            "image payload is {} bytes, maximum is {}",
            data.len(),
            max_bytes
        )));
    }

    let media_type = sniff_raster(&data).ok_or_else(|| {
        AnalysisError::invalid_request("image payload is not a supported raster format")
    })?;

    Ok(ImageAttachment::Inline { media_type, data })
}

/// Returns the media type when `data` starts with a supported raster signature.
pub fn sniff_raster(data: &[u8]) -> Option<&'static str> {
    let kind = infer::get(data)?;
    SUPPORTED_MEDIA_TYPES
        .iter()
        .copied()
        .find(|supported| *supported == kind.mime_type())
}

/// Decodes the part of a data URI after `data:`. Only base64 payloads are accepted; the
/// declared media type is ignored in favour of sniffing the content.
fn decode_data_uri(rest: &str) -> AnalysisResult<Vec<u8>> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AnalysisError::invalid_request("data URI has no payload"))?;

    if !header
        .split(';')
        .any(|param| param.eq_ignore_ascii_case("base64"))
    {
        return Err(AnalysisError::invalid_request(
            "data URI must be base64 encoded",
        ));
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AnalysisError::invalid_request(format!("data URI is not valid base64: {}", e)))
}

fn remote_attachment(uri: &str) -> AnalysisResult<ImageAttachment> {
    let url = reqwest::Url::parse(uri)
        .map_err(|e| AnalysisError::invalid_request(format!("invalid image URI: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AnalysisError::invalid_request(format!(
            "unsupported image URI scheme '{}'",
            url.scheme()
        )));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(AnalysisError::invalid_request(
            "image URI must not contain credentials",
        ));
    }

    Ok(ImageAttachment::Remote(url))
}
