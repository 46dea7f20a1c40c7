use crate::config::MultiImagePolicy;
use crate::converters::openai::{OpenAIContent, OpenAIContentItem};
use crate::errors::ProtocolError;
use base64::prelude::{BASE64_STANDARD, Engine as _};
use tracing::{debug, warn};

/// Joins the text parts of a message with single spaces and appends decoded
/// images to `images` in encounter order.
pub fn flatten_content(
    content: &OpenAIContent,
    images: &mut Vec<Vec<u8>>,
) -> Result<String, ProtocolError> {
    match content {
        OpenAIContent::Text(text) => Ok(text.clone()),
        OpenAIContent::Array(items) => {
            let mut texts: Vec<&str> = Vec::new();
            for item in items {
                match item {
                    OpenAIContentItem::Text { text } => texts.push(text),
                    OpenAIContentItem::ImageUrl { image_url } => {
                        if let Some(bytes) = decode_image_url(&image_url.url)? {
                            images.push(bytes);
                        }
                    }
                }
            }
            Ok(texts.join(" "))
        }
    }
}

/// Text parts only, joined the same way as [`flatten_content`]. Images are
/// neither decoded nor checked.
pub fn content_text(content: &OpenAIContent) -> String {
    match content {
        OpenAIContent::Text(text) => text.clone(),
        OpenAIContent::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                OpenAIContentItem::Text { text } => Some(text.as_str()),
                OpenAIContentItem::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Decodes a `data:<mime>;base64,<payload>` URI. Remote URLs are not fetched
/// here and yield `None`.
pub fn decode_image_url(url: &str) -> Result<Option<Vec<u8>>, ProtocolError> {
    let Some(rest) = url.strip_prefix("data:") else {
        warn!("Skipping image that is not an inline data URI: {:.64}", url);
        return Ok(None);
    };
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ProtocolError::InvalidImage("data URI without payload".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(ProtocolError::InvalidImage(format!(
            "only base64 data URIs are supported, got '{}'",
            meta
        )));
    }
    let bytes = BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| ProtocolError::InvalidImage(e.to_string()))?;
    debug!("Decoded {} image ({} bytes)", meta.trim_end_matches(";base64"), bytes.len());
    Ok(Some(bytes))
}

pub fn apply_image_policy(
    mut images: Vec<Vec<u8>>,
    policy: MultiImagePolicy,
) -> Result<Vec<Vec<u8>>, ProtocolError> {
    match policy {
        MultiImagePolicy::All => Ok(images),
        MultiImagePolicy::LastOnly => {
            if images.len() > 1 {
                debug!("Keeping the last of {} images", images.len());
            }
            Ok(images.pop().into_iter().collect())
        }
        MultiImagePolicy::RejectMulti if images.len() > 1 => {
            Err(ProtocolError::TooManyImages(images.len()))
        }
        MultiImagePolicy::RejectMulti => Ok(images),
    }
}
