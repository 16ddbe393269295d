//! Prompt and image payload construction for attribute inference.
//!
//! The instruction text and the encoded image are built here so every call
//! site sends the exact same request shape; the expected reply schema lives
//! in [`crate::attrs`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Instruction sent alongside every garment image.
///
/// Spells out the full reply schema inline because the inference endpoint
/// is not given a JSON schema; the trailing line discourages markdown
/// wrapping, though [`crate::attrs::parse_attributes`] tolerates it anyway.
pub const ATTRIBUTE_PROMPT: &str = r#"Analyze this clothing item and return a JSON object with these attributes.
Infer based on visible design cues. Use null if cannot determine.

{
  "type": "t-shirt/shirt/pants/jeans/jacket/hoodie/sweater/shorts/skirt/dress/shoes/hat/etc",
  "gender_target": "male/female/unisex",
  "gender_cues": "brief explanation (e.g. 'pink color, cropped length' or 'neutral oversized fit')",
  "color": "primary color",
  "colors": ["all", "visible", "colors"],
  "color_tone": "pastel/muted/bright/neutral/dark",
  "pattern": "solid/striped/plaid/floral/graphic/camo/etc",
  "style": "casual/formal/athletic/streetwear/minimalist/vintage/etc",
  "material": "cotton/denim/leather/polyester/wool/etc or null",
  "fit": "slim/regular/relaxed/oversized",
  "length": "cropped/regular/longline or null",
  "neckline": "crew/v-neck/scoop/collared/hooded or null (for tops)",
  "rise": "low/mid/high or null (for bottoms)",
  "leg_style": "skinny/slim/straight/wide/flared or null (for pants)",
  "hem_style": "raw/hemmed/cuffed/stacked or null (for pants)",
  "details": ["cropped", "distressed", "ribbed", "pleated", "elastic-waist", "etc"] or [],
  "brand": "brand name if visible, otherwise null",
  "description": "one concise sentence"
}

Return ONLY valid JSON, no markdown or extra text."#;

/// A garment image encoded for the inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type inferred from the source name.
    pub mime_type: &'static str,
    /// Base64-encoded image bytes (standard alphabet, padded).
    pub data: String,
}

impl ImagePayload {
    /// Encode raw image bytes, inferring the MIME type from `source_name`
    /// (a file path or URL).
    pub fn new(bytes: &[u8], source_name: &str) -> Self {
        Self {
            mime_type: mime_for_source(source_name),
            data: BASE64.encode(bytes),
        }
    }
}

/// Infer an image MIME type from a file name or URL.
///
/// Matches on the lowercased suffix; anything unrecognized (including URLs
/// with query strings) falls back to JPEG, which is what the catalog
/// overwhelmingly stores.
pub fn mime_for_source(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_source() {
        assert_eq!(mime_for_source("photo.png"), "image/png");
        assert_eq!(mime_for_source("photo.webp"), "image/webp");
        assert_eq!(mime_for_source("photo.jpg"), "image/jpeg");
        assert_eq!(mime_for_source("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for_source("photo.gif"), "image/jpeg");
    }

    #[test]
    fn test_mime_is_case_insensitive() {
        assert_eq!(mime_for_source("PHOTO.PNG"), "image/png");
        assert_eq!(mime_for_source("Photo.WebP"), "image/webp");
    }

    #[test]
    fn test_mime_query_string_falls_back() {
        // Signed URLs end in a token, not the extension.
        assert_eq!(
            mime_for_source("https://cdn.example.com/sign/x/img.png?token=abc"),
            "image/jpeg"
        );
    }

    #[test]
    fn test_payload_encodes_base64() {
        let payload = ImagePayload::new(b"hello", "a.png");
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.data, "aGVsbG8=");
    }

    #[test]
    fn test_prompt_demands_bare_json() {
        assert!(ATTRIBUTE_PROMPT.contains("Return ONLY valid JSON"));
        assert!(ATTRIBUTE_PROMPT.contains("\"type\""));
        assert!(ATTRIBUTE_PROMPT.contains("\"description\""));
    }
}
