//! Attribute schema for enriched garment records.
//!
//! [`AttributeRecord`] is the canonical shape every inference reply must be
//! decoded into. The vision endpoint returns free-form text expected to
//! contain a JSON object, often wrapped in a markdown code fence, so
//! [`parse_attributes`] strips the fence and performs a strict decode:
//! it always returns either a valid record or a typed [`ParseError`].
//!
//! Defaulting rules:
//!
//! - enum-like fields ([`GenderTarget`], [`ColorTone`], [`Fit`]) accept any
//!   wire string; unrecognized values survive as `Other(raw)` and missing or
//!   `null` values become `Unknown` (serialized as `"unknown"`)
//! - required string fields default to `"unknown"`
//! - optional fields stay `None` and serialize as an explicit `null`; no
//!   field is ever skipped on output
//! - unknown extra fields in the reply are ignored

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Wire marker for values the model could not determine.
pub const UNKNOWN: &str = "unknown";

// ============================================================================
// Error Types
// ============================================================================

/// Failure to decode an inference reply into an [`AttributeRecord`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// The reply (after fence stripping) is not a JSON object of the
    /// expected shape.
    #[error("attribute JSON parse error: {0}")]
    Json(String),
}

// ============================================================================
// Enum-like Fields
// ============================================================================

/// Audience a garment is designed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GenderTarget {
    Male,
    Female,
    Unisex,
    Unknown,
    Other(String),
}

impl From<String> for GenderTarget {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "male" => Self::Male,
            "female" => Self::Female,
            "unisex" => Self::Unisex,
            UNKNOWN => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl From<GenderTarget> for String {
    fn from(value: GenderTarget) -> Self {
        match value {
            GenderTarget::Male => "male".to_string(),
            GenderTarget::Female => "female".to_string(),
            GenderTarget::Unisex => "unisex".to_string(),
            GenderTarget::Unknown => UNKNOWN.to_string(),
            GenderTarget::Other(s) => s,
        }
    }
}

impl Default for GenderTarget {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Overall tone of the garment's colors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColorTone {
    Pastel,
    Muted,
    Bright,
    Neutral,
    Dark,
    Unknown,
    Other(String),
}

impl From<String> for ColorTone {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "pastel" => Self::Pastel,
            "muted" => Self::Muted,
            "bright" => Self::Bright,
            "neutral" => Self::Neutral,
            "dark" => Self::Dark,
            UNKNOWN => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl From<ColorTone> for String {
    fn from(value: ColorTone) -> Self {
        match value {
            ColorTone::Pastel => "pastel".to_string(),
            ColorTone::Muted => "muted".to_string(),
            ColorTone::Bright => "bright".to_string(),
            ColorTone::Neutral => "neutral".to_string(),
            ColorTone::Dark => "dark".to_string(),
            ColorTone::Unknown => UNKNOWN.to_string(),
            ColorTone::Other(s) => s,
        }
    }
}

impl Default for ColorTone {
    fn default() -> Self {
        Self::Unknown
    }
}

/// How a garment sits on the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Fit {
    Slim,
    Regular,
    Relaxed,
    Oversized,
    Unknown,
    Other(String),
}

impl From<String> for Fit {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "slim" => Self::Slim,
            "regular" => Self::Regular,
            "relaxed" => Self::Relaxed,
            "oversized" => Self::Oversized,
            UNKNOWN => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl From<Fit> for String {
    fn from(value: Fit) -> Self {
        match value {
            Fit::Slim => "slim".to_string(),
            Fit::Regular => "regular".to_string(),
            Fit::Relaxed => "relaxed".to_string(),
            Fit::Oversized => "oversized".to_string(),
            Fit::Unknown => UNKNOWN.to_string(),
            Fit::Other(s) => s,
        }
    }
}

impl Default for Fit {
    fn default() -> Self {
        Self::Unknown
    }
}

// ============================================================================
// Attribute Record
// ============================================================================

/// Structured description of one garment, extracted from its image.
///
/// Every field is always present: required fields carry the `"unknown"`
/// marker when the model could not determine them, optional fields carry an
/// explicit `null`. Serialization writes all 18 fields unconditionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Garment type, e.g. `"t-shirt"`, `"jeans"`. Free-form on the wire;
    /// the partition rule lowercases it before matching.
    #[serde(
        rename = "type",
        default = "unknown_string",
        deserialize_with = "nullable_string"
    )]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable_enum")]
    pub gender_target: GenderTarget,
    #[serde(default)]
    pub gender_cues: Option<String>,
    /// Primary color.
    #[serde(default = "unknown_string", deserialize_with = "nullable_string")]
    pub color: String,
    /// All visible colors, in the order the model listed them.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub colors: Vec<String>,
    #[serde(default, deserialize_with = "nullable_enum")]
    pub color_tone: ColorTone,
    #[serde(default = "unknown_string", deserialize_with = "nullable_string")]
    pub pattern: String,
    #[serde(default = "unknown_string", deserialize_with = "nullable_string")]
    pub style: String,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default, deserialize_with = "nullable_enum")]
    pub fit: Fit,
    #[serde(default)]
    pub length: Option<String>,
    /// Tops only.
    #[serde(default)]
    pub neckline: Option<String>,
    /// Bottoms only.
    #[serde(default)]
    pub rise: Option<String>,
    #[serde(default)]
    pub leg_style: Option<String>,
    #[serde(default)]
    pub hem_style: Option<String>,
    /// Notable construction details, e.g. `"distressed"`, `"ribbed"`.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub details: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default = "unknown_string", deserialize_with = "nullable_string")]
    pub description: String,
}

fn unknown_string() -> String {
    UNKNOWN.to_string()
}

/// Accept a string or `null`, mapping `null` to the `"unknown"` marker.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_string))
}

/// Accept an enum-like wire string or `null`, mapping `null` to the
/// field's `Unknown` default.
fn nullable_enum<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String> + Default,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(T::from)
        .unwrap_or_default())
}

/// Accept a string array or `null`, mapping `null` to empty.
fn nullable_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Decode an inference reply into an [`AttributeRecord`].
///
/// Strips one surrounding markdown code fence if present, then performs a
/// strict decode. Never panics on malformed input.
pub fn parse_attributes(raw: &str) -> Result<AttributeRecord, ParseError> {
    let cleaned = strip_markdown_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| ParseError::Json(e.to_string()))
}

/// Strip markdown code fences from model output.
///
/// The opening fence may carry a language tag (```` ```json ````), so the
/// entire first line is discarded, not just the marker. A trailing fence is
/// removed when present; a reply truncated before its closing fence still
/// yields the inner body.
pub fn strip_markdown_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let body = trimmed
        .find('\n')
        .map(|i| &trimmed[i + 1..])
        .unwrap_or("");
    let body = body.rfind("```").map(|i| &body[..i]).unwrap_or(body);
    body.trim().to_string()
}

// ============================================================================
// Tests
// ============================================================================
