//! Partitioning garments into tops and bottoms.

/// Garment types routed to the bottoms partition.
pub const BOTTOM_TYPES: [&str; 6] = ["pants", "jeans", "shorts", "skirt", "trousers", "jogger"];

/// Garment types conventionally considered tops. Kept for reference; the
/// partition rule treats everything outside [`BOTTOM_TYPES`] as a top, so
/// this list is never consulted.
pub const TOP_TYPES: [&str; 12] = [
    "shirt", "t-shirt", "vest", "jacket", "sweater", "hoodie", "top", "blouse", "cardigan",
    "corset", "tank", "dress",
];

/// Which output a garment row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Top,
    Bottom,
}

/// Decide a garment's partition from its inferred type and source URL.
///
/// The type match is case-insensitive. When the type is inconclusive the
/// URL is scanned for the literal substrings `pants` or `jeans`, case
/// sensitively, matching how catalog folders are named. Everything else is
/// a top.
pub fn classify(kind: &str, image_url: &str) -> Partition {
    let kind = kind.to_lowercase();
    if BOTTOM_TYPES.contains(&kind.as_str()) {
        return Partition::Bottom;
    }
    if image_url.contains("pants") || image_url.contains("jeans") {
        return Partition::Bottom;
    }
    Partition::Top
}
