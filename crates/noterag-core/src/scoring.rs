//! Confidence scoring and source previews.

/// Default number of characters kept in a source preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// Convert a cosine distance into a confidence in `[0, 1]`.
///
/// `confidence = max(0, 1 - distance)`. Distances slightly below zero from
/// floating-point error are clamped to a confidence of 1, and a NaN
/// distance scores 0.
pub fn confidence_from_distance(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Arithmetic mean of per-source confidences, 0 for an empty slice.
pub fn overall_confidence(confidences: &[f32]) -> f32 {
    if confidences.is_empty() {
        return 0.0;
    }
    confidences.iter().sum::<f32>() / confidences.len() as f32
}

/// First `max_chars` characters of `content`, with `...` appended when
/// anything was cut off.
pub fn preview(content: &str, max_chars: usize) -> String {
    let mut chars = content.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
