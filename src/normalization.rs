use crate::errors::BackendError;

/// The width of the `profession` column.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Normalizes a job title into the profession part of a cache key by
/// stripping surrounding whitespace, composing it into Unicode
/// Normalization Form C after folding it to lower case.
///
/// ```
/// use risk_backend::normalization::normalize_title;
///
/// assert_eq!(normalize_title("  Software Engineer ").unwrap(), "software engineer");
/// assert!(normalize_title(" \t ").is_err());
/// ```
pub fn normalize_title(title: impl AsRef<str>) -> Result<String, BackendError> {
    use unicode_normalization::UnicodeNormalization;

    let normalized: String = title.as_ref().trim().to_lowercase().nfc().collect();

    if normalized.is_empty() {
        return Err(BackendError::EmptyTitle);
    }

    let length = normalized.chars().count();

    if length > MAX_TITLE_LENGTH {
        return Err(BackendError::TitleTooLong {
            max: MAX_TITLE_LENGTH,
            length,
        });
    }

    Ok(normalized)
}
