use serde::{Deserialize, Deserializer};

/// Normalizes free text by stripping surrounding whitespace and
/// composing it into Unicode Normalization Form C, so that place names
/// and taxon names typed on different keyboards compare equal.
///
/// ```
/// use specimen_backend::normalization::normalize_text;
/// assert_eq!(normalize_text(" Parus mino\u{301}r "), "Parus minór");
/// ```
pub fn normalize_text(text: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    text.as_ref().trim().nfc().collect()
}

/// Deserializes an optional `String` after running it through
/// `normalize_text`. A string that is empty after trimming stays
/// `Some("")`, distinct from a missing field.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let o: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(o.map(normalize_text))
}
