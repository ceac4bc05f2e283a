//! Working-language resolution and display names.

/// Fallback when neither the request, the pet record, nor config names a language.
pub const DEFAULT_LANG: &str = "en";

/// Languages the app ships translations for, with their display names.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("es", "Español"),
    ("en", "English"),
    ("ru", "Русский"),
    ("he", "עברית"),
    ("de", "Deutsch"),
    ("fr", "Français"),
    ("it", "Italiano"),
];

/// Display name for a language code; unknown codes come back verbatim.
pub fn display_name(code: &str) -> &str {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// First non-blank of: explicit request language, pet-record language, configured default.
pub fn resolve_language(
    explicit: Option<&str>,
    from_pet: Option<&str>,
    configured_default: &str,
) -> String {
    [explicit, from_pet, Some(configured_default)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LANG)
        .to_string()
}
