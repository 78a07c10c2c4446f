//! Comparison keys for name matching.

use unicode_normalization::UnicodeNormalization;
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};

/// Characters removed from keys so that "mr-mime", "Mr. Mime" style
/// spellings compare by their letters only.
const SEPARATORS: [char; 3] = ['-', ' ', '_'];

fn is_nonspacing_mark(c: char) -> bool {
    c.general_category() == GeneralCategory::NonspacingMark
}

/// Turns display text into a lowercase, diacritic-free, separator-free key.
///
/// Only non-spacing marks (accents, cedillas, viramas) are dropped; spacing
/// vowel signs in scripts such as Devanagari are part of the key.
///
/// The function is total and idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();

    let key: String = lowered
        .nfd()
        .filter(|c| !is_nonspacing_mark(*c))
        .nfc()
        .filter(|c| !SEPARATORS.contains(c))
        .collect();

    // Dropping separators can expose other whitespace at the edges.
    match key.trim() {
        trimmed if trimmed.len() == key.len() => key,
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_case_and_diacritics() {
        assert_eq!(normalize("  Flabébé "), "flabebe");
        assert_eq!(normalize("Pokémon"), "pokemon");
        assert_eq!(normalize("ÑANDÚ"), "nandu");
    }

    #[test]
    fn test_removes_separators() {
        assert_eq!(normalize("mr-mime"), "mrmime");
        assert_eq!(normalize("Tapu Koko"), "tapukoko");
        assert_eq!(normalize("type_null"), "typenull");
        assert_eq!(normalize("ho - oh"), "hooh");
    }

    #[test]
    fn test_spacing_marks_are_kept() {
        // U+093E DEVANAGARI VOWEL SIGN AA is a spacing mark.
        assert_eq!(normalize("का"), "का");
        // U+094D DEVANAGARI SIGN VIRAMA is non-spacing.
        assert_eq!(normalize("क्"), "क");
    }

    #[test]
    fn test_plain_ascii_unchanged() {
        assert_eq!(normalize("bulbasaur"), "bulbasaur");
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t "), "");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in "\\PC{0,40}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_has_no_marks_or_separators(s in "\\PC{0,40}") {
            let key = normalize(&s);
            prop_assert!(!key.chars().any(is_nonspacing_mark));
            prop_assert!(!key.contains(['-', ' ', '_']));
        }

        #[test]
        fn lowercase_ascii_words_are_fixed_points(s in "[a-z0-9]{0,24}") {
            prop_assert_eq!(normalize(&s), s);
        }
    }
}
