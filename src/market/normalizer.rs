//! Turns a raw vision-lookup title into a search-safe product name.
//!
//! Reverse-image results come back full of storefront noise ("Buy X | Fast
//! Shipping", trademark glyphs, doubled spaces). The marketplace query key
//! must be clean or the comp search returns junk.

/// Leading verbs that mark a shopping-result title rather than a product name.
const ACTION_VERBS: &[&str] = &["buy", "shop", "get", "find", "purchase", "order"];

/// Keywords that flag a pipe-delimited suffix as storefront boilerplate.
/// A pipe on its own is not noise; plenty of legitimate titles contain one.
const STOREFRONT_NOISE: &[&str] = &[
    "shipping",
    "store",
    "shop",
    "online",
    "sale",
    "discount",
    "best price",
];

const LOW_CONFIDENCE_LITERAL: &str = "unknown product";
const MIN_CONFIDENT_CHARS: usize = 5;

/// Normalize a raw title into a canonical product name.
///
/// Steps run in order, each on the output of the previous:
/// 1. strip a leading action verb ("Buy ", "Shop ", ...),
/// 2. drop pipe-delimited storefront boilerplate (conditionally),
/// 3. remove trademark/registered/copyright glyphs,
/// 4. collapse whitespace runs and trim.
///
/// Never fails: empty input yields an empty string, and the worst case for
/// anything else is the trimmed original.
pub fn normalize(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let stripped = strip_action_verb(raw);
    let kept = strip_storefront_segments(stripped);
    let cleaned: String = kept
        .chars()
        .filter(|ch| !matches!(ch, '™' | '®' | '©'))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Post-condition check the caller applies before querying the marketplace.
///
/// A name that is empty, the vision API's "unknown product" literal, or too
/// short to be a real product name means identification failed; the pipeline
/// must stop with a low-confidence outcome instead of scoring garbage.
pub fn is_low_confidence(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case(LOW_CONFIDENCE_LITERAL)
        || trimmed.chars().count() < MIN_CONFIDENT_CHARS
}

fn strip_action_verb(input: &str) -> &str {
    let trimmed = input.trim_start();
    for verb in ACTION_VERBS {
        if let Some(prefix) = trimmed.get(..verb.len())
            && prefix.eq_ignore_ascii_case(verb)
            && trimmed[verb.len()..].starts_with(char::is_whitespace)
        {
            return trimmed[verb.len()..].trim_start();
        }
    }
    trimmed
}

fn strip_storefront_segments(input: &str) -> &str {
    let Some((head, rest)) = input.split_once(" | ") else {
        return input;
    };
    let second = rest.split(" | ").next().unwrap_or(rest).to_lowercase();
    if STOREFRONT_NOISE.iter().any(|kw| second.contains(kw)) {
        head
    } else {
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn strips_verb_and_storefront_suffix() {
        assert_eq!(
            normalize("Buy Sony Walkman WM-10 | Fast Shipping"),
            "Sony Walkman WM-10"
        );
    }

    #[test]
    fn removes_trademark_glyphs() {
        assert_eq!(normalize("Canon AE-1™ Camera"), "Canon AE-1 Camera");
        assert_eq!(normalize("Lego® Set 375©"), "Lego Set 375");
    }

    #[test]
    fn keeps_pipe_when_second_segment_is_not_noise() {
        assert_eq!(
            normalize("Vintage Game Boy | Collector Item"),
            "Vintage Game Boy | Collector Item"
        );
    }

    #[test]
    fn only_leading_verbs_are_stripped() {
        assert_eq!(normalize("Order Polaroid SX-70"), "Polaroid SX-70");
        // "Order" as part of the name, not a prefix
        assert_eq!(
            normalize("Mail Order Catalog 1985"),
            "Mail Order Catalog 1985"
        );
        // verb must be a whole word
        assert_eq!(normalize("Buyers Guide 1999"), "Buyers Guide 1999");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  Atari   2600\tConsole "), "Atari 2600 Console");
    }

    #[test]
    fn noise_match_is_case_insensitive() {
        assert_eq!(
            normalize("Commodore 64 | BEST PRICE guaranteed | retro computers"),
            "Commodore 64"
        );
    }

    #[test]
    fn low_confidence_check() {
        assert!(is_low_confidence(""));
        assert!(is_low_confidence("Unknown Product"));
        assert!(is_low_confidence("unknown product"));
        assert!(is_low_confidence("iPod"));
        assert!(!is_low_confidence("Sony Walkman WM-10"));
    }
}
