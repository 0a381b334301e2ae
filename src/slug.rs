//! Mapping group descriptions to domain-list keys.

use std::sync::LazyLock;

use regex::Regex;

/// Trailing chunk marker such as `[1/2]`, added when a list is split by hand.
static SPLIT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\[\s*\d+\s*/\s*\d+\s*\]\s*$").expect("split marker pattern is valid")
});

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("separator pattern is valid"));

/// Derives the domain-list key from a human-readable description.
///
/// Digits that belong to the name are kept; only an explicit `[n/m]` marker
/// is removed.
///
/// ```
/// use keenetic_geosite_sync::slugify;
///
/// assert_eq!(slugify("Facebook [2/2]"), "facebook");
/// assert_eq!(slugify("Office365"), "office365");
/// assert_eq!(slugify("Foo & Bar+"), "foo-bar");
/// ```
#[must_use]
pub fn slugify(description: &str) -> String {
    let lowered = description.trim().to_lowercase();
    let unmarked = SPLIT_MARKER.replace(&lowered, "");
    SEPARATORS
        .replace_all(&unmarked, "-")
        .trim_matches('-')
        .to_string()
}
