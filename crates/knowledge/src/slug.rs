use regex::Regex;
use std::sync::LazyLock;

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Longest slug in bytes, well under the usual 255-byte file name limit.
pub const MAX_SLUG_BYTES: usize = 120;

/// Slug for names with no usable characters, e.g. `"???"`.
pub const FALLBACK_SLUG: &str = "untitled";

/// Filesystem-safe identifier for a display name: lowercase, drop anything
/// outside word/whitespace/hyphen, whitespace runs become one hyphen, no
/// leading or trailing hyphens. Long slugs are cut at [`MAX_SLUG_BYTES`] and
/// an empty result becomes [`FALLBACK_SLUG`]. Different names may map to the
/// same slug.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let kept = DISALLOWED.replace_all(&lowered, "");
    let hyphenated = WHITESPACE.replace_all(&kept, "-");

    let mut end = 0;
    for (i, c) in hyphenated.char_indices() {
        if i + c.len_utf8() > MAX_SLUG_BYTES {
            break;
        }
        end = i + c.len_utf8();
    }
    let slug = hyphenated[..end].trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Meeting files are keyed on the first 50 characters of the title.
pub fn meeting_slug(title: &str) -> String {
    let head: String = title.chars().take(50).collect();
    slugify(&head)
}

/// `[[slug|Display Name]]`
pub fn wiki_link(name: &str) -> String {
    format!("[[{}|{}]]", slugify(name), name)
}
