//! Placeholder marking.
//!
//! Before parsing, every placeholder site is replaced by the same quoted
//! string, [`SENTINEL`]. A quoted string is valid both as a key and as a
//! value, so the text parses no matter which role a placeholder plays; the
//! tree walk decides the role afterwards.
//!
//! A literal string in the template equal to the sentinel is
//! indistinguishable from a marker. The interpolator detects that case by
//! counting markers against values, which catches every collision that
//! changes the count but cannot be made airtight without placeholder tokens
//! in the grammar itself.

/// The reserved marker string. Templates must not contain it literally.
pub const SENTINEL: &str = "ꙮ⸎ᚦ⟒ᛝ⧫ꕥ℘⟟ᚸ᎒ꘜ⸙ᛉ⟡ᘓꔪ⸾ᚱ⟐ꗃ⁂ᛟ⧊ꖴ⸭ᚷ⟓ꘛ";

/// Joins the fragments with a quoted sentinel at each placeholder site.
pub(crate) fn marker_text(fragments: &[String]) -> String {
    let marker = format!("\"{}\"", SENTINEL);
    let capacity = fragments.iter().map(String::len).sum::<usize>()
        + marker.len() * fragments.len().saturating_sub(1);
    let mut text = String::with_capacity(capacity);
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            text.push_str(&marker);
        }
        text.push_str(fragment);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_marker_per_site() {
        let text = marker_text(&fragments(&["{ ", ": 1, k: ", " }"]));
        assert_eq!(text.matches(SENTINEL).count(), 2);
        assert_eq!(
            text,
            format!("{{ \"{s}\": 1, k: \"{s}\" }}", s = SENTINEL)
        );
    }

    #[test]
    fn no_sites_is_identity() {
        assert_eq!(marker_text(&fragments(&["{ a: 1 }"])), "{ a: 1 }");
    }

    #[test]
    fn sentinel_needs_no_escaping() {
        assert!(!SENTINEL.contains(['"', '\'', '\\']));
        let marker = format!("\"{}\"", SENTINEL);
        assert_eq!(extplate_bson::parse(&marker).unwrap().as_str(), Some(SENTINEL));
    }
}
