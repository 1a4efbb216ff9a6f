//! Filesystem- and URL-safe identifiers derived from display names.

/// Derive a slug from a display name.
///
/// Trims, lowercases, turns each whitespace run into a single hyphen, then
/// drops every character outside `[a-z0-9-]`. Unsafe characters are removed,
/// never escaped.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let mut hyphenated = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                hyphenated.push('-');
            }
            in_whitespace = true;
        } else {
            hyphenated.push(c);
            in_whitespace = false;
        }
    }

    hyphenated
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_examples() {
        assert_eq!(slugify("Dominus Empyreus!"), "dominus-empyreus");
        assert_eq!(slugify("  Multi   Space  "), "multi-space");
        assert_eq!(slugify("Red Hat"), "red-hat");
    }

    #[test]
    fn test_slugify_strips_unsafe_characters() {
        let slug = slugify("O'Brien's \"Hat\" / v2\t\u{7}beta");
        assert_eq!(slug, "obriens-hat--v2-beta");
        assert!(!slug.contains('/'));
        assert!(!slug.contains('\''));
        assert!(!slug.contains('"'));
        assert!(!slug.chars().any(char::is_whitespace));
    }

    #[test]
    fn test_slugify_mixed_whitespace_run() {
        assert_eq!(slugify("a \t\n b"), "a-b");
    }

    #[test]
    fn test_slugify_non_ascii_dropped() {
        assert_eq!(slugify("Café Crème"), "caf-crme");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_is_stable() {
        let name = "Sparkle Time Fedora";
        assert_eq!(slugify(name), slugify(name));
        assert_eq!(slugify(&slugify(name)), slugify(name));
    }
}
