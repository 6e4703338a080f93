//! URL slugs

/// Derive a slug from a title: lowercase ASCII alphanumerics, every other run
/// of characters collapsed into a single hyphen.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Lowercase ASCII alphanumeric words joined by single hyphens
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.split('-').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("CSS Grid Layout: A Comprehensive Guide"),
            "css-grid-layout-a-comprehensive-guide"
        );
        assert_eq!(slugify("  Node.js -- Express!  "), "node-js-express");
        assert_eq!(slugify("UI/UX"), "ui-ux");
        assert_eq!(slugify("???"), "untitled");
    }

    #[test]
    fn test_slugify_output_is_valid() {
        for title in ["Hello, World", "Über 9000", "a  b", "-x-"] {
            assert!(is_valid_slug(&slugify(title)), "{}", title);
        }
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("web-development"));
        assert!(is_valid_slug("nodejs2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Web-Dev"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("has space"));
    }
}
