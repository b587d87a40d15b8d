//! Name slugs and id shapes.
//!
//! A slug is the normalized, filesystem/identifier-safe form of a document
//! name: lowercased, apostrophes removed, every other non-alphanumeric run
//! collapsed to a single dash. Source files are named `<slug>.json` and the
//! finalizer stores the slug on items, so the transform must be stable.

/// Compute the slug of a document name.
pub fn sluggify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// True for a document id: a 16-character alphanumeric token.
pub fn is_document_id(s: &str) -> bool {
    s.len() == 16 && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// True for an id-shaped object key: 20 or more lowercase-alphanumeric
/// characters. The canonical printer appends such keys after the
/// alphabetized ones so long opaque ids do not disrupt diffs.
pub fn is_id_shaped_key(s: &str) -> bool {
    s.len() >= 20
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sluggify_basic() {
        assert_eq!(sluggify("Fireball"), "fireball");
        assert_eq!(sluggify("Acid Arrow"), "acid-arrow");
    }

    #[test]
    fn test_sluggify_apostrophes() {
        assert_eq!(sluggify("Mage's Armor"), "mages-armor");
        assert_eq!(sluggify("Hunter\u{2019}s Bow"), "hunters-bow");
    }

    #[test]
    fn test_sluggify_punctuation_runs() {
        assert_eq!(sluggify("Blade (Greater)"), "blade-greater");
        assert_eq!(sluggify("  Trimmed  "), "trimmed");
        assert_eq!(sluggify("+1 Striking"), "1-striking");
    }

    #[test]
    fn test_sluggify_idempotent() {
        let once = sluggify("Will-o'-Wisp");
        assert_eq!(once, "will-o-wisp");
        assert_eq!(sluggify(&once), once);
    }

    #[test]
    fn test_document_id_shape() {
        assert!(is_document_id("a1b2c3d4e5f6a7b8"));
        assert!(is_document_id("AbCdEfGhIjKlMnOp"));
        assert!(!is_document_id("short"));
        assert!(!is_document_id("a1b2c3d4e5f6a7b8x"));
        assert!(!is_document_id("a1b2c3d4-5f6a7b8"));
    }

    #[test]
    fn test_id_shaped_key() {
        assert!(is_id_shaped_key("abcdefghij0123456789"));
        assert!(!is_id_shaped_key("abcdefghij012345678"));
        assert!(!is_id_shaped_key("Abcdefghij0123456789"));
        assert!(!is_id_shaped_key("name"));
    }
}
