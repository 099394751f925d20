//! XML 1.0 character classes and start-tag checks that `quick-xml` leaves to
//! its callers.

/// `Char` production: tab, newline, carriage return and everything from space
/// upward except surrogates and U+FFFE/U+FFFF
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c as u32,
        0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

pub fn is_name_start_char(c: char) -> bool {
    matches!(
        c as u32,
        0x3A | 0x41..=0x5A
            | 0x5F
            | 0x61..=0x7A
            | 0xC0..=0xD6
            | 0xD8..=0xF6
            | 0xF8..=0x2FF
            | 0x370..=0x37D
            | 0x37F..=0x1FFF
            | 0x200C..=0x200D
            | 0x2070..=0x218F
            | 0x2C00..=0x2FEF
            | 0x3001..=0xD7FF
            | 0xF900..=0xFDCF
            | 0xFDF0..=0xFFFD
            | 0x10000..=0xEFFFF
    )
}

pub fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(
            c as u32,
            0x2D | 0x2E | 0x30..=0x39 | 0xB7 | 0x300..=0x36F | 0x203F..=0x2040
        )
}

/// Whether `s` matches the `Name` production. Prefixes are not split, so
/// `ns:Item` is a single name.
pub fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

/// First character in `text` that may not appear in an XML document
pub fn find_illegal_char(text: &str) -> Option<char> {
    text.chars().find(|&c| !is_xml_char(c))
}

/// Check the attribute region of a start tag (the bytes after the element
/// name). A quoted value may not contain a raw `<`, and a closing quote must be
/// followed by whitespace or the end of the tag.
pub fn check_attribute_syntax(raw: &[u8]) -> Result<(), &'static str> {
    let mut quote: Option<u8> = None;
    let mut after_value = false;

    for &b in raw {
        match quote {
            Some(q) if b == q => {
                quote = None;
                after_value = true;
            }
            Some(_) if b == b'<' => return Err("'<' not allowed in attribute value"),
            Some(_) => {}
            None => {
                if after_value && !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'/') {
                    return Err("whitespace required between attributes");
                }
                after_value = false;
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(is_name("root"));
        assert!(is_name("ns:Item"));
        assert!(is_name("_x-1.2"));
        assert!(is_name("été"));
        assert!(!is_name("1a"));
        assert!(!is_name("-a"));
        assert!(!is_name(""));
        assert!(!is_name("a b"));
    }

    #[test]
    fn test_illegal_chars() {
        assert_eq!(find_illegal_char("tab\tnewline\n"), None);
        assert_eq!(find_illegal_char("a\u{1}b"), Some('\u{1}'));
        assert_eq!(find_illegal_char("\u{FFFE}"), Some('\u{FFFE}'));
    }

    #[test]
    fn test_attribute_syntax() {
        assert!(check_attribute_syntax(br#" a="1" b='2'"#).is_ok());
        assert!(check_attribute_syntax(br#" a = "x > y" "#).is_ok());
        assert!(check_attribute_syntax(br#" a="1"/"#).is_ok());
        assert!(check_attribute_syntax(b"").is_ok());
        assert_eq!(
            check_attribute_syntax(br#" x="<""#),
            Err("'<' not allowed in attribute value")
        );
        assert_eq!(
            check_attribute_syntax(b" x='1'y='2'"),
            Err("whitespace required between attributes")
        );
    }
}
