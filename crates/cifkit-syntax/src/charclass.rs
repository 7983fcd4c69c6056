//! # Character Classes
//!
//! Lookup tables for the character classes of the CIF 1.1 grammar. The
//! tokenizer uses them to validate scanned input and the writer uses them to
//! decide whether a value can be written bare or needs quoting.
//!
//! | class        | members                                                  |
//! |--------------|----------------------------------------------------------|
//! | white        | space, tab, CR, LF, FF                                   |
//! | ordinary     | printable ASCII except `" # $ ' _ ; [ ]` and space       |
//! | non-blank    | printable ASCII except space                             |
//! | text-lead    | printable ASCII, space and tab, except `;`               |
//! | any-print    | printable ASCII, space and tab                           |
//!
//! Bytes at or above 0x80 belong to UTF-8 sequences and are treated as
//! ordinary, non-blank printable characters.

const WHITE: u8 = 1 << 0;
const ORDINARY: u8 = 1 << 1;
const NON_BLANK: u8 = 1 << 2;
const TEXT_LEAD: u8 = 1 << 3;
const ANY_PRINT: u8 = 1 << 4;

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut b = 0usize;
    while b < 256 {
        let c = b as u8;
        let mut class = 0u8;

        if c == b' ' || c == b'\t' || c == b'\r' || c == b'\n' || c == 0x0c {
            class |= WHITE;
        }

        if c == b' ' || c == b'\t' {
            class |= ANY_PRINT | TEXT_LEAD;
        }

        if (c > b' ' && c < 0x7f) || c >= 0x80 {
            class |= NON_BLANK | ANY_PRINT;
            if c != b';' {
                class |= TEXT_LEAD;
            }
            match c {
                b'"' | b'#' | b'$' | b'\'' | b'_' | b';' | b'[' | b']' => {}
                _ => class |= ORDINARY,
            }
        }

        table[b] = class;
        b += 1;
    }
    table
}

static CHAR_TABLE: [u8; 256] = build_table();

/// Space, tab, carriage return, line feed or form feed.
#[inline]
pub fn is_white(b: u8) -> bool {
    CHAR_TABLE[b as usize] & WHITE != 0
}

/// A character that may start an unquoted value.
#[inline]
pub fn is_ordinary(b: u8) -> bool {
    CHAR_TABLE[b as usize] & ORDINARY != 0
}

#[inline]
pub fn is_non_blank(b: u8) -> bool {
    CHAR_TABLE[b as usize] & NON_BLANK != 0
}

/// A character that may start a line inside a text field without closing it.
#[inline]
pub fn is_text_lead(b: u8) -> bool {
    CHAR_TABLE[b as usize] & TEXT_LEAD != 0
}

#[inline]
pub fn is_any_print(b: u8) -> bool {
    CHAR_TABLE[b as usize] & ANY_PRINT != 0
}

/// Control characters that may not appear in tokens. Tab, CR and LF are
/// handled by the grammar and are not included.
#[inline]
pub fn is_control(b: u8) -> bool {
    (b < 0x20 && b != b'\t' && b != b'\r' && b != b'\n') || b == 0x7f
}

/// Whether `text` starts with one of the reserved words of the format
/// (`data_`, `save_`, `loop_`, `global_`, `stop_`), compared case-insensitively.
pub fn is_reserved_word(text: &str) -> bool {
    let bytes = text.as_bytes();
    let starts = |prefix: &str| {
        bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    };
    starts("data_")
        || starts("save_")
        || text.eq_ignore_ascii_case("loop_")
        || text.eq_ignore_ascii_case("global_")
        || text.eq_ignore_ascii_case("stop_")
}

/// Whether `text` can be written without quotes and read back unchanged.
///
/// The placeholders `.` and `?` are excluded: written bare they would be read
/// back as inapplicable/unknown rather than as literal text.
pub fn is_unquoted_string(text: &str) -> bool {
    let bytes = text.as_bytes();
    match bytes.first() {
        None => false,
        Some(&first) if !is_ordinary(first) => false,
        Some(_) => {
            text != "."
                && text != "?"
                && bytes.iter().all(|&b| is_non_blank(b))
                && !is_reserved_word(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn white_space_bytes() {
        for b in [b' ', b'\t', b'\r', b'\n', 0x0c] {
            assert!(is_white(b), "{b:#x} should be white");
        }
        assert!(!is_white(b'a'));
        assert!(!is_white(b'_'));
    }

    #[test]
    fn ordinary_excludes_markers() {
        for b in *b"\"#$'_;[] " {
            assert!(!is_ordinary(b), "{:?} should not be ordinary", b as char);
        }
        for b in *b"aZ09.?-+()" {
            assert!(is_ordinary(b), "{:?} should be ordinary", b as char);
        }
    }

    #[test]
    fn text_lead_excludes_semicolon() {
        assert!(!is_text_lead(b';'));
        assert!(is_text_lead(b' '));
        assert!(is_text_lead(b'#'));
    }

    #[test]
    fn control_characters() {
        assert!(is_control(0x00));
        assert!(is_control(0x07));
        assert!(is_control(0x7f));
        assert!(!is_control(b'\t'));
        assert!(!is_control(b'\n'));
        assert!(!is_control(b'a'));
    }

    #[rstest]
    #[case("data_block", true)]
    #[case("DATA_x", true)]
    #[case("save_", true)]
    #[case("loop_", true)]
    #[case("Loop_", true)]
    #[case("loop_x", false)]
    #[case("global_", true)]
    #[case("stop_", true)]
    #[case("database", false)]
    fn reserved_words(#[case] text: &str, #[case] reserved: bool) {
        assert_eq!(is_reserved_word(text), reserved);
    }

    #[rstest]
    #[case("ALA", true)]
    #[case("1.5", true)]
    #[case("a'b", true)]
    #[case("", false)]
    #[case(".", false)]
    #[case("?", false)]
    #[case("two words", false)]
    #[case("_tag", false)]
    #[case("'quoted", false)]
    #[case(";semi", false)]
    #[case("#hash", false)]
    #[case("data_x", false)]
    fn unquoted_strings(#[case] text: &str, #[case] bare: bool) {
        assert_eq!(is_unquoted_string(text), bare, "{text:?}");
    }
}
