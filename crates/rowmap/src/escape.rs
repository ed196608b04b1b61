//! String literal escaping for the MySQL dialect.
//!
//! [`escape`] is the only place untrusted text becomes SQL. Everything that renders a string
//! literal goes through [`quote`]; numbers and booleans are formatted directly.

/// Escape `text` for interpolation between single quotes.
///
/// Mirrors `mysql_real_escape_string` with the default SQL mode: NUL, line feed, carriage
/// return, backslash, both quote characters and Ctrl-Z are backslash-escaped.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    escape_into(&mut out, text);
    out
}

/// Render `text` as a quoted string literal: `'...'`.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    escape_into(&mut out, text);
    out.push('\'');
    out
}

pub(crate) fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
}

/// Escape `LIKE` wildcards in addition to the regular escaping.
pub(crate) fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        match ch {
            '%' => out.push_str("\\%"),
            '_' => out.push_str("\\_"),
            c => escape_into(&mut out, c.encode_utf8(&mut [0; 4])),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(escape("hello world"), "hello world");
        assert_eq!(escape(""), "");
        assert_eq!(escape("Привет"), "Привет");
    }

    #[test]
    fn quotes_cannot_terminate_the_literal() {
        assert_eq!(escape("O'Brien"), "O\\'Brien");
        assert_eq!(quote("x'; DROP TABLE users; --"), "'x\\'; DROP TABLE users; --'");
    }

    #[test]
    fn control_characters() {
        assert_eq!(escape("a\0b\nc\rd\x1ae"), "a\\0b\\nc\\rd\\Ze");
        assert_eq!(escape("back\\slash \"dq\""), "back\\\\slash \\\"dq\\\"");
    }

    #[test]
    fn trailing_backslash_cannot_eat_the_closing_quote() {
        assert_eq!(quote("abc\\"), "'abc\\\\'");
    }

    #[test]
    fn like_wildcards() {
        assert_eq!(escape_like("50%_off'"), "50\\%\\_off\\'");
    }
}
