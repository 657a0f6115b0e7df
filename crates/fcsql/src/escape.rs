//! Escape processing for quoted regex literals.
//!
//! The scanner hands over the raw text between the quotes; [`unescape`]
//! expands backslash escapes into the logical string passed downstream.
//! Regex metacharacters keep their backslash, so a literal dot typed by the
//! user stays a literal dot when the value reaches the regex engine.

use crate::error::ParseError;

/// Regex metacharacters whose escape survives unescaping.
const METACHARACTERS: &[char] = &['.', '^', '$', '*', '+', '?', '(', ')', '{', '[', '|'];

/// Expands backslash escapes in the raw content of a quoted literal.
///
/// `offset` is the character offset of the literal's first character in the
/// query, used to position errors at the offending escape.
pub fn unescape(raw: &str, offset: usize) -> Result<String, ParseError> {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch != '\\' {
            out.push(ch);
            i += 1;
            continue;
        }

        let at = offset + i;
        i += 1;
        let Some(&escaped) = chars.get(i) else {
            return Err(ParseError::lexical("truncated escape sequence: \\", Some(at)));
        };

        match escaped {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            c if METACHARACTERS.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            'x' => {
                out.push(unescape_codepoint(&chars, i, 2, at)?);
                i += 2;
            }
            'u' => {
                out.push(unescape_codepoint(&chars, i, 4, at)?);
                i += 4;
            }
            'U' => {
                out.push(unescape_codepoint(&chars, i, 8, at)?);
                i += 8;
            }
            c => {
                return Err(ParseError::lexical(
                    format!("invalid escape sequence: \\{c}"),
                    Some(at),
                ));
            }
        }
        i += 1;
    }

    Ok(out)
}

/// Decodes a fixed-width hexadecimal escape into one code point.
///
/// `introducer` indexes the `x`/`u`/`U` character; `at` is the query offset
/// of the backslash that started the escape.
fn unescape_codepoint(
    chars: &[char],
    introducer: usize,
    digits: usize,
    at: usize,
) -> Result<char, ParseError> {
    if chars.len() - introducer - 1 < digits {
        return Err(ParseError::lexical(
            format!("truncated escape sequence: \\{}", chars[introducer]),
            Some(at),
        ));
    }

    let mut codepoint: u32 = 0;
    for pos in 1..=digits {
        let digit = chars[introducer + pos];
        let value = digit.to_digit(16).ok_or_else(|| {
            ParseError::lexical(
                format!("invalid hex character: '{digit}'"),
                Some(at + 1 + pos),
            )
        })?;
        codepoint = (codepoint << 4) | value;
    }

    char::from_u32(codepoint).ok_or_else(|| {
        ParseError::lexical(format!("invalid codepoint: U+{codepoint:X}"), Some(at))
    })
}

/// Escapes a logical regex value back into quoted-literal form.
///
/// Inverse of [`unescape`] for the characters that need it: the output
/// re-parses to the same logical string.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
