//! Post text sanitization: decode HTML entities, then strip characters that would break a
//! tab-separated row.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

static ENTITY_RE: OnceLock<Regex> = OnceLock::new();

fn entity_re() -> &'static Regex {
    ENTITY_RE.get_or_init(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]{1,31});").unwrap())
}

/// Numeric references that browsers remap: NUL and the C1 range read as windows-1252.
fn remapped_charref(n: u32) -> Option<char> {
    let c = match n {
        0x00 => '\u{fffd}',
        0x0d => '\r',
        0x80 => '\u{20ac}',
        0x82 => '\u{201a}',
        0x83 => '\u{0192}',
        0x84 => '\u{201e}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02c6}',
        0x89 => '\u{2030}',
        0x8a => '\u{0160}',
        0x8b => '\u{2039}',
        0x8c => '\u{0152}',
        0x8e => '\u{017d}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201c}',
        0x94 => '\u{201d}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02dc}',
        0x99 => '\u{2122}',
        0x9a => '\u{0161}',
        0x9b => '\u{203a}',
        0x9c => '\u{0153}',
        0x9e => '\u{017e}',
        0x9f => '\u{0178}',
        _ => return None,
    };
    Some(c)
}

/// Surrogates and values past U+10FFFF become U+FFFD.
fn numeric_charref(digits: &str, radix: u32) -> char {
    match u32::from_str_radix(digits, radix) {
        Ok(n) => remapped_charref(n).or_else(|| char::from_u32(n)).unwrap_or('\u{fffd}'),
        Err(_) => '\u{fffd}',
    }
}

/// Decode HTML character references (`&amp;`, `&eacute;`, `&#39;`, `&#x1F600;`, ...) in one
/// pass. Named references use the full HTML5 table; unknown names are left untouched.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    entity_re().replace_all(input, |caps: &Captures| {
        let body = &caps[1];
        if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
            numeric_charref(hex, 16).to_string()
        } else if let Some(dec) = body.strip_prefix('#') {
            numeric_charref(dec, 10).to_string()
        } else {
            html_escape::decode_html_entities(&caps[0]).into_owned()
        }
    })
}

/// Clean post text for TSV output: entities decoded, `"` becomes `'`,
/// newlines, carriage returns and tabs become single spaces.
pub fn clean_text(input: &str) -> String {
    let decoded = if input.contains('&') { decode_entities(input) } else { Cow::Borrowed(input) };
    decoded
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' | '\t' => ' ',
            c => c,
        })
        .collect()
}
