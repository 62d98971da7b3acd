use std::sync::LazyLock;

use regex::{Captures, Regex};

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{Alphabetic}\p{Nd}'’]+").expect("word pattern is valid"));

/// Title-case a display title: each word starts with a capital and the rest is lowercased.
///
/// A word is a run of letters, digits and apostrophes, so `don't` becomes `Don't`
/// and `3rd` stays `3rd`. Applying it twice gives the same result as applying it once.
pub fn title_case(text: &str) -> String {
    WORD.replace_all(text, |caps: &Captures| {
        let word = &caps[0];
        let mut chars = word.chars();
        let mut out = String::with_capacity(word.len());
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            for c in chars {
                out.extend(c.to_lowercase());
            }
        }
        out
    })
    .into_owned()
}

/// Escape text for inclusion in WordprocessingML, both in element content and attributes.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
