// Paste padding for the chat client's compose box.
//
// The client drops trailing characters when pasted text contains emoji or
// other wide code points: one character is lost per such code point. Each one
// is compensated with a zero-width space appended to the end, so the visible
// text arrives intact.
use std::sync::OnceLock;

use regex::Regex;

pub const ZERO_WIDTH_MARKER: char = '\u{200b}';

fn marker_class() -> &'static Regex {
    static CLASS: OnceLock<Regex> = OnceLock::new();
    CLASS.get_or_init(|| {
        // Emoticons, pictographs, transport, flags, box drawing and dingbats,
        // everything from U+24C2 upward (CJK included), plus the joiners and
        // variation selector that ride along with emoji sequences.
        Regex::new(concat!(
            r"[",
            r"\x{1F600}-\x{1F64F}",
            r"\x{1F300}-\x{1F5FF}",
            r"\x{1F680}-\x{1F6FF}",
            r"\x{1F1E0}-\x{1F1FF}",
            r"\x{2500}-\x{2BEF}",
            r"\x{2702}-\x{27B0}",
            r"\x{24C2}-\x{1F251}",
            r"\x{1F926}-\x{1F937}",
            r"\x{10000}-\x{10FFFF}",
            r"\x{2640}-\x{2642}",
            r"\x{2600}-\x{2B55}",
            r"\x{200D}",
            r"\x{23CF}",
            r"\x{23E9}",
            r"\x{231A}",
            r"\x{FE0F}",
            r"\x{3030}",
            r"]+",
        ))
        .expect("marker class is a valid regex")
    })
}

/// Number of code points the client would swallow when `text` is pasted.
pub fn marker_count(text: &str) -> usize {
    marker_class()
        .find_iter(text)
        .map(|m| m.as_str().chars().count())
        .sum()
}

/// `text` followed by one zero-width marker per emoji-class code point.
/// The original text is always an unmodified prefix of the result.
pub fn pad_for_paste(text: &str) -> String {
    let count = marker_count(text);
    let mut padded = String::with_capacity(text.len() + count * ZERO_WIDTH_MARKER.len_utf8());
    padded.push_str(text);
    padded.extend(std::iter::repeat(ZERO_WIDTH_MARKER).take(count));
    padded
}
