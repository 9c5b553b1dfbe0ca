//! Component extraction from puzzle bodies.
//!
//! Splits raw content into typed sets: pictographic symbols, numbers,
//! directional arrows, lowercase words and other marks. Multi-codepoint emoji
//! (variation selectors, skin tones, ZWJ sequences, keycaps, flags) are kept
//! together as one symbol. Presentation selectors are stripped so `❤️` and `❤`
//! are the same symbol. Pictographs are recognized by the Unicode
//! `Extended_Pictographic` property.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::LazyLock;

const ZWJ: char = '\u{200D}';
const VS15: char = '\u{FE0E}';
const VS16: char = '\u{FE0F}';
const KEYCAP: char = '\u{20E3}';

/// Typed component sets of a puzzle body. Order is not significant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentComponents {
    pub symbols: BTreeSet<String>,
    pub numbers: BTreeSet<String>,
    pub directionals: BTreeSet<String>,
    pub text: BTreeSet<String>,
    pub other: BTreeSet<String>,
}

impl ContentComponents {
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }

    /// Number of distinct elements across every set.
    pub fn total(&self) -> usize {
        self.symbols.len()
            + self.numbers.len()
            + self.directionals.len()
            + self.text.len()
            + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Extracts component sets from raw content.
pub fn extract_components(content: &str) -> ContentComponents {
    let mut components = ContentComponents::default();
    let mut chars = content.chars().peekable();
    let mut word = String::new();

    while let Some(c) = chars.next() {
        if c.is_alphabetic() && !is_regional_indicator(c) {
            word.extend(c.to_lowercase());
            continue;
        }
        if c == '\'' && !word.is_empty() && chars.peek().is_some_and(|n| n.is_alphabetic()) {
            word.push(c);
            continue;
        }
        flush_word(&mut word, &mut components.text);

        if c.is_whitespace() || is_presentation_mark(c) {
            continue;
        }

        if c.is_ascii_digit() {
            let mut number = String::from(c);
            while let Some(&next) = chars.peek() {
                if next.is_ascii_digit() {
                    number.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            // Keycap digits (1️⃣) carry trailing selector/keycap marks.
            while chars.peek().is_some_and(|&n| n == VS16 || n == KEYCAP) {
                chars.next();
            }
            components.numbers.insert(number);
            continue;
        }

        if is_keycap_base(c) && chars.peek().is_some_and(|&n| n == VS16 || n == KEYCAP) {
            components.symbols.insert(take_symbol_cluster(c, &mut chars));
            continue;
        }

        if is_directional(c) {
            skip_presentation(&mut chars);
            components.directionals.insert(c.to_string());
            continue;
        }

        if is_pictographic(c) {
            components.symbols.insert(take_symbol_cluster(c, &mut chars));
            continue;
        }

        components.other.insert(c.to_string());
    }
    flush_word(&mut word, &mut components.text);

    components
}

fn flush_word(word: &mut String, text: &mut BTreeSet<String>) {
    if !word.is_empty() {
        text.insert(std::mem::take(word));
    }
}

fn skip_presentation(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|&n| n == VS15 || n == VS16) {
        chars.next();
    }
}

/// Consumes the modifiers and joined parts following `base`.
fn take_symbol_cluster(base: char, chars: &mut Peekable<Chars<'_>>) -> String {
    let mut cluster = String::from(base);

    if is_regional_indicator(base) {
        if let Some(&next) = chars.peek() {
            if is_regional_indicator(next) {
                cluster.push(next);
                chars.next();
            }
        }
        return cluster;
    }

    loop {
        match chars.peek().copied() {
            Some(VS15) | Some(VS16) => {
                chars.next();
            }
            Some(m) if is_skin_tone(m) || is_tag(m) || m == KEYCAP => {
                cluster.push(m);
                chars.next();
            }
            Some(ZWJ) => {
                chars.next();
                match chars.peek().copied() {
                    Some(joined) if !joined.is_whitespace() => {
                        cluster.push(ZWJ);
                        cluster.push(joined);
                        chars.next();
                    }
                    _ => break,
                }
            }
            _ => break,
        }
    }
    cluster
}

fn is_presentation_mark(c: char) -> bool {
    matches!(c, VS15 | VS16 | ZWJ | KEYCAP)
}

fn is_skin_tone(c: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

fn is_tag(c: char) -> bool {
    ('\u{E0020}'..='\u{E007F}').contains(&c)
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

static PICTOGRAPHIC: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[\p{Extended_Pictographic}\p{Regional_Indicator}]$").ok()
});

static DIRECTIONAL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[\x{2190}-\x{21FF}\x{27A1}\x{27B0}\x{27BF}\x{2934}\x{2935}",
        r"\x{2B05}-\x{2B07}\x{2B95}\x{1F500}-\x{1F504}\x{1F519}-\x{1F51D}]$"
    ))
    .ok()
});

fn matches_char(pattern: Option<&Regex>, c: char) -> bool {
    let mut buf = [0u8; 4];
    pattern.is_some_and(|re| re.is_match(c.encode_utf8(&mut buf)))
}

/// Arrow characters, checked before the pictographic class.
fn is_directional(c: char) -> bool {
    matches_char(DIRECTIONAL.as_ref(), c)
}

fn is_pictographic(c: char) -> bool {
    matches_char(PICTOGRAPHIC.as_ref(), c)
}

fn is_keycap_base(c: char) -> bool {
    matches!(c, '#' | '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_emoji_sequence() {
        let components = extract_components("🦁👑");
        assert_eq!(components.symbols, set(&["🦁", "👑"]));
        assert!(components.text.is_empty());
    }

    #[test]
    fn test_duplicates_collapse_into_sets() {
        let components = extract_components("🐝🐝🐝");
        assert_eq!(components.symbols.len(), 1);
    }

    #[test]
    fn test_variation_selector_is_normalized() {
        let with_selector = extract_components("❤\u{FE0F}");
        let without = extract_components("❤");
        assert_eq!(with_selector.symbols, without.symbols);
    }

    #[test]
    fn test_zwj_and_skin_tone_stay_clustered() {
        let family = "👨\u{200D}👩\u{200D}👧";
        let wave = "👋\u{1F3FD}";
        let components = extract_components(&format!("{family} {wave}"));
        assert_eq!(components.symbols, set(&[family, wave]));
    }

    #[test]
    fn test_flags_pair_regional_indicators() {
        let components = extract_components("🇫🇷🗼");
        assert_eq!(components.symbols, set(&["🇫🇷", "🗼"]));
    }

    #[test]
    fn test_mixed_content() {
        let components = extract_components("🐟 + 2 ➡️ Nemo's 🔍");
        assert_eq!(components.symbols, set(&["🐟", "🔍"]));
        assert_eq!(components.numbers, set(&["2"]));
        assert_eq!(components.directionals, set(&["➡"]));
        assert_eq!(components.text, set(&["nemo's"]));
        assert_eq!(components.other, set(&["+"]));
        assert!(components.has_text());
        assert_eq!(components.total(), 6);
    }

    #[test]
    fn test_keycap_digit_is_a_number() {
        let components = extract_components("4\u{FE0F}\u{20E3}🍀");
        assert_eq!(components.numbers, set(&["4"]));
        assert_eq!(components.symbols, set(&["🍀"]));
    }

    #[test]
    fn test_symbol_keycaps_are_symbols() {
        let components = extract_components("#\u{FE0F}\u{20E3} *\u{20E3} #");
        assert_eq!(components.symbols, set(&["#\u{20E3}", "*\u{20E3}"]));
        assert_eq!(components.other, set(&["#"]));
    }

    #[test]
    fn test_pictographic_class_covers_text_style_symbols() {
        let components = extract_components("©™⌛🫠");
        assert_eq!(components.symbols, set(&["©", "™", "⌛", "🫠"]));
        assert!(components.other.is_empty());
    }

    #[test]
    fn test_empty_content() {
        assert!(extract_components("   ").is_empty());
    }
}
