//! Cleanup applied to raw page text before it becomes a chunk.

use once_cell::sync::Lazy;
use regex::Regex;

/// Second halves of hyphenated compounds that should keep their hyphen when
/// a line break falls on it ("data-\ndriven" stays "data-driven").
const COMPOUND_SUFFIXES: &[&str] = &[
    "aware",
    "based",
    "driven",
    "free",
    "grained",
    "level",
    "like",
    "oriented",
    "scale",
    "specific",
    "shot",
    "step",
    "time",
    "wise",
];

/// Expand typographic ligatures that MuPDF reports as single code points.
pub fn expand_ligatures(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

/// Rejoin words split by a hyphen at the end of a line.
///
/// `"summa-\nrization"` becomes `"summarization"`. The hyphen is kept for
/// known compound suffixes, after a digit (`"GPT-\n4"`), and before a
/// capital letter (`"Map-\nReduce"`).
pub fn fix_hyphenation(text: &str) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)-[ \t]*\n[ \t]*(\w+)").unwrap());

    RE.replace_all(text, |caps: &regex::Captures| {
        let before = &caps[1];
        let after = &caps[2];

        let keep = before.chars().all(|c| c.is_ascii_digit())
            || after.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
            || COMPOUND_SUFFIXES.contains(&after.to_lowercase().as_str());

        if keep {
            format!("{before}-{after}")
        } else {
            format!("{before}{after}")
        }
    })
    .into_owned()
}

/// Full cleanup for one page: ligatures, line-break hyphenation, trailing
/// spaces, and runs of blank lines collapsed to one.
pub fn clean_page(text: &str) -> String {
    static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

    let text = fix_hyphenation(&expand_ligatures(text));
    let trimmed: Vec<&str> = text.lines().map(str::trim_end).collect();
    BLANK_RUNS
        .replace_all(trimmed.join("\n").trim(), "\n\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ligatures() {
        assert_eq!(expand_ligatures("ﬁndings ﬂow"), "findings flow");
        assert_eq!(expand_ligatures("eﬃcient"), "efficient");
    }

    #[test]
    fn line_break_syllables_are_joined() {
        assert_eq!(fix_hyphenation("summa-\nrization"), "summarization");
        assert_eq!(fix_hyphenation("trans- \n  former"), "transformer");
    }

    #[test]
    fn compounds_keep_their_hyphen() {
        assert_eq!(fix_hyphenation("data-\ndriven"), "data-driven");
        assert_eq!(fix_hyphenation("Map-\nReduce"), "Map-Reduce");
        assert_eq!(fix_hyphenation("GPT-\n4"), "GPT-4");
    }

    #[test]
    fn inline_hyphens_are_untouched() {
        assert_eq!(fix_hyphenation("state-of-the-art"), "state-of-the-art");
    }

    #[test]
    fn clean_page_collapses_blank_lines() {
        let raw = "Intro   \n\n\n\nWe pro-\npose a ﬁx.\n\n";
        assert_eq!(clean_page(raw), "Intro\n\nWe propose a fix.");
    }
}
