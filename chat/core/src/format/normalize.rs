//! Reply Normalizer
//!
//! Cleans up raw assistant text before it is formatted. Replies arrive from
//! the model with stray byte-order marks, full-width indentation and runs of
//! empty lines; none of that should reach the node tree.

/// Characters stripped from the start of every line.
const LEADING_JUNK: &[char] = &[
    '\u{FEFF}', // byte-order mark
    '\u{200B}', // zero-width space
    '\u{3000}', // ideographic space
    '\u{00A0}', // no-break space
    '\u{2002}', // en space
    '\u{2003}', // em space
    '\u{2009}', // thin space
    ' ',
    '\t',
];

/// Spaces replaced with an ordinary space anywhere in the text.
const WIDE_SPACES: &[char] = &['\u{00A0}', '\u{2002}', '\u{2003}', '\u{2009}'];

/// Normalize a raw reply.
///
/// - line breaks become `\n`
/// - no-break and wide spaces become `' '`
/// - each line loses its leading run of [`LEADING_JUNK`]
/// - blank lines at the start are dropped
/// - runs of blank lines collapse to a single empty line
///
/// The function is total and idempotent.
#[must_use]
pub fn normalize_reply(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let unified = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(WIDE_SPACES, " ");

    let mut collapsed: Vec<&str> = Vec::new();
    for line in unified.split('\n') {
        let line = line.trim_start_matches(LEADING_JUNK);
        if is_blank(line) {
            // Never lead with a blank, never stack two.
            if collapsed.last().map_or(true, |last| last.is_empty()) {
                continue;
            }
            collapsed.push("");
        } else {
            collapsed.push(line);
        }
    }

    collapsed.join("\n")
}

fn is_blank(line: &str) -> bool {
    line.chars()
        .all(|c| c.is_whitespace() || LEADING_JUNK.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_reply(""), "");
    }

    #[test]
    fn test_crlf_becomes_lf() {
        assert_eq!(normalize_reply("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_wide_spaces_replaced_internally() {
        assert_eq!(normalize_reply("a\u{00A0}b\u{2003}c"), "a b c");
    }

    #[test]
    fn test_leading_run_stripped() {
        let raw = "\u{FEFF}\u{3000}\u{3000}第一行\n\t  second line";
        assert_eq!(normalize_reply(raw), "第一行\nsecond line");
    }

    #[test]
    fn test_internal_ideographic_space_kept() {
        assert_eq!(normalize_reply("甲\u{3000}乙"), "甲\u{3000}乙");
    }

    #[test]
    fn test_leading_blank_lines_dropped() {
        assert_eq!(normalize_reply("\n\n  \n\u{3000}\nhello"), "hello");
    }

    #[test]
    fn test_blank_runs_collapse_to_one() {
        assert_eq!(normalize_reply("a\n\n\n \n\nb"), "a\n\nb");
    }

    #[test]
    fn test_trailing_blank_is_kept_once() {
        assert_eq!(normalize_reply("a\n\n\n"), "a\n");
    }

    #[test]
    fn test_only_blank_lines() {
        assert_eq!(normalize_reply("\n \n\t\n"), "");
    }

    #[test]
    fn test_idempotent_on_messy_inputs() {
        let samples = [
            "",
            "\u{FEFF}# 标题\r\n\r\n\r\n  - 一\n  - 二\n\n\n",
            "\u{00A0}\u{00A0}text\u{2009}more\n\n\u{3000}\n\nend  ",
            "\n\n\n",
            "**粗体**【重点】\r\r\rtail",
        ];
        for s in samples {
            let once = normalize_reply(s);
            assert_eq!(normalize_reply(&once), once, "input: {s:?}");
        }
    }
}
