//! Block Formatter
//!
//! Turns normalized reply text into a flat sequence of block nodes:
//! paragraphs, headings (levels 1-3) and unordered lists. Only the subset of
//! Markdown the assistant actually produces is understood; everything else
//! is paragraph text.

use serde::Serialize;

use super::inline::{parse_inline, InlineNode};

/// Heading level after clamping
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HeadingLevel {
    /// `#`
    H1,
    /// `##`
    H2,
    /// `###` and deeper
    H3,
}

impl HeadingLevel {
    /// Level for a run of `#` characters; anything past three is clamped
    #[must_use]
    pub fn from_marker_count(count: usize) -> Self {
        match count {
            0 | 1 => Self::H1,
            2 => Self::H2,
            _ => Self::H3,
        }
    }

    /// Numeric level (1-3)
    #[must_use]
    pub fn depth(self) -> u8 {
        match self {
            Self::H1 => 1,
            Self::H2 => 2,
            Self::H3 => 3,
        }
    }
}

/// A structural node of the rendered reply
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockNode {
    /// A paragraph of joined lines
    Paragraph {
        /// Inline content
        children: Vec<InlineNode>,
    },
    /// A heading
    Heading {
        /// Clamped level
        level: HeadingLevel,
        /// Inline content (empty for a bare marker)
        children: Vec<InlineNode>,
    },
    /// An unordered list; numbered items land here too
    List {
        /// One inline sequence per item
        items: Vec<Vec<InlineNode>>,
    },
}

/// Format normalized text into block nodes.
///
/// A fresh tree is built on every call.
#[must_use]
pub fn format_markdown(text: &str) -> Vec<BlockNode> {
    let text = text.replace("\r\n", "\n");
    let mut builder = BlockBuilder::default();

    for raw in text.split('\n') {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            builder.flush_paragraph();
            builder.flush_list();
            continue;
        }

        if let Some((level, content)) = match_heading(trimmed) {
            builder.flush_paragraph();
            builder.flush_list();
            let children = if content.is_empty() {
                Vec::new()
            } else {
                parse_inline(content)
            };
            builder.nodes.push(BlockNode::Heading { level, children });
            continue;
        }

        if let Some(item) = match_list_item(trimmed) {
            builder.flush_paragraph();
            builder.list.get_or_insert_with(Vec::new).push(item);
            continue;
        }

        builder.flush_list();
        builder.paragraph.push(trimmed);
    }

    builder.flush_paragraph();
    builder.flush_list();
    builder.nodes
}

#[derive(Default)]
struct BlockBuilder<'a> {
    nodes: Vec<BlockNode>,
    paragraph: Vec<&'a str>,
    list: Option<Vec<&'a str>>,
}

impl BlockBuilder<'_> {
    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let joined = self.paragraph.join(" ");
        self.paragraph.clear();

        let content = joined.trim();
        if !content.is_empty() {
            self.nodes.push(BlockNode::Paragraph {
                children: parse_inline(content),
            });
        }
    }

    fn flush_list(&mut self) {
        let Some(items) = self.list.take() else {
            return;
        };
        if items.is_empty() {
            return;
        }
        self.nodes.push(BlockNode::List {
            items: items
                .into_iter()
                .map(|item| parse_inline(item.trim()))
                .collect(),
        });
    }
}

/// `#{1,6}`, optional whitespace, content.
///
/// A seventh `#` is not part of the marker and stays in the content.
fn match_heading(line: &str) -> Option<(HeadingLevel, &str)> {
    let hashes = line.bytes().take(6).take_while(|b| *b == b'#').count();
    if hashes == 0 {
        return None;
    }
    let content = line[hashes..].trim();
    Some((HeadingLevel::from_marker_count(hashes), content))
}

/// `-`, `*` or `+`, or digits then `.`, followed by whitespace and content.
fn match_list_item(line: &str) -> Option<&str> {
    let marker_len = match line.chars().next()? {
        '-' | '*' | '+' => 1,
        c if c.is_ascii_digit() => {
            let digits = line.bytes().take_while(u8::is_ascii_digit).count();
            if line[digits..].starts_with('.') {
                digits + 1
            } else {
                return None;
            }
        }
        _ => return None,
    };

    let rest = &line[marker_len..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}
