//! Inline Markup Scanner
//!
//! Recognizes the four span markers the assistant uses inside a line:
//!
//! | Marker      | Node                                   |
//! |-------------|----------------------------------------|
//! | `**text**`  | [`InlineNode::Strong`]                 |
//! | `【text】`  | [`InlineNode::Highlight`] `Key`        |
//! | `〖text〗`  | [`InlineNode::Highlight`] `Accent`     |
//! | `「text」`  | [`InlineNode::Highlight`] `Quote`      |
//!
//! Spans never nest: the content of a span is emitted as one text leaf and
//! is not scanned again.
//!
//! # Overlap policy
//!
//! Each kind is scanned on its own, so spans of different kinds can overlap.
//! The merged list is ordered by start offset; no two spans share one.
//! Walking left to right, a span starting before the end of the last emitted
//! span is dropped and its markers stay in the surrounding text.

use serde::Serialize;

/// The three highlight classes, one per bracket pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightClass {
    /// `【…】`
    Key,
    /// `〖…〗`
    Accent,
    /// `「…」`
    Quote,
}

impl HighlightClass {
    /// CSS-like class name for surfaces that style by name
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Key => "highlight",
            Self::Accent => "accent",
            Self::Quote => "quote",
        }
    }
}

/// Kind of a recognized span
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// `**…**`
    Strong,
    /// One of the bracketed highlight classes
    Highlight(HighlightClass),
}

impl SpanKind {
    /// All kinds, in scan order
    pub const ALL: [SpanKind; 4] = [
        SpanKind::Strong,
        SpanKind::Highlight(HighlightClass::Key),
        SpanKind::Highlight(HighlightClass::Accent),
        SpanKind::Highlight(HighlightClass::Quote),
    ];

    /// Opening and closing delimiter
    #[must_use]
    pub fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Self::Strong => ("**", "**"),
            Self::Highlight(HighlightClass::Key) => ("【", "】"),
            Self::Highlight(HighlightClass::Accent) => ("〖", "〗"),
            Self::Highlight(HighlightClass::Quote) => ("「", "」"),
        }
    }
}

/// A span-level node of the rendered reply
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum InlineNode {
    /// Plain text
    Text(String),
    /// Bold / strong text
    Strong(String),
    /// Highlighted text
    Highlight {
        /// Which bracket pair produced it
        class: HighlightClass,
        /// The text between the brackets
        text: String,
    },
}

impl InlineNode {
    /// The visible text of this node (markers removed)
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Strong(text) | Self::Highlight { text, .. } => text,
        }
    }

    fn from_span(kind: SpanKind, content: &str) -> Self {
        match kind {
            SpanKind::Strong => Self::Strong(content.to_string()),
            SpanKind::Highlight(class) => Self::Highlight {
                class,
                text: content.to_string(),
            },
        }
    }
}

/// Concatenate the visible text of a node sequence
#[must_use]
pub fn plain_text(nodes: &[InlineNode]) -> String {
    nodes.iter().map(InlineNode::text).collect()
}

/// A span found by the per-kind scan (byte offsets into the input)
#[derive(Clone, Copy, Debug)]
struct Span {
    start: usize,
    end: usize,
    content_start: usize,
    content_end: usize,
    kind: SpanKind,
}

/// Split a line into inline nodes.
///
/// Concatenating [`InlineNode::text`] of the result always yields the input
/// with the markers of emitted spans removed. A string without markers
/// (including the empty string) comes back as a single text node.
#[must_use]
pub fn parse_inline(s: &str) -> Vec<InlineNode> {
    let mut spans = Vec::new();
    for kind in SpanKind::ALL {
        scan_kind(s, kind, &mut spans);
    }

    // Opening markers differ in their first char and one kind never
    // overlaps itself, so start offsets are unique.
    spans.sort_by_key(|span| span.start);

    let mut nodes = Vec::new();
    let mut cursor = 0;
    for span in &spans {
        if span.start < cursor {
            continue;
        }
        if span.start > cursor {
            nodes.push(InlineNode::Text(s[cursor..span.start].to_string()));
        }
        nodes.push(InlineNode::from_span(
            span.kind,
            &s[span.content_start..span.content_end],
        ));
        cursor = span.end;
    }

    if cursor < s.len() {
        nodes.push(InlineNode::Text(s[cursor..].to_string()));
    }
    if nodes.is_empty() {
        nodes.push(InlineNode::Text(s.to_string()));
    }

    nodes
}

/// Collect every non-overlapping occurrence of one kind, leftmost first.
///
/// Content is at least one character, shortest match wins, and a span never
/// crosses a line break.
fn scan_kind(s: &str, kind: SpanKind, spans: &mut Vec<Span>) {
    let (open, close) = kind.delimiters();
    let mut pos = 0;

    while pos < s.len() {
        let Some(rel) = s[pos..].find(open) else {
            break;
        };
        let start = pos + rel;
        let content_start = start + open.len();

        if let Some(content_end) = find_close(s, content_start, close) {
            let end = content_end + close.len();
            spans.push(Span {
                start,
                end,
                content_start,
                content_end,
                kind,
            });
            pos = end;
        } else {
            // Retry one character further on
            let step = s[start..].chars().next().map_or(1, char::len_utf8);
            pos = start + step;
        }
    }
}

fn find_close(s: &str, content_start: usize, close: &str) -> Option<usize> {
    let rest = &s[content_start..];
    let first = rest.chars().next()?;
    if first == '\n' {
        return None;
    }

    let search_from = content_start + first.len_utf8();
    let line_end = rest.find('\n').map_or(s.len(), |i| content_start + i);
    s[search_from..line_end]
        .find(close)
        .map(|i| search_from + i)
}
