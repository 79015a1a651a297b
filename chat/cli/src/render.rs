//! Terminal rendering of reply node trees
//!
//! Headings keep their `#` markers, list items get bullets, paragraphs are
//! wrapped to the terminal width. Emphasis and highlights are styled with
//! ANSI escapes when color is on.

use chat_core::format::{BlockNode, HighlightClass, InlineNode};
use chat_core::transcript::{Message, Role};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const KEY: &str = "\x1b[1;33m";
const ACCENT: &str = "\x1b[36m";
const QUOTE: &str = "\x1b[3m";
const DIM: &str = "\x1b[2m";

/// How to lay out rendered text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Wrap column
    pub width: usize,
    /// Emit ANSI styles
    pub color: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 80,
            color: false,
        }
    }
}

fn styled(out: &mut String, style: &str, text: &str, color: bool) {
    if color {
        out.push_str(style);
        out.push_str(text);
        out.push_str(RESET);
    } else {
        out.push_str(text);
    }
}

/// Render inline nodes to one styled line
pub fn render_inline(nodes: &[InlineNode], color: bool) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            InlineNode::Text(text) => out.push_str(text),
            InlineNode::Strong(text) => styled(&mut out, BOLD, text, color),
            InlineNode::Highlight { class, text } => {
                let style = match class {
                    HighlightClass::Key => KEY,
                    HighlightClass::Accent => ACCENT,
                    HighlightClass::Quote => QUOTE,
                };
                styled(&mut out, style, text, color);
            }
        }
    }
    out
}

/// Render a block list; blocks are separated by one blank line
pub fn render_blocks(blocks: &[BlockNode], options: RenderOptions) -> String {
    let width = options.width.max(20);
    let mut rendered = Vec::with_capacity(blocks.len());

    for block in blocks {
        let text = match block {
            BlockNode::Heading { level, children } => {
                let marker = "#".repeat(usize::from(level.depth()));
                let mut line = String::new();
                styled(
                    &mut line,
                    BOLD,
                    &format!("{marker} {}", render_inline(children, options.color)),
                    options.color,
                );
                line
            }
            BlockNode::Paragraph { children } => {
                textwrap::fill(&render_inline(children, options.color), width)
            }
            BlockNode::List { items } => {
                let wrap = textwrap::Options::new(width)
                    .initial_indent("  • ")
                    .subsequent_indent("    ");
                items
                    .iter()
                    .map(|item| textwrap::fill(&render_inline(item, options.color), &wrap))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        rendered.push(text);
    }

    rendered.join("\n\n")
}

/// Render one transcript message with a role label
pub fn render_message(message: &Message, options: RenderOptions) -> String {
    let label = match message.role {
        Role::User => "你",
        Role::Assistant => "助手",
    };
    let mut out = String::new();
    styled(&mut out, DIM, &format!("[{label}]"), options.color);
    out.push('\n');
    out.push_str(&render_blocks(&message.nodes, options));
    if message.truncated {
        out.push_str("\n\n");
        styled(
            &mut out,
            DIM,
            "(preview only; sign in with --authenticated to read the full reply)",
            options.color,
        );
    }
    out
}
