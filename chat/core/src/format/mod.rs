//! Reply Formatting
//!
//! Pure functions that turn assistant text into a node tree for rich
//! display. Nothing here does I/O or keeps state.
//!
//! ```text
//! raw reply ──normalize_reply──▶ clean text ──format_markdown──▶ Vec<BlockNode>
//!                                                  │
//!                                        parse_inline per line/item
//!                                                  ▼
//!                                           Vec<InlineNode>
//! ```
//!
//! # Example
//!
//! ```
//! use chat_core::format::{format_markdown, normalize_reply, BlockNode, HeadingLevel};
//!
//! let nodes = format_markdown(&normalize_reply("\u{3000}# 事业\n\n\n今年**稳中有升**"));
//! assert_eq!(nodes.len(), 2);
//! assert!(matches!(nodes[0], BlockNode::Heading { level: HeadingLevel::H1, .. }));
//! ```

mod block;
mod inline;
mod normalize;

pub use block::{format_markdown, BlockNode, HeadingLevel};
pub use inline::{parse_inline, plain_text, HighlightClass, InlineNode, SpanKind};
pub use normalize::normalize_reply;

/// Normalize then format, the path every assistant reply takes
#[must_use]
pub fn render_reply(raw: &str) -> Vec<BlockNode> {
    format_markdown(&normalize_reply(raw))
}
