//! Reading and writing HTML markup.
//!
//! - [`decode`] turns raw bytes into text.
//! - [`parse`] builds a tree from text. Malformed markup is recovered from, not rejected.
//! - [`render`] writes a tree back as markup.

mod decode;
mod parser;
mod render;

use std::fmt;

use crate::dom::TreeError;

pub use decode::decode;
pub use parser::{DEFAULT_MAX_DEPTH, ParseOptions, parse, parse_with};
pub use render::{
    MAX_RENDER_DEPTH, MarkupWriter, RenderError, escape_string, render, render_children,
    render_to_string,
};

/// Elements that never have children.
///
/// The serializer writes them as `<tag/>` and the parser never pushes them on the open element stack.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose Text children are written without escaping.
pub const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe",
    "noembed",
    "noframes",
    "noscript",
    "plaintext",
    "script",
    "style",
    "xmp",
];

/// Elements whose content the parser reads as text up to the matching end tag,
/// decoding character references.
pub const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

/// Errors of [`decode`] and [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The encoding label is not known to the WHATWG Encoding Standard.
    UnknownEncoding(String),
    /// Elements are nested deeper than [`ParseOptions::max_depth`].
    TooDeep(usize),
    /// A node returned by the allocation hook could not be inserted,
    /// or a capability failed to initialize its node.
    Tree(TreeError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownEncoding(label) => write!(f, "unknown encoding label {label:?}"),
            ParseError::TooDeep(depth) => {
                write!(f, "elements are nested deeper than {depth} levels")
            }
            ParseError::Tree(err) => write!(f, "failed to build the tree: {err}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Tree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TreeError> for ParseError {
    fn from(err: TreeError) -> Self {
        ParseError::Tree(err)
    }
}
