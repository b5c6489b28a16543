//! Selector matching.
//!
//! The traversal engine only depends on the [`Matcher`] trait.
//! [`compile`] provides the built-in implementation, a subset of CSS selectors:
//!
//! | Form | Example |
//! | :--- | :------ |
//! | universal / type | `*`, `div` |
//! | id / class | `#main`, `.item` |
//! | attribute | `[href]`, `[lang\|=en]`, `[class~=a]`, `[src^=http]`, `[src$=".png"]`, `[title*=x]` |
//! | combinators | `a b`, `a > b`, `a + b`, `a ~ b` |
//! | lists | `h1, h2` |

mod parser;

use std::fmt;

use crate::dom::NodeRef;

/// A predicate over element nodes.
pub trait Matcher {
    /// Check if `node` matches.
    fn matches(&self, node: &NodeRef) -> bool;

    /// Return all matching Element descendants of `root` in document order.\
    /// `root` itself is never included.
    fn match_all(&self, root: &NodeRef) -> Vec<NodeRef> {
        let mut res = vec![];
        let mut stack = vec![];
        push_children_reversed(&mut stack, root);
        while let Some(node) = stack.pop() {
            if node.is_element() && self.matches(&node) {
                res.push(node.clone());
            }
            push_children_reversed(&mut stack, &node);
        }
        res
    }

    /// Keep the nodes of `nodes` that match.
    fn filter(&self, nodes: &[NodeRef]) -> Vec<NodeRef> {
        nodes.iter().filter(|n| self.matches(n)).cloned().collect()
    }
}

fn push_children_reversed(stack: &mut Vec<NodeRef>, node: &NodeRef) {
    let mut children = node.last_child();
    while let Some(child) = children {
        children = child.prev_sibling();
        stack.push(child);
    }
}

impl<F: Fn(&NodeRef) -> bool> Matcher for F {
    fn matches(&self, node: &NodeRef) -> bool {
        self(node)
    }
}

/// Why a selector could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorErrorKind {
    /// The selector (or one entry of a list) is empty.
    Empty,
    UnexpectedChar(char),
    UnexpectedEnd,
    /// An identifier was expected after `#`, `.` or `[`.
    ExpectedIdent,
    UnterminatedString,
    /// A combinator is not followed by a compound selector.
    DanglingCombinator,
}

/// A malformed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    /// Byte offset in the source selector.
    pub position: usize,
    pub kind: SelectorErrorKind,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid selector at byte {}: ", self.position)?;
        match &self.kind {
            SelectorErrorKind::Empty => f.write_str("empty selector"),
            SelectorErrorKind::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
            SelectorErrorKind::UnexpectedEnd => f.write_str("unexpected end of selector"),
            SelectorErrorKind::ExpectedIdent => f.write_str("expected an identifier"),
            SelectorErrorKind::UnterminatedString => f.write_str("unterminated string"),
            SelectorErrorKind::DanglingCombinator => {
                f.write_str("combinator is not followed by a selector")
            }
        }
    }
}

impl std::error::Error for SelectorError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    /// `a b`
    Descendant,
    /// `a > b`
    Child,
    /// `a + b`
    Adjacent,
    /// `a ~ b`
    Sibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    /// `=`
    Equals,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
    /// `*=`
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Id(String),
    Class(String),
    Attr {
        key: String,
        op: AttrOp,
        value: String,
    },
}

/// A sequence of simple selectors without combinators, such as `div.item[href]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    /// `None` for `*` or when the type is omitted.
    tag: Option<String>,
    simples: Vec<Simple>,
}

impl Compound {
    fn matches(&self, node: &NodeRef) -> bool {
        if !node.is_element() {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !node.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.simples.iter().all(|simple| match simple {
            Simple::Id(id) => attribute(node, "id").is_some_and(|v| v == *id),
            Simple::Class(class) => {
                attribute(node, "class").is_some_and(|v| v.split_ascii_whitespace().any(|c| c == class))
            }
            Simple::Attr { key, op, value } => {
                attribute(node, key).is_some_and(|v| match_attribute(*op, &v, value))
            }
        })
    }
}

fn attribute(node: &NodeRef, key: &str) -> Option<String> {
    node.attributes()
        .into_iter()
        .find(|attr| attr.key.eq_ignore_ascii_case(key))
        .map(|attr| attr.value)
}

fn match_attribute(op: AttrOp, actual: &str, expected: &str) -> bool {
    match op {
        AttrOp::Exists => true,
        AttrOp::Equals => actual == expected,
        AttrOp::Includes => {
            !expected.is_empty()
                && !expected.contains(char::is_whitespace)
                && actual.split_ascii_whitespace().any(|v| v == expected)
        }
        AttrOp::DashMatch => {
            actual == expected
                || actual
                    .strip_prefix(expected)
                    .is_some_and(|rest| rest.starts_with('-'))
        }
        AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
        AttrOp::Suffix => !expected.is_empty() && actual.ends_with(expected),
        AttrOp::Substring => !expected.is_empty() && actual.contains(expected),
    }
}

/// Compound selectors joined by combinators.\
/// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl Complex {
    fn matches(&self, node: &NodeRef) -> bool {
        self.matches_at(self.compounds.len() - 1, node)
    }

    /// Match `node` against `compounds[idx]` and everything on its left.
    fn matches_at(&self, idx: usize, node: &NodeRef) -> bool {
        if !self.compounds[idx].matches(node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Descendant => {
                let mut parent = node.parent();
                while let Some(par) = parent {
                    if self.matches_at(idx - 1, &par) {
                        return true;
                    }
                    parent = par.parent();
                }
                false
            }
            Combinator::Child => node.parent().is_some_and(|par| self.matches_at(idx - 1, &par)),
            Combinator::Adjacent => {
                prev_element_sibling(node).is_some_and(|prev| self.matches_at(idx - 1, &prev))
            }
            Combinator::Sibling => {
                let mut prev = prev_element_sibling(node);
                while let Some(sibling) = prev {
                    if self.matches_at(idx - 1, &sibling) {
                        return true;
                    }
                    prev = prev_element_sibling(&sibling);
                }
                false
            }
        }
    }
}

fn prev_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut prev = node.prev_sibling();
    while let Some(sibling) = prev {
        if sibling.is_element() {
            return Some(sibling);
        }
        prev = sibling.prev_sibling();
    }
    None
}

/// A compiled selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSelector {
    source: String,
    alternatives: Vec<Complex>,
}

impl CompiledSelector {
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Matcher for CompiledSelector {
    fn matches(&self, node: &NodeRef) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(node))
    }
}

impl fmt::Display for CompiledSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile `selector`.
pub fn compile(selector: &str) -> Result<CompiledSelector, SelectorError> {
    let alternatives = parser::SelectorParser::new(selector).parse_list()?;
    Ok(CompiledSelector {
        source: selector.to_owned(),
        alternatives,
    })
}
