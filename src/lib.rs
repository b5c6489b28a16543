//! HTML node trees with jQuery-style traversal.
//!
//! - [`dom`]: the node model and its structural operations.
//! - [`html`]: decoding, parsing and serialization.
//! - [`selector`]: a compiled subset of CSS selectors.
//! - [`query`]: [`Document`] and [`Selection`], the traversal API.
//!
//! ```
//! use markquery::Document;
//!
//! let doc = Document::parse("<ul><li>a</li><li class=x>b</li></ul>").unwrap();
//! let item = doc.find("li.x").unwrap();
//! assert_eq!(item.text(), "b");
//! assert_eq!(item.prev().text(), "a");
//! ```

pub mod dom;
pub mod html;
pub mod query;
pub mod selector;

use const_format::concatcp;

pub use dom::{NodeRef, NodeType};
pub use query::{Document, Selection};
pub use selector::{Matcher, compile};

/// `<package name>/<package version>`
pub const VERSION: &str = concatcp!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
