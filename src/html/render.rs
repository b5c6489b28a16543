use std::{fmt, io, rc::Rc};

use crate::dom::{NodeRef, NodeType};

use super::{is_raw_text_element, is_void_element};

/// Nesting level at which [`render`] gives up.
pub const MAX_RENDER_DEPTH: usize = 10_000;

/// The output sink of the serializer.
pub trait MarkupWriter {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_bytes(&[byte])
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.write_bytes(s.as_bytes())
    }
}

impl<W: io::Write + ?Sized> MarkupWriter for W {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }
}

#[derive(Debug)]
pub enum RenderError {
    /// The sink failed. What has been written so far is not rolled back.
    Io(io::Error),
    /// A void element such as `<img>` has children.
    VoidElementWithChildren(String),
    /// An Error or ScopeMarker node was found in the tree.
    UnexpectedNode(NodeType),
    /// The tree is nested deeper than [`MAX_RENDER_DEPTH`].
    TooDeep,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Io(err) => write!(f, "failed to write markup: {err}"),
            RenderError::VoidElementWithChildren(tag) => {
                write!(f, "void element <{tag}> has child nodes")
            }
            RenderError::UnexpectedNode(ty) => write!(f, "cannot render a {ty} node"),
            RenderError::TooDeep => {
                write!(f, "tree is nested deeper than {MAX_RENDER_DEPTH} levels")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        RenderError::Io(err)
    }
}

/// One step of the serializer walk.
enum Frame {
    /// Write a node and schedule its children.\
    /// `raw` is set for the children of raw-text elements, whose Text is written unescaped.
    Node {
        node: NodeRef,
        depth: usize,
        raw: bool,
    },
    /// Write the end tag of an element whose children have been written.
    Close(Rc<str>),
    /// A `<plaintext>` element has been written.\
    /// Nothing else may follow, not even closing tags.
    Halt,
}

fn push_children(stack: &mut Vec<Frame>, node: &NodeRef, depth: usize, raw: bool) {
    let mut children = node.last_child();
    while let Some(child) = children {
        children = child.prev_sibling();
        stack.push(Frame::Node {
            node: child,
            depth,
            raw,
        });
    }
}

/// Write the markup of `node` and its subtree to `w`.
pub fn render<W: MarkupWriter + ?Sized>(w: &mut W, node: &NodeRef) -> Result<(), RenderError> {
    let root = Frame::Node {
        node: node.clone(),
        depth: 0,
        raw: false,
    };
    walk(w, vec![root])
}

/// Write the markup of the children of `node`, without `node` itself.
pub fn render_children<W: MarkupWriter + ?Sized>(
    w: &mut W,
    node: &NodeRef,
) -> Result<(), RenderError> {
    let mut stack = vec![];
    push_children(&mut stack, node, 1, false);
    walk(w, stack)
}

pub fn render_to_string(node: &NodeRef) -> Result<String, RenderError> {
    let mut buf = vec![];
    render(&mut buf, node)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Run the frames on `stack` until it is empty.
///
/// The walk keeps its own stack, so the nesting level is only bounded by [`MAX_RENDER_DEPTH`].
fn walk<W: MarkupWriter + ?Sized>(w: &mut W, mut stack: Vec<Frame>) -> Result<(), RenderError> {
    while let Some(frame) = stack.pop() {
        let (node, depth, raw) = match frame {
            Frame::Node { node, depth, raw } => (node, depth, raw),
            Frame::Close(tag) => {
                w.write_str("</")?;
                w.write_str(&tag)?;
                w.write_byte(b'>')?;
                continue;
            }
            Frame::Halt => return Ok(()),
        };
        if depth > MAX_RENDER_DEPTH {
            return Err(RenderError::TooDeep);
        }
        match node.node_type() {
            NodeType::Text if raw => w.write_str(&node.data())?,
            NodeType::Text => escape(w, &node.data())?,
            NodeType::Document => push_children(&mut stack, &node, depth + 1, false),
            NodeType::Element => open_element(w, &mut stack, &node, depth)?,
            NodeType::Comment => {
                w.write_str("<!--")?;
                w.write_str(&node.data())?;
                w.write_str("-->")?;
            }
            NodeType::Doctype => render_doctype(w, &node)?,
            ty @ (NodeType::Error | NodeType::ScopeMarker) => {
                return Err(RenderError::UnexpectedNode(ty));
            }
        }
    }
    Ok(())
}

fn render_doctype<W: MarkupWriter + ?Sized>(w: &mut W, node: &NodeRef) -> io::Result<()> {
    w.write_str("<!DOCTYPE ")?;
    w.write_str(&node.data())?;
    let public = node.get_attribute("public").filter(|p| !p.is_empty());
    let system = node.get_attribute("system").filter(|s| !s.is_empty());
    if let Some(public) = public {
        w.write_str(" PUBLIC ")?;
        write_quoted(w, &public)?;
        if let Some(system) = system {
            w.write_byte(b' ')?;
            write_quoted(w, &system)?;
        }
    } else if let Some(system) = system {
        w.write_str(" SYSTEM ")?;
        write_quoted(w, &system)?;
    }
    w.write_byte(b'>')
}

/// Write the start tag of `node` and schedule its children and its end tag.
fn open_element<W: MarkupWriter + ?Sized>(
    w: &mut W,
    stack: &mut Vec<Frame>,
    node: &NodeRef,
    depth: usize,
) -> Result<(), RenderError> {
    let tag = node.tag();
    w.write_byte(b'<')?;
    w.write_str(&tag)?;
    for attr in node.attributes() {
        w.write_byte(b' ')?;
        if let Some(ns) = attr.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            w.write_str(ns)?;
            w.write_byte(b':')?;
        }
        w.write_str(&attr.key)?;
        w.write_str("=\"")?;
        escape(w, &attr.value)?;
        w.write_byte(b'"')?;
    }
    if is_void_element(&tag) {
        if node.has_child_nodes() {
            return Err(RenderError::VoidElementWithChildren(tag.to_string()));
        }
        w.write_str("/>")?;
        return Ok(());
    }
    w.write_byte(b'>')?;

    // A newline right after these start tags is dropped by parsers, so write an extra one.
    if matches!(&*tag, "pre" | "listing" | "textarea") {
        if let Some(first) = node.first_child() {
            if first.node_type() == NodeType::Text && first.data().starts_with('\n') {
                w.write_byte(b'\n')?;
            }
        }
    }

    let raw = is_raw_text_element(&tag);
    if &*tag == "plaintext" {
        stack.push(Frame::Halt);
    } else {
        stack.push(Frame::Close(tag));
    }
    push_children(stack, node, depth + 1, raw);
    Ok(())
}

/// Write `s` quoted with `"`, or with `'` if `s` contains `"`.
fn write_quoted<W: MarkupWriter + ?Sized>(w: &mut W, s: &str) -> io::Result<()> {
    let quote = if s.contains('"') { b'\'' } else { b'"' };
    w.write_byte(quote)?;
    w.write_str(s)?;
    w.write_byte(quote)
}

fn escape<W: MarkupWriter + ?Sized>(w: &mut W, s: &str) -> io::Result<()> {
    let mut last = 0;
    for (i, b) in s.bytes().enumerate() {
        let esc = match b {
            b'&' => "&amp;",
            b'\'' => "&#39;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&#34;",
            b'\r' => "&#13;",
            _ => continue,
        };
        w.write_str(&s[last..i])?;
        w.write_str(esc)?;
        last = i + 1;
    }
    w.write_str(&s[last..])
}

/// Escape `s` as the serializer does for text and attribute values.
pub fn escape_string(s: &str) -> String {
    let mut buf = vec![];
    // writing into a Vec cannot fail
    escape(&mut buf, s).ok();
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Attribute, NodeData};

    fn elem(tag: &str) -> NodeRef {
        NodeRef::new_element(tag)
    }

    #[test]
    fn test_escape_text() {
        let t = NodeRef::new_text("He said \"hi\" & left");
        assert_eq!(
            render_to_string(&t).unwrap(),
            "He said &#34;hi&#34; &amp; left"
        );
        assert_eq!(escape_string("<a href='x'>\r"), "&lt;a href=&#39;x&#39;&gt;&#13;");
        assert_eq!(escape_string("plain ü"), "plain ü");
    }

    #[test]
    fn test_void_element() {
        let img = NodeRef::new_element_with_attributes("img", vec![Attribute::new("src", "a.png")]);
        assert_eq!(render_to_string(&img).unwrap(), r#"<img src="a.png"/>"#);
        img.append_child(NodeRef::new_text("x")).unwrap();
        assert!(matches!(
            render_to_string(&img),
            Err(RenderError::VoidElementWithChildren(tag)) if tag == "img"
        ));
    }

    #[test]
    fn test_attributes_with_namespace() {
        let svg = NodeRef::new_element_with_attributes(
            "svg",
            vec![
                Attribute::with_namespace("xlink", "href", "#a&b"),
                Attribute::with_namespace("", "id", "\"q\""),
            ],
        );
        assert_eq!(
            render_to_string(&svg).unwrap(),
            r##"<svg xlink:href="#a&amp;b" id="&#34;q&#34;"></svg>"##
        );
    }

    #[test]
    fn test_raw_text_and_newline() {
        let script = elem("script");
        script.append_child(NodeRef::new_text("if (a < b && c) {}")).unwrap();
        assert_eq!(
            render_to_string(&script).unwrap(),
            "<script>if (a < b && c) {}</script>"
        );

        let pre = elem("pre");
        pre.append_child(NodeRef::new_text("\nline")).unwrap();
        assert_eq!(render_to_string(&pre).unwrap(), "<pre>\n\nline</pre>");
        let div = elem("div");
        div.append_child(NodeRef::new_text("\nline")).unwrap();
        assert_eq!(render_to_string(&div).unwrap(), "<div>\nline</div>");
    }

    #[test]
    fn test_plaintext_stops_everything() {
        let body = elem("body");
        let div = body.append_child(elem("div")).unwrap();
        let plain = div.append_child(elem("plaintext")).unwrap();
        plain.append_child(NodeRef::new_text("<b>raw</b>")).unwrap();
        body.append_child(elem("p")).unwrap();
        assert_eq!(
            render_to_string(&body).unwrap(),
            "<body><div><plaintext><b>raw</b>"
        );
    }

    #[test]
    fn test_comment_and_doctype() {
        let doc = NodeRef::new_document();
        doc.append_child(NodeRef::from_data(NodeData::doctype(
            "html",
            vec![
                Attribute::new("public", "-//W3C//DTD HTML 4.01//EN"),
                Attribute::new("system", "http://www.w3.org/TR/html4/strict.dtd"),
            ],
        )))
        .unwrap();
        doc.append_child(NodeRef::new_comment(" a < b ")).unwrap();
        assert_eq!(
            render_to_string(&doc).unwrap(),
            concat!(
                r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">"#,
                "<!-- a < b -->"
            )
        );

        let system = NodeRef::from_data(NodeData::doctype(
            "x",
            vec![Attribute::new("public", ""), Attribute::new("system", "a\"b")],
        ));
        assert_eq!(
            render_to_string(&system).unwrap(),
            r#"<!DOCTYPE x SYSTEM 'a"b'>"#
        );
        assert_eq!(
            render_to_string(&NodeRef::new_doctype("html")).unwrap(),
            "<!DOCTYPE html>"
        );
    }

    #[test]
    fn test_unexpected_node() {
        let div = elem("div");
        let data = NodeData {
            node_type: NodeType::ScopeMarker,
            ..NodeData::document()
        };
        div.append_child(NodeRef::from_data(data)).unwrap();
        assert!(matches!(
            render_to_string(&div),
            Err(RenderError::UnexpectedNode(NodeType::ScopeMarker))
        ));
    }

    #[test]
    fn test_render_children_and_io_sink() {
        let ul = elem("ul");
        for text in ["a", "b"] {
            let li = ul.append_child(elem("li")).unwrap();
            li.append_child(NodeRef::new_text(text)).unwrap();
        }
        let mut out = vec![];
        render_children(&mut out, &ul).unwrap();
        assert_eq!(out, b"<li>a</li><li>b</li>");
    }

    #[test]
    fn test_too_deep() {
        let root = elem("div");
        let mut cur = root.clone();
        for _ in 0..MAX_RENDER_DEPTH {
            cur = cur.append_child(elem("i")).unwrap();
        }
        // exactly at the limit
        let out = render_to_string(&root).unwrap();
        assert!(out.starts_with("<div><i><i>"));
        assert!(out.ends_with("</i></i></div>"));

        cur.append_child(elem("b")).unwrap();
        assert!(matches!(render_to_string(&root), Err(RenderError::TooDeep)));
    }

    #[test]
    fn test_raw_text_only_applies_to_direct_children() {
        let noscript = elem("noscript");
        noscript.append_child(NodeRef::new_text("<a&b>")).unwrap();
        let p = noscript.append_child(elem("p")).unwrap();
        p.append_child(NodeRef::new_text("<c>")).unwrap();
        noscript.append_child(NodeRef::new_comment("x")).unwrap();
        assert_eq!(
            render_to_string(&noscript).unwrap(),
            "<noscript><a&b><p>&lt;c&gt;</p><!--x--></noscript>"
        );
    }
}
