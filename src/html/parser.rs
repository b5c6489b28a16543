use std::borrow::Cow;

use crate::dom::{Attribute, NodeData, NodeRef, NodeType, TagRegistry, init_tree};

use super::{ESCAPABLE_RAW_TEXT_ELEMENTS, ParseError, is_raw_text_element, is_void_element};

/// Default value of [`ParseOptions::max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Options of [`parse_with`].
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Allocation hook applied to every new node.\
    /// If it is not empty, [`init_tree`] runs on the finished tree.
    pub registry: TagRegistry,
    /// The maximum number of nested open elements.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            registry: TagRegistry::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Build a tree from `source` with the default options.
///
/// The returned node is a Document.
pub fn parse(source: &str) -> Result<NodeRef, ParseError> {
    parse_with(source, &ParseOptions::default())
}

pub fn parse_with(source: &str, options: &ParseOptions) -> Result<NodeRef, ParseError> {
    let document = options.registry.lookup(NodeData::document());
    let builder = TreeBuilder {
        src: source,
        pos: 0,
        options,
        document: document.clone(),
        open: vec![],
    };
    builder.run()?;
    if !options.registry.is_empty() {
        init_tree(&document)?;
    }
    Ok(document)
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn is_alpha_at(s: &str, index: usize) -> bool {
    s.as_bytes().get(index).is_some_and(u8::is_ascii_alphabetic)
}

struct TreeBuilder<'a> {
    src: &'a str,
    pos: usize,
    options: &'a ParseOptions,
    document: NodeRef,
    /// Open elements, innermost last. The document is not included.
    open: Vec<NodeRef>,
}

impl<'a> TreeBuilder<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn current(&self) -> &NodeRef {
        self.open.last().unwrap_or(&self.document)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        let rest = self.rest();
        self.pos += rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        &self.src[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(|c| c.is_ascii_whitespace());
    }

    /// Move behind the next `>`, or to the end of input.
    fn skip_past_gt(&mut self) {
        match self.rest().find('>') {
            Some(i) => self.pos += i + 1,
            None => self.pos = self.src.len(),
        }
    }

    fn insert(&self, data: NodeData) -> Result<NodeRef, ParseError> {
        let node = self.options.registry.lookup(data);
        Ok(self.current().append_child(node)?)
    }

    /// Insert a Text node, merging it into a preceding Text sibling.
    fn insert_text(&self, text: &str) -> Result<(), ParseError> {
        if text.is_empty() {
            return Ok(());
        }
        let parent = self.current();
        if let Some(last) = parent
            .last_child()
            .filter(|last| last.node_type() == NodeType::Text)
        {
            let mut data = last.data();
            data.push_str(text);
            last.set_data(data);
            return Ok(());
        }
        self.insert(NodeData::text(text))?;
        Ok(())
    }

    fn run(mut self) -> Result<(), ParseError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if starts_with_ignore_case(rest, "<!doctype") {
                self.doctype()?;
            } else if rest.starts_with("</") {
                if is_alpha_at(rest, 2) {
                    self.end_tag();
                } else {
                    self.bogus_comment(2)?;
                }
            } else if rest.starts_with("<!") {
                self.bogus_comment(2)?;
            } else if rest.starts_with("<?") {
                self.bogus_comment(1)?;
            } else if rest.starts_with('<') && is_alpha_at(rest, 1) {
                self.start_tag()?;
            } else {
                self.text()?;
            }
        }
        if !self.open.is_empty() {
            log::debug!(
                "closing {} element(s) left open at end of input",
                self.open.len()
            );
        }
        Ok(())
    }

    fn text(&mut self) -> Result<(), ParseError> {
        let rest = self.rest();
        // The first character may be a `<` that does not start any markup.
        let first = rest.chars().next().map_or(0, char::len_utf8);
        let len = rest[first..].find('<').map_or(rest.len(), |i| first + i);
        self.pos += len;
        self.insert_text(&decode_entities(&rest[..len]))
    }

    fn comment(&mut self) -> Result<(), ParseError> {
        self.pos += 4;
        let rest = self.rest();
        // `<!-->` and `<!--->` are empty comments
        let data = if let Some(after) = ["->", ">"]
            .iter()
            .find_map(|gt| rest.strip_prefix(*gt))
        {
            self.pos = self.src.len() - after.len();
            ""
        } else if let Some(end) = rest.find("-->") {
            self.pos += end + 3;
            &rest[..end]
        } else {
            self.pos = self.src.len();
            rest
        };
        self.insert(NodeData::comment(data))?;
        Ok(())
    }

    /// `<!x>`, `<?x>` and `</ x>` become a Comment containing everything after `skip` bytes.
    fn bogus_comment(&mut self, skip: usize) -> Result<(), ParseError> {
        self.pos += skip;
        let rest = self.rest();
        let data = match rest.find('>') {
            Some(end) => {
                self.pos += end + 1;
                &rest[..end]
            }
            None => {
                self.pos = self.src.len();
                rest
            }
        };
        log::debug!("treating {:?} as a comment", data);
        self.insert(NodeData::comment(data))?;
        Ok(())
    }

    fn doctype(&mut self) -> Result<(), ParseError> {
        self.pos += "<!doctype".len();
        let rest = self.rest();
        let inner = match rest.find('>') {
            Some(end) => &rest[..end],
            None => rest,
        };
        self.skip_past_gt();

        let inner = inner.trim_start();
        let name_end = inner
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(inner.len());
        let name = inner[..name_end].to_ascii_lowercase();
        let ids = inner[name_end..].trim_start();

        let mut attributes = vec![];
        if starts_with_ignore_case(ids, "public") {
            let (public, rest) = quoted(ids["public".len()..].trim_start());
            let (system, _) = quoted(rest.trim_start());
            if let Some(public) = public {
                attributes.push(Attribute::new("public", public));
            }
            if let Some(system) = system {
                attributes.push(Attribute::new("system", system));
            }
        } else if starts_with_ignore_case(ids, "system") {
            if let (Some(system), _) = quoted(ids["system".len()..].trim_start()) {
                attributes.push(Attribute::new("system", system));
            }
        }
        self.insert(NodeData::doctype(name, attributes))?;
        Ok(())
    }

    fn end_tag(&mut self) {
        self.pos += 2;
        let name = self
            .take_while(|c| !(c.is_ascii_whitespace() || c == '/' || c == '>'))
            .to_ascii_lowercase();
        self.skip_past_gt();
        match self.open.iter().rposition(|node| *node.tag() == *name) {
            Some(index) => self.open.truncate(index),
            None => log::debug!("dropping unmatched end tag </{name}>"),
        }
    }

    fn start_tag(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        let name = self
            .take_while(|c| !(c.is_ascii_whitespace() || c == '/' || c == '>'))
            .to_ascii_lowercase();

        let mut attributes: Vec<Attribute> = vec![];
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                break;
            } else if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            } else if rest.starts_with('>') {
                self.pos += 1;
                break;
            } else if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }

            // The first character belongs to the name even if it is `=`.
            let start = self.pos;
            self.pos += rest.chars().next().map_or(1, char::len_utf8);
            self.take_while(|c| !(c.is_ascii_whitespace() || c == '/' || c == '>' || c == '='));
            let key = self.src[start..self.pos].to_ascii_lowercase();
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attribute_value()
            } else {
                String::new()
            };
            if attributes.iter().any(|attr| attr.key == key) {
                log::debug!("dropping duplicate attribute {key:?} of <{name}>");
            } else {
                attributes.push(Attribute::new(key, value));
            }
        }

        let node = self.insert(NodeData::element(name.as_str(), attributes))?;
        if is_void_element(&name) || self_closing {
            return Ok(());
        }
        if matches!(name.as_str(), "pre" | "listing" | "textarea") {
            self.skip_leading_newline();
        }

        if name == "plaintext" {
            let rest = self.rest();
            self.pos = self.src.len();
            if !rest.is_empty() {
                node.append_child(self.options.registry.lookup(NodeData::text(rest)))?;
            }
            return Ok(());
        }
        let escapable = ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&name.as_str());
        if escapable || is_raw_text_element(&name) {
            let rest = self.rest();
            let end = find_end_tag(rest, &name);
            let text = if escapable {
                decode_entities(&rest[..end])
            } else {
                Cow::Borrowed(&rest[..end])
            };
            if !text.is_empty() {
                node.append_child(self.options.registry.lookup(NodeData::text(text)))?;
            }
            self.pos += end;
            self.skip_past_gt();
            return Ok(());
        }

        if self.open.len() >= self.options.max_depth {
            return Err(ParseError::TooDeep(self.options.max_depth));
        }
        self.open.push(node);
        Ok(())
    }

    fn skip_leading_newline(&mut self) {
        let rest = self.rest();
        if rest.starts_with("\r\n") {
            self.pos += 2;
        } else if rest.starts_with('\n') {
            self.pos += 1;
        }
    }

    fn attribute_value(&mut self) -> String {
        let rest = self.rest();
        let raw = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => match rest[1..].find(quote) {
                Some(end) => {
                    self.pos += end + 2;
                    &rest[1..end + 1]
                }
                None => {
                    self.pos = self.src.len();
                    &rest[1..]
                }
            },
            _ => self.take_while(|c| !(c.is_ascii_whitespace() || c == '>')),
        };
        decode_entities(raw).into_owned()
    }
}

/// Split a leading quoted string off `s`.
fn quoted(s: &str) -> (Option<&str>, &str) {
    match s.chars().next() {
        Some(quote @ ('"' | '\'')) => match s[1..].find(quote) {
            Some(end) => (Some(&s[1..end + 1]), &s[end + 2..]),
            None => (Some(&s[1..]), ""),
        },
        _ => (None, s),
    }
}

/// Return the offset of the end tag `</name` in `s`, or the length of `s` if there is none.
fn find_end_tag(s: &str, name: &str) -> usize {
    for (i, _) in s.match_indices("</") {
        let after = &s[i + 2..];
        if starts_with_ignore_case(after, name)
            && after.as_bytes().get(name.len()).is_none_or(|&b| {
                b.is_ascii_whitespace() || b == b'/' || b == b'>'
            })
        {
            return i;
        }
    }
    s.len()
}

const NAMED_REFERENCES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
];

/// Decode character references.\
/// Unknown references are left as is.
pub(crate) fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    let mut res = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        res.push_str(&rest[..i]);
        rest = &rest[i..];
        match char_reference(rest) {
            Some((c, len)) => {
                res.push(c);
                rest = &rest[len..];
            }
            None => {
                res.push('&');
                rest = &rest[1..];
            }
        }
    }
    res.push_str(rest);
    Cow::Owned(res)
}

/// Decode the reference at the head of `s`, which starts with `&`.\
/// Return the character and the number of bytes consumed.
fn char_reference(s: &str) -> Option<(char, usize)> {
    let body = &s[1..];
    if let Some(num) = body.strip_prefix('#') {
        let (digits, radix, prefix) = match num.strip_prefix(|c: char| c == 'x' || c == 'X') {
            Some(hex) => (hex, 16, 2),
            None => (num, 10, 1),
        };
        let len = digits
            .bytes()
            .take_while(|b| (*b as char).is_digit(radix))
            .count();
        if len == 0 {
            return None;
        }
        let c = u32::from_str_radix(&digits[..len], radix)
            .ok()
            .and_then(char::from_u32)
            .filter(|&c| c != '\0')
            .unwrap_or('\u{fffd}');
        let semicolon = usize::from(digits[len..].starts_with(';'));
        return Some((c, 1 + prefix + len + semicolon));
    }
    NAMED_REFERENCES.iter().find_map(|&(name, c)| {
        body.strip_prefix(name)
            .filter(|rest| rest.starts_with(';'))
            .map(|_| (c, name.len() + 2))
    })
}
