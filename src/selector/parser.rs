use super::{
    AttrOp, Combinator, Complex, Compound, SelectorError,
    SelectorErrorKind::{self, *},
    Simple,
};

pub(super) struct SelectorParser<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

impl<'a> SelectorParser<'a> {
    pub(super) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Return `true` if at least one whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos != start
    }

    fn error<T>(&self, kind: SelectorErrorKind) -> Result<T, SelectorError> {
        Err(SelectorError {
            position: self.pos,
            kind,
        })
    }

    fn unexpected<T>(&self) -> Result<T, SelectorError> {
        match self.peek() {
            Some(c) => self.error(UnexpectedChar(c)),
            None => self.error(UnexpectedEnd),
        }
    }

    pub(super) fn parse_list(&mut self) -> Result<Vec<Complex>, SelectorError> {
        let mut list = vec![];
        loop {
            self.skip_whitespace();
            list.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(list),
                Some(',') => {
                    self.bump();
                }
                Some(_) => return self.unexpected(),
            }
        }
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = vec![];
        loop {
            let had_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::Adjacent,
                Some('~') => Combinator::Sibling,
                Some(_) if had_whitespace => Combinator::Descendant,
                Some(_) => return self.unexpected(),
            };
            if combinator != Combinator::Descendant {
                self.bump();
                self.skip_whitespace();
                if matches!(self.peek(), None | Some(',')) {
                    return self.error(DanglingCombinator);
                }
            }
            compounds.push(self.parse_compound()?);
            combinators.push(combinator);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let start = self.pos;
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => {
                self.bump();
            }
            Some(c) if is_ident_char(c) => compound.tag = Some(self.parse_ident()?),
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.simples.push(Simple::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.bump();
                    compound.simples.push(Simple::Class(self.parse_ident()?));
                }
                Some('[') => {
                    self.bump();
                    compound.simples.push(self.parse_attribute()?);
                }
                _ => break,
            }
        }
        if self.pos == start {
            return match self.peek() {
                None | Some(',') => self.error(Empty),
                Some(_) => self.unexpected(),
            };
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        if self.pos == start {
            return self.error(ExpectedIdent);
        }
        Ok(self.src[start..self.pos].to_owned())
    }

    /// Parse the rest of an attribute selector. `[` has been consumed.
    fn parse_attribute(&mut self) -> Result<Simple, SelectorError> {
        self.skip_whitespace();
        let key = self.parse_ident()?;
        self.skip_whitespace();
        let op = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(Simple::Attr {
                    key,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => {
                self.bump();
                AttrOp::Equals
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.bump();
                if self.peek() != Some('=') {
                    return self.unexpected();
                }
                self.bump();
                match c {
                    '~' => AttrOp::Includes,
                    '|' => AttrOp::DashMatch,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Substring,
                }
            }
            _ => return self.unexpected(),
        };
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.parse_string(quote)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();
        if self.peek() != Some(']') {
            return self.unexpected();
        }
        self.bump();
        Ok(Simple::Attr { key, op, value })
    }

    /// Parse the rest of a quoted string. The opening quote has been consumed.
    fn parse_string(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut res = String::new();
        loop {
            match self.bump() {
                None => return self.error(UnterminatedString),
                Some('\\') => match self.bump() {
                    Some(c) => res.push(c),
                    None => return self.error(UnterminatedString),
                },
                Some(c) if c == quote => return Ok(res),
                Some(c) => res.push(c),
            }
        }
    }
}
