use crate::{
    dom::{Dom, NodeId, VOID_ELEMENTS},
    log::{error_eof, Error, UNEXPECTED_MARKUP},
};
use morel::{Finder, Syntax};

/// Beginning of a comment.
const COMMENT_OPEN: usize = 0;
/// Beginning of a closing tag.
const TAG_CLOSE: usize = 1;
/// Beginning of an opening tag.
const TAG_OPEN: usize = 2;

/// Elements whose content is raw character data, ended only by the
/// matching closing tag.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

/// Build the marker set the parser searches for in text state.
fn syntax() -> Syntax {
    Syntax::new(vec![
        (COMMENT_OPEN, "<!--".into()),
        (TAG_CLOSE, "</".into()),
        (TAG_OPEN, "<".into()),
    ])
}

/// Parses joined template source into a detached tree.
///
/// The grammar is a small, forgiving subset of HTML. A `<` that does not
/// begin a tag or comment is ordinary text, void elements never take a
/// closing tag, and raw text elements swallow everything up to their own
/// closing tag.
pub struct Parser<'source> {
    /// Text being parsed.
    source: &'source str,
    /// Locates comment and tag openings within text.
    finder: Finder<&'source str>,
    /// Position of the next unread byte.
    cursor: usize,
    /// Tree under construction.
    dom: Dom,
    /// Open elements, innermost last.
    stack: Vec<NodeId>,
    /// Root fragment of the tree.
    root: NodeId,
}

impl<'source> Parser<'source> {
    /// Create a new [`Parser`] over the given source.
    pub fn new(source: &'source str) -> Self {
        let mut dom = Dom::new();
        let root = dom.create_fragment();

        Self {
            source,
            finder: Finder::new(syntax()),
            cursor: 0,
            dom,
            stack: Vec::new(),
            root,
        }
    }

    /// Parse the source to completion.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the source ends inside a comment, tag or
    /// raw text element, or when a closing tag matches no open element.
    pub fn parse(mut self) -> Result<(Dom, NodeId), Error> {
        while let Some((id, begin, end)) = self.finder.next(self.source, self.cursor) {
            match id {
                COMMENT_OPEN => {
                    self.push_text(self.cursor, begin);
                    self.cursor = self.comment(end)?;
                }
                TAG_CLOSE => {
                    self.push_text(self.cursor, begin);
                    self.cursor = self.closing_tag(begin, end)?;
                }
                TAG_OPEN => {
                    if self.begins_tag(end) {
                        self.push_text(self.cursor, begin);
                        self.cursor = self.opening_tag(begin, end)?;
                    } else {
                        // Not a tag, leave the `<` as text and move on.
                        self.push_text(self.cursor, end);
                        self.cursor = end;
                    }
                }
                _ => unreachable!("finder yields known markers"),
            }
        }
        self.push_text(self.cursor, self.source.len());

        if let Some(open) = self.stack.last() {
            let tag = self
                .dom
                .tag(*open)
                .expect("open stack holds elements")
                .to_string();

            return Err(error_eof(self.source)
                .with_help(format!("element `{tag}` is never closed")));
        }

        Ok((self.dom, self.root))
    }

    /// Return true when the byte at the given position can begin a tag name.
    fn begins_tag(&self, at: usize) -> bool {
        self.source
            .as_bytes()
            .get(at)
            .is_some_and(u8::is_ascii_alphabetic)
    }

    /// Return the element or fragment new nodes attach to.
    fn parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.root)
    }

    /// Append the source text in the given range as a text node, unless
    /// the range is empty.
    fn push_text(&mut self, begin: usize, end: usize) {
        if begin < end {
            let parent = self.parent();
            let text = self.dom.create_text(&self.source[begin..end]);
            self.dom.append(parent, text);
        }
    }

    /// Consume a comment beginning just after `<!--`, returning the
    /// position after the closing `-->`.
    fn comment(&mut self, from: usize) -> Result<usize, Error> {
        let close = self.source[from..]
            .find("-->")
            .map(|at| from + at)
            .ok_or_else(|| error_eof(self.source).with_help("comment is never closed"))?;
        let parent = self.parent();
        let comment = self.dom.create_comment(&self.source[from..close]);
        self.dom.append(parent, comment);

        Ok(close + 3)
    }

    /// Consume a closing tag, popping the matching open element.
    fn closing_tag(&mut self, begin: usize, from: usize) -> Result<usize, Error> {
        let (name, after) = self.read_name(from);
        let after = self.skip_whitespace(after);
        if self.source.as_bytes().get(after) != Some(&b'>') {
            return Err(Error::build(UNEXPECTED_MARKUP)
                .with_pointer(self.source, begin..after)
                .with_help("expected `>` to end this closing tag"));
        }

        match self.stack.pop() {
            Some(open) if self.dom.tag(open) == Some(name.as_str()) => Ok(after + 1),
            _ => Err(Error::build(UNEXPECTED_MARKUP)
                .with_pointer(self.source, begin..after + 1)
                .with_help(format!("closing tag `{name}` matches no open element"))),
        }
    }

    /// Consume an opening tag, with attributes, and attach the element.
    fn opening_tag(&mut self, begin: usize, from: usize) -> Result<usize, Error> {
        let (name, mut at) = self.read_name(from);
        let parent = self.parent();
        let element = self.dom.create_element(&name);
        self.dom.append(parent, element);

        loop {
            at = self.skip_whitespace(at);
            match self.source.as_bytes().get(at) {
                None => return Err(error_eof(self.source).with_help("tag is never closed")),
                Some(b'>') => {
                    at += 1;
                    break;
                }
                Some(b'/') if self.source.as_bytes().get(at + 1) == Some(&b'>') => {
                    return Ok(at + 2);
                }
                Some(_) => at = self.attribute(begin, at, element)?,
            }
        }

        if VOID_ELEMENTS.contains(&name.as_str()) {
            return Ok(at);
        }
        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            return self.raw_text(element, &name, at);
        }
        self.stack.push(element);

        Ok(at)
    }

    /// Consume one attribute, with an optional value, and set it on the
    /// given element.
    fn attribute(&mut self, tag_begin: usize, from: usize, element: NodeId) -> Result<usize, Error> {
        let bytes = self.source.as_bytes();
        let mut at = from;
        while at < bytes.len() && !is_name_end(bytes[at]) {
            at += 1;
        }
        if at == from {
            return Err(Error::build(UNEXPECTED_MARKUP)
                .with_pointer(self.source, tag_begin..at + 1)
                .with_help("expected an attribute name or `>`"));
        }
        let name = self.source[from..at].to_ascii_lowercase();

        let after_name = self.skip_whitespace(at);
        if bytes.get(after_name) != Some(&b'=') {
            self.dom.set_attribute(element, &name, "");
            return Ok(at);
        }

        let value_begin = self.skip_whitespace(after_name + 1);
        match bytes.get(value_begin).copied() {
            Some(quote @ (b'"' | b'\'')) => {
                let close = self.source[value_begin + 1..]
                    .find(quote as char)
                    .map(|found| value_begin + 1 + found)
                    .ok_or_else(|| {
                        error_eof(self.source).with_help("attribute value is never closed")
                    })?;
                self.dom
                    .set_attribute(element, &name, &self.source[value_begin + 1..close]);

                Ok(close + 1)
            }
            _ => {
                let mut end = value_begin;
                while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'>' {
                    end += 1;
                }
                self.dom
                    .set_attribute(element, &name, &self.source[value_begin..end]);

                Ok(end)
            }
        }
    }

    /// Consume raw character data up to the closing tag of the given
    /// element, returning the position after that closing tag.
    fn raw_text(&mut self, element: NodeId, name: &str, from: usize) -> Result<usize, Error> {
        let close_tag = format!("</{name}");
        let lowered = self.source[from..].to_ascii_lowercase();
        let close = lowered
            .find(&close_tag)
            .map(|at| from + at)
            .ok_or_else(|| {
                error_eof(self.source).with_help(format!("element `{name}` is never closed"))
            })?;
        if close > from {
            let text = self.dom.create_text(&self.source[from..close]);
            self.dom.append(element, text);
        }

        let after = self.skip_whitespace(close + close_tag.len());
        if self.source.as_bytes().get(after) != Some(&b'>') {
            return Err(Error::build(UNEXPECTED_MARKUP)
                .with_pointer(self.source, close..after)
                .with_help("expected `>` to end this closing tag"));
        }

        Ok(after + 1)
    }

    /// Read a tag name beginning at the given position, returning the
    /// lowercased name and the position after it.
    fn read_name(&self, from: usize) -> (String, usize) {
        let bytes = self.source.as_bytes();
        let mut at = from;
        while at < bytes.len() && !is_name_end(bytes[at]) {
            at += 1;
        }

        (self.source[from..at].to_ascii_lowercase(), at)
    }

    /// Return the position of the first non-whitespace byte at or after
    /// the given position.
    fn skip_whitespace(&self, from: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut at = from;
        while at < bytes.len() && bytes[at].is_ascii_whitespace() {
            at += 1;
        }

        at
    }
}

/// Return true when the given byte ends a tag or attribute name.
fn is_name_end(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'>' | b'/' | b'=')
}

#[cfg(test)]
mod tests {
    use super::Parser;
    use crate::dom::NodeKind;

    #[test]
    fn test_nested_elements() {
        let (dom, root) = Parser::new("<div><p>hi</p><br></div>")
            .parse()
            .unwrap();

        assert_eq!(dom.markup_of(root), "<div><p>hi</p><br></div>");
    }

    #[test]
    fn test_attributes() {
        let (dom, root) = Parser::new("<input type=\"text\" disabled value=50>")
            .parse()
            .unwrap();

        let input = dom.first_child(root).unwrap();
        assert_eq!(dom.attribute(input, "type"), Some("text"));
        assert_eq!(dom.attribute(input, "disabled"), Some(""));
        assert_eq!(dom.attribute(input, "value"), Some("50"));
    }

    #[test]
    fn test_comment() {
        let (dom, root) = Parser::new("a<!-- note -->b").parse().unwrap();

        let children = dom.children(root);
        assert_eq!(children.len(), 3);
        assert!(matches!(dom.kind(children[1]), NodeKind::Comment(data) if data == " note "));
    }

    #[test]
    fn test_raw_text() {
        let (dom, root) = Parser::new("<style>p &gt; a { color: red }</style>")
            .parse()
            .unwrap();

        let style = dom.first_child(root).unwrap();
        assert_eq!(dom.text_of(style), "p &gt; a { color: red }");
    }

    #[test]
    fn test_literal_angle() {
        let (dom, root) = Parser::new("1 < 2").parse().unwrap();

        assert_eq!(dom.text_of(root), "1 < 2");
    }

    #[test]
    fn test_unclosed_element() {
        let error = Parser::new("<div><span></div>").parse().unwrap_err();

        assert_eq!(error.get_reason(), "unexpected markup");
    }

    #[test]
    fn test_unclosed_comment() {
        let error = Parser::new("<!-- still going").parse().unwrap_err();

        assert_eq!(error.get_reason(), "unexpected eof");
    }
}
