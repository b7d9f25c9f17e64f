//! Namespace-aware XML cursor and writer used by the EWS codec.
//!
//! [`XmlReader`] wraps a `quick_xml` namespace reader and tracks element depth so
//! that a failed decode can always be recovered by skipping to the end of the
//! enclosing element. [`XmlWriter`] emits prefixed elements (`soap:`, `m:`, `t:`).

use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};

/// SOAP 1.1 envelope namespace.
pub const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// EWS messages namespace (operation and response elements).
pub const MESSAGES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";
/// EWS types namespace (folders, items, identifiers).
pub const TYPES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/types";

/// The namespaces the EWS parser distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ns {
    /// `soap:` envelope namespace.
    Soap,
    /// `m:` messages namespace.
    Messages,
    /// `t:` types namespace.
    Types,
    /// Any other bound namespace.
    Other(String),
    /// No namespace in scope.
    Unbound,
}

impl Ns {
    fn from_uri(uri: &[u8]) -> Self {
        match uri {
            u if u == SOAP_NS.as_bytes() => Ns::Soap,
            u if u == MESSAGES_NS.as_bytes() => Ns::Messages,
            u if u == TYPES_NS.as_bytes() => Ns::Types,
            u => Ns::Other(String::from_utf8_lossy(u).into_owned()),
        }
    }

    /// The prefix this crate writes for the namespace.
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self {
            Ns::Soap => "soap",
            Ns::Messages => "m",
            Ns::Types => "t",
            Ns::Other(_) | Ns::Unbound => "",
        }
    }
}

impl std::fmt::Display for Ns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ns::Soap => f.write_str(SOAP_NS),
            Ns::Messages => f.write_str(MESSAGES_NS),
            Ns::Types => f.write_str(TYPES_NS),
            Ns::Other(uri) => f.write_str(uri),
            Ns::Unbound => f.write_str("(no namespace)"),
        }
    }
}

/// A start element together with its resolved namespace and depth.
#[derive(Debug, Clone)]
pub struct XmlElement<'a> {
    ns: Ns,
    local: String,
    start: BytesStart<'a>,
    depth: usize,
}

impl<'a> XmlElement<'a> {
    /// Namespace the element resolved to.
    #[must_use]
    pub fn ns(&self) -> &Ns {
        &self.ns
    }

    /// Local (unprefixed) element name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    /// Depth of the element's content (root content is depth 1).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns `true` if the element has the given namespace and local name.
    #[must_use]
    pub fn is(&self, ns: &Ns, local: &str) -> bool {
        &self.ns == ns && self.local == local
    }

    /// Reads an unprefixed attribute, unescaped.
    pub fn attribute(&self, name: &str) -> Result<Option<String>> {
        match self.start.try_get_attribute(name)? {
            Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
            None => Ok(None),
        }
    }

    /// Fails with [`Error::UnexpectedElement`] unless the element matches.
    pub fn expect(&self, ns: &Ns, local: &str) -> Result<()> {
        if self.is(ns, local) {
            Ok(())
        } else {
            Err(self.unexpected(format!("{}:{local}", ns.prefix())))
        }
    }

    pub(crate) fn unexpected(&self, expected: impl Into<String>) -> Error {
        Error::UnexpectedElement {
            expected: expected.into(),
            found: self.qualified(),
        }
    }

    /// Local name decorated with the namespace, for diagnostics.
    #[must_use]
    pub fn qualified(&self) -> String {
        match &self.ns {
            Ns::Other(uri) => format!("{{{uri}}}{}", self.local),
            ns if ns.prefix().is_empty() => self.local.clone(),
            ns => format!("{}:{}", ns.prefix(), self.local),
        }
    }
}

/// Pull-style cursor over an XML document.
pub struct XmlReader<'a> {
    inner: NsReader<&'a [u8]>,
    depth: usize,
}

impl<'a> XmlReader<'a> {
    /// Creates a cursor over a complete document.
    #[must_use]
    pub fn new(document: &'a str) -> Self {
        let mut inner = NsReader::from_str(document);
        inner.config_mut().expand_empty_elements = true;
        Self { inner, depth: 0 }
    }

    /// Current element depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn next_event(&mut self) -> Result<(Ns, Event<'a>)> {
        let (resolved, event) = self.inner.read_resolved_event()?;
        let ns = match resolved {
            ResolveResult::Bound(ns) => Ns::from_uri(ns.as_ref()),
            ResolveResult::Unbound => Ns::Unbound,
            ResolveResult::Unknown(prefix) => {
                return Err(Error::malformed(format!(
                    "undeclared namespace prefix '{}'",
                    String::from_utf8_lossy(&prefix)
                )))
            }
        };
        match &event {
            Event::Start(_) => self.depth += 1,
            Event::End(_) => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        Ok((ns, event))
    }

    /// Reads the next child start element of the current element.
    ///
    /// Returns `None` once the current element's end tag has been consumed.
    pub fn next_child(&mut self) -> Result<Option<XmlElement<'a>>> {
        loop {
            let (ns, event) = self.next_event()?;
            match event {
                Event::Start(start) => {
                    let local = std::str::from_utf8(start.local_name().as_ref())
                        .map_err(|_| Error::malformed("element name is not UTF-8"))?
                        .to_string();
                    return Ok(Some(XmlElement {
                        ns,
                        local,
                        start,
                        depth: self.depth,
                    }));
                }
                Event::End(_) => return Ok(None),
                Event::Text(text) => {
                    if !text.unescape()?.trim().is_empty() {
                        return Err(Error::malformed("unexpected text between elements"));
                    }
                }
                Event::CData(_) => return Err(Error::malformed("unexpected CDATA between elements")),
                Event::Eof => return Err(Error::malformed("unexpected end of document")),
                _ => {}
            }
        }
    }

    /// Reads the root element of the document.
    pub fn root(&mut self) -> Result<XmlElement<'a>> {
        self.next_child()?
            .ok_or_else(|| Error::malformed("document has no root element"))
    }

    /// Reads the text content of `element`, consuming its end tag.
    pub fn read_text(&mut self, element: &XmlElement<'_>) -> Result<String> {
        let mut text = String::new();
        loop {
            let (_, event) = self.next_event()?;
            match event {
                Event::Text(t) => text.push_str(&t.unescape()?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::End(_) if self.depth < element.depth => return Ok(text),
                Event::Start(_) => {
                    return Err(Error::UnexpectedElement {
                        expected: format!("text content of {}", element.qualified()),
                        found: "child element".into(),
                    })
                }
                Event::Eof => return Err(Error::malformed("unexpected end of document")),
                _ => {}
            }
        }
    }

    /// Skips the remainder of `element`, including its end tag.
    ///
    /// Safe to call when the element has already been closed.
    pub fn skip(&mut self, element: &XmlElement<'_>) -> Result<()> {
        self.skip_to(element.depth)
    }

    /// Skips events until the cursor is above `depth`.
    pub fn skip_to(&mut self, depth: usize) -> Result<()> {
        while self.depth >= depth {
            let (_, event) = self.next_event()?;
            if matches!(event, Event::Eof) {
                return Err(Error::malformed("unexpected end of document"));
            }
        }
        Ok(())
    }
}

/// Writer for prefixed EWS XML.
pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }

    /// Writes the `<?xml version="1.0" encoding="utf-8"?>` declaration.
    pub fn declaration(&mut self) -> Result<()> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(())
    }

    /// Writes a start tag.
    pub fn start<N, V>(&mut self, name: &str, attributes: &[(N, V)]) -> Result<()>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let start = BytesStart::new(name).with_attributes(
            attributes
                .iter()
                .map(|(k, v)| (k.as_ref(), v.as_ref())),
        );
        self.inner.write_event(Event::Start(start))?;
        Ok(())
    }

    /// Writes a start tag without attributes.
    pub fn open(&mut self, name: &str) -> Result<()> {
        self.start::<&str, &str>(name, &[])
    }

    /// Writes an end tag.
    pub fn end(&mut self, name: &str) -> Result<()> {
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Writes a self-closing element.
    pub fn empty<N, V>(&mut self, name: &str, attributes: &[(N, V)]) -> Result<()>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let start = BytesStart::new(name).with_attributes(
            attributes
                .iter()
                .map(|(k, v)| (k.as_ref(), v.as_ref())),
        );
        self.inner.write_event(Event::Empty(start))?;
        Ok(())
    }

    /// Writes escaped character data.
    pub fn text(&mut self, text: &str) -> Result<()> {
        self.inner.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// Writes `<name>text</name>`.
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.open(name)?;
        self.text(text)?;
        self.end(name)
    }

    /// Returns the written bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_inner()
    }

    /// Returns the written document as a string.
    #[must_use]
    pub fn into_string(self) -> String {
        match String::from_utf8(self.into_bytes()) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// Wraps `content` in a `t:`-namespaced root so fragments can be parsed in tests and tools.
#[must_use]
pub fn types_fragment(content: &str) -> String {
    format!(
        r#"<t:Fragment xmlns:t="{TYPES_NS}" xmlns:m="{MESSAGES_NS}">{content}</t:Fragment>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_resolved() {
        let doc = types_fragment(r#"<t:FolderId Id="A"/><m:SyncState>abc</m:SyncState>"#);
        let mut reader = XmlReader::new(&doc);
        let root = reader.root().unwrap();
        assert!(root.is(&Ns::Types, "Fragment"));

        let id = reader.next_child().unwrap().unwrap();
        assert!(id.is(&Ns::Types, "FolderId"));
        assert_eq!(id.attribute("Id").unwrap().as_deref(), Some("A"));
        reader.skip(&id).unwrap();

        let state = reader.next_child().unwrap().unwrap();
        assert_eq!(state.ns(), &Ns::Messages);
        assert_eq!(reader.read_text(&state).unwrap(), "abc");
        assert!(reader.next_child().unwrap().is_none());
    }

    #[test]
    fn test_skip_recovers_from_nested_position() {
        let doc = types_fragment("<t:A><t:B><t:C>x</t:C></t:B></t:A><t:D>y</t:D>");
        let mut reader = XmlReader::new(&doc);
        reader.root().unwrap();
        let a = reader.next_child().unwrap().unwrap();
        let b = reader.next_child().unwrap().unwrap();
        let _c = reader.next_child().unwrap().unwrap();
        assert_eq!(b.local_name(), "B");

        // Abandon A from deep inside C.
        reader.skip(&a).unwrap();
        let d = reader.next_child().unwrap().unwrap();
        assert_eq!(d.local_name(), "D");
        assert_eq!(reader.read_text(&d).unwrap(), "y");
    }

    #[test]
    fn test_text_is_unescaped() {
        let doc = types_fragment("<t:DisplayName>R&amp;D</t:DisplayName>");
        let mut reader = XmlReader::new(&doc);
        reader.root().unwrap();
        let name = reader.next_child().unwrap().unwrap();
        assert_eq!(reader.read_text(&name).unwrap(), "R&D");
    }

    #[test]
    fn test_writer_escapes() {
        let mut writer = XmlWriter::new();
        writer.text_element("t:DisplayName", "R&D <team>").unwrap();
        assert_eq!(
            writer.into_string(),
            "<t:DisplayName>R&amp;D &lt;team&gt;</t:DisplayName>"
        );
    }
}
