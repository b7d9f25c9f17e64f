//! SOAP request construction and dispatch.
//!
//! Each EWS operation implements [`Operation`]: it writes its body into the
//! `m:<Operation>` element and reads the operation-specific payload out of each
//! `m:<Operation>ResponseMessage`. [`Request`] wraps the envelope; building it
//! is the `Built` state and [`Request::send`] consumes it, so a request can
//! only be sent once.

mod create_folder;
mod delete_folder;
mod find_folder;
mod get_folder;
mod get_item;
mod move_folder;
mod response;
mod sync_folder_hierarchy;
mod update_folder;

pub use create_folder::CreateFolder;
pub use delete_folder::{DeleteFolder, DeleteType};
pub use find_folder::{FindFolder, FindFolderResult, Traversal};
pub use get_folder::GetFolder;
pub use get_item::GetItem;
pub use move_folder::MoveFolder;
pub use response::{parse_response, ResponseClass, ResponseMessage};
pub use sync_folder_hierarchy::{
    ChangeKind, ChangeListEntry, SyncFolderHierarchy, SyncFolderHierarchyResult,
};
pub use update_folder::{FolderChange, UpdateFolder};

use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::property::PropertyField;
use crate::queue::JobQueue;
use crate::transport::{Credentials, HttpRequest, Transport};
use crate::xml::{Ns, XmlElement, XmlReader, XmlWriter, MESSAGES_NS, SOAP_NS, TYPES_NS};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// Schema version requested in `t:RequestServerVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerVersion {
    /// Exchange 2007 SP1.
    Exchange2007Sp1,
    /// Exchange 2010.
    Exchange2010,
    /// Exchange 2010 SP1.
    Exchange2010Sp1,
    /// Exchange 2010 SP2.
    #[default]
    Exchange2010Sp2,
    /// Exchange 2013.
    Exchange2013,
    /// Exchange 2013 SP1.
    Exchange2013Sp1,
}

impl ServerVersion {
    /// Value of the `Version` attribute.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServerVersion::Exchange2007Sp1 => "Exchange2007_SP1",
            ServerVersion::Exchange2010 => "Exchange2010",
            ServerVersion::Exchange2010Sp1 => "Exchange2010_SP1",
            ServerVersion::Exchange2010Sp2 => "Exchange2010_SP2",
            ServerVersion::Exchange2013 => "Exchange2013",
            ServerVersion::Exchange2013Sp1 => "Exchange2013_SP1",
        }
    }
}

/// `t:BaseShape`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseShape {
    /// Ids only.
    #[default]
    IdOnly,
    /// The server's default property set.
    Default,
    /// Every property the server returns by default.
    AllProperties,
}

impl BaseShape {
    /// Value of `t:BaseShape`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BaseShape::IdOnly => "IdOnly",
            BaseShape::Default => "Default",
            BaseShape::AllProperties => "AllProperties",
        }
    }
}

/// A response shape: base shape plus additional property paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    /// Base property set.
    pub base: BaseShape,
    /// Properties added to the base set.
    pub additional: Vec<PropertyField>,
}

impl Shape {
    /// A shape without additional properties.
    #[must_use]
    pub fn new(base: BaseShape) -> Self {
        Self {
            base,
            additional: Vec::new(),
        }
    }

    /// Adds one property.
    #[must_use]
    pub fn with(mut self, field: impl Into<PropertyField>) -> Self {
        self.additional.push(field.into());
        self
    }

    /// Adds several properties.
    #[must_use]
    pub fn with_all<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = PropertyField>,
    {
        self.additional.extend(fields);
        self
    }

    /// Writes `<element><t:BaseShape/>[<t:AdditionalProperties/>]</element>`.
    pub(crate) fn write(&self, writer: &mut XmlWriter, element: &str) -> Result<()> {
        writer.open(element)?;
        writer.text_element("t:BaseShape", self.base.as_str())?;
        if !self.additional.is_empty() {
            writer.open("t:AdditionalProperties")?;
            for field in &self.additional {
                field.write(writer)?;
            }
            writer.end("t:AdditionalProperties")?;
        }
        writer.end(element)
    }
}

/// One EWS operation.
pub trait Operation {
    /// Operation element name, e.g. `GetFolder`.
    const NAME: &'static str;

    /// What each response message carries besides class, code and text.
    type Payload: Default + Send + 'static;

    /// Attributes of the `m:<Operation>` element.
    fn attributes(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Number of response messages the server must return, when fixed.
    fn expected_messages(&self) -> Option<usize>;

    /// Writes the content of the `m:<Operation>` element.
    fn write_body(&self, writer: &mut XmlWriter) -> Result<()>;

    /// Reads one payload element of a response message. The element must be
    /// consumed completely.
    fn read_payload(
        reader: &mut XmlReader<'_>,
        element: &XmlElement<'_>,
        payload: &mut Self::Payload,
    ) -> Result<()>;
}

/// A built SOAP request for operation `O`.
#[derive(Debug)]
pub struct Request<O: Operation> {
    envelope: String,
    expected: Option<usize>,
    _operation: PhantomData<fn() -> O>,
}

impl<O: Operation> Request<O> {
    /// Serializes the envelope for `operation`.
    pub fn build(operation: &O, version: ServerVersion) -> Result<Self> {
        let mut w = XmlWriter::new();
        w.declaration()?;
        w.start(
            "soap:Envelope",
            &[
                ("xmlns:soap", SOAP_NS),
                ("xmlns:m", MESSAGES_NS),
                ("xmlns:t", TYPES_NS),
            ],
        )?;
        w.open("soap:Header")?;
        w.empty("t:RequestServerVersion", &[("Version", version.as_str())])?;
        w.end("soap:Header")?;
        w.open("soap:Body")?;

        let element = format!("m:{}", O::NAME);
        w.start(&element, &operation.attributes())?;
        operation.write_body(&mut w)?;
        w.end(&element)?;

        w.end("soap:Body")?;
        w.end("soap:Envelope")?;

        Ok(Self {
            envelope: w.into_string(),
            expected: operation.expected_messages(),
            _operation: PhantomData,
        })
    }

    /// The serialized envelope.
    #[must_use]
    pub fn envelope(&self) -> &str {
        &self.envelope
    }

    /// Posts the envelope through the admission queue and parses the reply.
    #[instrument(name = "Request::send", skip_all, fields(operation = O::NAME, url = %url))]
    pub async fn send(
        self,
        transport: Arc<dyn Transport>,
        queue: &JobQueue,
        url: Url,
        credentials: Option<Credentials>,
    ) -> Result<Vec<ResponseMessage<O::Payload>>> {
        let http = HttpRequest::xml(url, self.envelope).with_credentials(credentials);
        let response = queue
            .run(O::NAME, async move { transport.send(http).await })
            .await?;

        debug!(status = response.status, bytes = response.body.len(), "Response received");

        if !response.is_success() {
            if let Some(fault) = response::parse_fault(&response.body) {
                return Err(fault);
            }
            return Err(Error::Http {
                status: response.status,
                url: response.url.to_string(),
            });
        }

        let messages = parse_response::<O>(&response.body)?;
        if let Some(expected) = self.expected {
            if messages.len() != expected {
                return Err(Error::ResponseCountMismatch {
                    operation: O::NAME.to_string(),
                    expected,
                    actual: messages.len(),
                });
            }
        }
        Ok(messages)
    }
}

/// Reads the folder elements inside `m:Folders` / `t:Folders`.
pub(crate) fn read_folders(reader: &mut XmlReader<'_>, out: &mut Vec<Folder>) -> Result<()> {
    while let Some(element) = reader.next_child()? {
        out.push(Folder::read(reader, &element)?);
    }
    Ok(())
}

pub(crate) fn read_bool(reader: &mut XmlReader<'_>, element: &XmlElement<'_>) -> Result<bool> {
    crate::codec::parse_bool(reader.read_text(element)?.trim())
}

/// Rejects an element an operation does not expect in its response message.
pub(crate) fn unexpected_payload(operation: &str, element: &XmlElement<'_>) -> Error {
    element.unexpected(format!("a {operation} response element"))
}

/// Writes `<wrapper>` around the given identifiers.
pub(crate) fn write_ids(
    writer: &mut XmlWriter,
    wrapper: &str,
    ids: &[crate::id::Identifier],
    kind: crate::id::IdKind,
) -> Result<()> {
    writer.open(wrapper)?;
    for id in ids {
        id.write(writer, kind)?;
    }
    writer.end(wrapper)
}

pub(crate) fn is_messages(element: &XmlElement<'_>, local: &str) -> bool {
    element.is(&Ns::Messages, local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{DistinguishedFolder, Identifier};

    #[test]
    fn test_envelope_shape() {
        let op = GetFolder::new(
            Shape::new(BaseShape::IdOnly).with("folder:DisplayName"),
            vec![Identifier::from(DistinguishedFolder::Inbox)],
        );
        let request = Request::build(&op, ServerVersion::Exchange2010Sp2).unwrap();
        let xml = request.envelope();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains(r#"<t:RequestServerVersion Version="Exchange2010_SP2"/>"#));
        assert!(xml.contains(
            r#"<m:GetFolder><m:FolderShape><t:BaseShape>IdOnly</t:BaseShape><t:AdditionalProperties><t:FieldURI FieldURI="folder:DisplayName"/></t:AdditionalProperties></m:FolderShape><m:FolderIds><t:DistinguishedFolderId Id="inbox"/></m:FolderIds></m:GetFolder>"#
        ));

        // The envelope parses back with the expected namespaces.
        let mut reader = XmlReader::new(xml);
        let root = reader.root().unwrap();
        assert!(root.is(&Ns::Soap, "Envelope"));
    }

    #[test]
    fn test_operation_attributes_written() {
        let op = FindFolder::new(
            Shape::new(BaseShape::IdOnly),
            vec![Identifier::from(DistinguishedFolder::MsgFolderRoot)],
            Traversal::Deep,
        );
        let request = Request::build(&op, ServerVersion::default()).unwrap();
        assert!(request.envelope().contains(r#"<m:FindFolder Traversal="Deep">"#));
    }
}
