use super::{unexpected_payload, write_ids, Operation};
use crate::error::Result;
use crate::id::{IdKind, Identifier};
use crate::xml::{XmlElement, XmlReader, XmlWriter};

/// `DeleteType` attribute of `DeleteFolder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteType {
    /// Permanently removes the folder.
    #[default]
    HardDelete,
    /// Moves the folder to the dumpster.
    SoftDelete,
    /// Moves the folder to Deleted Items.
    MoveToDeletedItems,
}

impl DeleteType {
    /// Value of the `DeleteType` attribute.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeleteType::HardDelete => "HardDelete",
            DeleteType::SoftDelete => "SoftDelete",
            DeleteType::MoveToDeletedItems => "MoveToDeletedItems",
        }
    }
}

/// `DeleteFolder`. Response messages carry no payload.
#[derive(Debug, Clone)]
pub struct DeleteFolder {
    /// Folders to delete.
    pub ids: Vec<Identifier>,
    /// How to delete them.
    pub delete_type: DeleteType,
}

impl DeleteFolder {
    /// Deletes `ids`.
    #[must_use]
    pub fn new(ids: Vec<Identifier>, delete_type: DeleteType) -> Self {
        Self { ids, delete_type }
    }
}

impl Operation for DeleteFolder {
    const NAME: &'static str = "DeleteFolder";
    type Payload = ();

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![("DeleteType", self.delete_type.as_str().to_string())]
    }

    fn expected_messages(&self) -> Option<usize> {
        Some(self.ids.len())
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        write_ids(writer, "m:FolderIds", &self.ids, IdKind::Folder)
    }

    fn read_payload(
        _: &mut XmlReader<'_>,
        element: &XmlElement<'_>,
        _: &mut Self::Payload,
    ) -> Result<()> {
        Err(unexpected_payload(Self::NAME, element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::request::{parse_response, Request, ServerVersion};

    #[test]
    fn test_body() {
        let op = DeleteFolder::new(
            vec![Identifier::real("F1", None), Identifier::real("F2", None)],
            DeleteType::SoftDelete,
        );
        let request = Request::build(&op, ServerVersion::default()).unwrap();
        assert!(request.envelope().contains(
            r#"<m:DeleteFolder DeleteType="SoftDelete"><m:FolderIds><t:FolderId Id="F1"/><t:FolderId Id="F2"/></m:FolderIds></m:DeleteFolder>"#
        ));
    }

    #[test]
    fn test_payload_rejected() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
<m:DeleteFolderResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages">
<m:ResponseMessages><m:DeleteFolderResponseMessage ResponseClass="Success">
<m:ResponseCode>NoError</m:ResponseCode><m:Folders/>
</m:DeleteFolderResponseMessage></m:ResponseMessages></m:DeleteFolderResponse></s:Body></s:Envelope>"#;
        assert!(matches!(
            parse_response::<DeleteFolder>(body),
            Err(Error::UnexpectedElement { .. })
        ));
    }
}
