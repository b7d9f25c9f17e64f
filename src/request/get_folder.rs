use super::{is_messages, read_folders, unexpected_payload, write_ids, Operation, Shape};
use crate::error::Result;
use crate::folder::Folder;
use crate::id::{IdKind, Identifier};
use crate::xml::{XmlElement, XmlReader, XmlWriter};

/// `GetFolder`: one response message per requested id.
#[derive(Debug, Clone)]
pub struct GetFolder {
    /// Properties to return.
    pub shape: Shape,
    /// Folders to fetch.
    pub ids: Vec<Identifier>,
}

impl GetFolder {
    /// Fetches `ids`.
    #[must_use]
    pub fn new(shape: Shape, ids: Vec<Identifier>) -> Self {
        Self { shape, ids }
    }
}

impl Operation for GetFolder {
    const NAME: &'static str = "GetFolder";
    type Payload = Vec<Folder>;

    fn expected_messages(&self) -> Option<usize> {
        Some(self.ids.len())
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        self.shape.write(writer, "m:FolderShape")?;
        write_ids(writer, "m:FolderIds", &self.ids, IdKind::Folder)
    }

    fn read_payload(
        reader: &mut XmlReader<'_>,
        element: &XmlElement<'_>,
        payload: &mut Self::Payload,
    ) -> Result<()> {
        if is_messages(element, "Folders") {
            read_folders(reader, payload)
        } else {
            Err(unexpected_payload(Self::NAME, element))
        }
    }
}
