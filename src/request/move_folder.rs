use super::{is_messages, read_folders, unexpected_payload, write_ids, Operation};
use crate::error::Result;
use crate::folder::Folder;
use crate::id::{IdKind, Identifier};
use crate::xml::{XmlElement, XmlReader, XmlWriter};

/// `MoveFolder`: moves folders under a new parent.
///
/// Each response message carries the moved folder with its new id.
#[derive(Debug, Clone)]
pub struct MoveFolder {
    /// Destination folder.
    pub to: Identifier,
    /// Folders to move.
    pub ids: Vec<Identifier>,
}

impl MoveFolder {
    /// Moves `ids` under `to`.
    #[must_use]
    pub fn new(to: Identifier, ids: Vec<Identifier>) -> Self {
        Self { to, ids }
    }
}

impl Operation for MoveFolder {
    const NAME: &'static str = "MoveFolder";
    type Payload = Vec<Folder>;

    fn expected_messages(&self) -> Option<usize> {
        Some(self.ids.len())
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        writer.open("m:ToFolderId")?;
        self.to.write(writer, IdKind::Folder)?;
        writer.end("m:ToFolderId")?;
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
