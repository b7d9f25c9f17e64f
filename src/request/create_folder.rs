use super::{is_messages, read_folders, unexpected_payload, Operation};
use crate::error::Result;
use crate::folder::{Folder, FolderField};
use crate::id::{IdKind, Identifier};
use crate::xml::{XmlElement, XmlReader, XmlWriter};

/// Fields sent when creating a folder.
const CREATE_FIELDS: &[FolderField] = &[
    FolderField::FolderClass,
    FolderField::DisplayName,
    FolderField::ExtendedProperty,
];

/// `CreateFolder`: creates folders under one parent.
#[derive(Debug, Clone)]
pub struct CreateFolder {
    /// Folder the new folders are created under.
    pub parent: Identifier,
    /// Folders to create.
    pub folders: Vec<Folder>,
}

impl CreateFolder {
    /// Creates `folders` under `parent`.
    #[must_use]
    pub fn new(parent: Identifier, folders: Vec<Folder>) -> Self {
        Self { parent, folders }
    }
}

impl Operation for CreateFolder {
    const NAME: &'static str = "CreateFolder";
    type Payload = Vec<Folder>;

    fn expected_messages(&self) -> Option<usize> {
        Some(self.folders.len())
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        writer.open("m:ParentFolderId")?;
        self.parent.write(writer, IdKind::Folder)?;
        writer.end("m:ParentFolderId")?;

        writer.open("m:Folders")?;
        for folder in &self.folders {
            folder.write_fields(writer, CREATE_FIELDS)?;
        }
        writer.end("m:Folders")
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
