use super::{is_messages, read_bool, read_folders, unexpected_payload, write_ids, Operation, Shape};
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::id::{IdKind, Identifier};
use crate::xml::{Ns, XmlElement, XmlReader, XmlWriter};

/// `Traversal` attribute of `FindFolder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    /// Direct children only.
    #[default]
    Shallow,
    /// The whole subtree.
    Deep,
    /// Soft-deleted children.
    SoftDeleted,
}

impl Traversal {
    /// Value of the `Traversal` attribute.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Traversal::Shallow => "Shallow",
            Traversal::Deep => "Deep",
            Traversal::SoftDeleted => "SoftDeleted",
        }
    }
}

/// `FindFolder` with an indexed page view.
#[derive(Debug, Clone)]
pub struct FindFolder {
    /// Properties to return.
    pub shape: Shape,
    /// Folders to search under.
    pub parents: Vec<Identifier>,
    /// Search depth.
    pub traversal: Traversal,
    /// `(max_entries, offset)` of an `IndexedPageFolderView`.
    pub page: Option<(u32, u32)>,
}

impl FindFolder {
    /// Finds folders under `parents`.
    #[must_use]
    pub fn new(shape: Shape, parents: Vec<Identifier>, traversal: Traversal) -> Self {
        Self {
            shape,
            parents,
            traversal,
            page: None,
        }
    }

    /// Requests one page of `max_entries` starting at `offset`.
    #[must_use]
    pub fn page(mut self, max_entries: u32, offset: u32) -> Self {
        self.page = Some((max_entries, offset));
        self
    }
}

/// Payload of a `FindFolderResponseMessage`.
#[derive(Debug, Clone, Default)]
pub struct FindFolderResult {
    /// Folders found in this page.
    pub folders: Vec<Folder>,
    /// `TotalItemsInView`.
    pub total_items: Option<u32>,
    /// `IncludesLastItemInRange`.
    pub includes_last: bool,
    /// `IndexedPagingOffset` of the next page.
    pub next_offset: Option<u32>,
}

fn parse_u32(value: Option<String>, name: &str) -> Result<Option<u32>> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| Error::malformed(format!("invalid {name} '{v}'")))
        })
        .transpose()
}

impl Operation for FindFolder {
    const NAME: &'static str = "FindFolder";
    type Payload = FindFolderResult;

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![("Traversal", self.traversal.as_str().to_string())]
    }

    fn expected_messages(&self) -> Option<usize> {
        Some(self.parents.len())
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        self.shape.write(writer, "m:FolderShape")?;
        if let Some((max_entries, offset)) = self.page {
            writer.empty(
                "m:IndexedPageFolderView",
                &[
                    ("MaxEntriesReturned", max_entries.to_string()),
                    ("Offset", offset.to_string()),
                    ("BasePoint", "Beginning".to_string()),
                ],
            )?;
        }
        write_ids(writer, "m:ParentFolderIds", &self.parents, IdKind::Folder)
    }

    fn read_payload(
        reader: &mut XmlReader<'_>,
        element: &XmlElement<'_>,
        payload: &mut Self::Payload,
    ) -> Result<()> {
        if !is_messages(element, "RootFolder") {
            return Err(unexpected_payload(Self::NAME, element));
        }

        payload.total_items = parse_u32(element.attribute("TotalItemsInView")?, "TotalItemsInView")?;
        payload.next_offset =
            parse_u32(element.attribute("IndexedPagingOffset")?, "IndexedPagingOffset")?;
        payload.includes_last = match element.attribute("IncludesLastItemInRange")? {
            Some(v) => crate::codec::parse_bool(v.trim())?,
            None => true,
        };

        while let Some(child) = reader.next_child()? {
            if child.is(&Ns::Types, "Folders") {
                read_folders(reader, &mut payload.folders)?;
            } else if child.is(&Ns::Types, "IncludesLastItemInRange") {
                payload.includes_last = read_bool(reader, &child)?;
            } else {
                return Err(child.unexpected("t:Folders"));
            }
        }
        Ok(())
    }
}
