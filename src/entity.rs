//! Folder/item polymorphism.

use crate::error::Result;
use crate::folder::{Folder, FolderKind};
use crate::id::Identifier;
use crate::item::{Item, ItemKind};
use crate::xml::{XmlElement, XmlReader, XmlWriter};

/// Either a folder or an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A folder element.
    Folder(Folder),
    /// An item element.
    Item(Item),
}

impl Entity {
    /// Reads whichever entity the element names.
    pub fn read(reader: &mut XmlReader<'_>, element: &XmlElement<'_>) -> Result<Self> {
        let name = element.local_name();
        if FolderKind::from_element_name(name).is_some() {
            Folder::read(reader, element).map(Entity::Folder)
        } else if ItemKind::from_element_name(name).is_some() {
            Item::read(reader, element).map(Entity::Item)
        } else {
            Err(element.unexpected("a folder or item element"))
        }
    }

    /// Writes the entity element with all writable fields set.
    pub fn write(&self, writer: &mut XmlWriter) -> Result<()> {
        match self {
            Entity::Folder(folder) => folder.write(writer),
            Entity::Item(item) => item.write(writer),
        }
    }

    /// The entity's own id.
    #[must_use]
    pub fn id(&self) -> Option<&Identifier> {
        match self {
            Entity::Folder(folder) => folder.id(),
            Entity::Item(item) => item.id(),
        }
    }

    /// `false` when the element could not be decoded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Entity::Folder(folder) => folder.is_valid(),
            Entity::Item(item) => item.is_valid(),
        }
    }

    /// Element name of the entity kind, for diagnostics.
    #[must_use]
    pub fn element_name(&self) -> &'static str {
        match self {
            Entity::Folder(folder) => folder.kind().element_name(),
            Entity::Item(item) => item.kind().element_name(),
        }
    }

    /// The folder, if this is one.
    #[must_use]
    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Entity::Folder(folder) => Some(folder),
            Entity::Item(_) => None,
        }
    }

    /// The item, if this is one.
    #[must_use]
    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Entity::Item(item) => Some(item),
            Entity::Folder(_) => None,
        }
    }
}

impl From<Folder> for Entity {
    fn from(folder: Folder) -> Self {
        Entity::Folder(folder)
    }
}

impl From<Item> for Entity {
    fn from(item: Item) -> Self {
        Entity::Item(item)
    }
}
