//! The `Folder` entity.
//!
//! A folder is a field map over [`FolderField`], a [`FolderKind`], a validity
//! flag and, once assembled into a tree, its children. Children hold a
//! non-owning back reference to their parent as the parent's [`Identifier`].

use crate::codec::{
    decode_id, decode_integer, decode_string, encode_id, encode_string, parse_bool, FieldEntry,
    FieldMap, FieldTable, Value,
};
use crate::error::{Error, Result};
use crate::id::Identifier;
use crate::property::{
    decode_extended_property, encode_extended_property, ExtendedProperties, ExtendedValue,
    PropertyField,
};
use crate::xml::{Ns, XmlElement, XmlReader, XmlWriter};
use bitflags::bitflags;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

/// Folder element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FolderKind {
    /// `t:Folder`.
    #[default]
    Generic,
    /// `t:CalendarFolder`.
    Calendar,
    /// `t:ContactsFolder`.
    Contacts,
    /// `t:SearchFolder`.
    Search,
    /// `t:TasksFolder`.
    Tasks,
}

impl FolderKind {
    /// Element name in the types namespace.
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            FolderKind::Generic => "Folder",
            FolderKind::Calendar => "CalendarFolder",
            FolderKind::Contacts => "ContactsFolder",
            FolderKind::Search => "SearchFolder",
            FolderKind::Tasks => "TasksFolder",
        }
    }

    /// Kind for a types-namespace element name.
    #[must_use]
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "Folder" => Some(FolderKind::Generic),
            "CalendarFolder" => Some(FolderKind::Calendar),
            "ContactsFolder" => Some(FolderKind::Contacts),
            "SearchFolder" => Some(FolderKind::Search),
            "TasksFolder" => Some(FolderKind::Tasks),
            _ => None,
        }
    }
}

/// Fields a folder element can carry, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FolderField {
    /// `t:FolderId`.
    Id,
    /// `t:ParentFolderId`.
    ParentId,
    /// `t:FolderClass`.
    FolderClass,
    /// `t:DisplayName`.
    DisplayName,
    /// `t:TotalCount`.
    TotalCount,
    /// `t:ChildFolderCount`.
    ChildFolderCount,
    /// `t:ExtendedProperty`.
    ExtendedProperty,
    /// `t:ManagedFolderInformation`.
    ManagedFolderInformation,
    /// `t:EffectiveRights`.
    EffectiveRights,
    /// `t:DistinguishedFolderId`.
    DistinguishedFolderId,
    /// `t:PolicyTag`.
    PolicyTag,
    /// `t:ArchiveTag`.
    ArchiveTag,
    /// `t:PermissionSet`.
    PermissionSet,
    /// `t:UnreadCount`.
    UnreadCount,
    /// `t:SearchParameters`.
    SearchParameters,
    /// `t:SharingEffectiveRights`.
    SharingEffectiveRights,
}

impl FolderField {
    /// The `FieldURI` naming this field, if it has one.
    #[must_use]
    pub fn uri(self) -> Option<&'static str> {
        Some(match self {
            FolderField::Id => "folder:FolderId",
            FolderField::ParentId => "folder:ParentFolderId",
            FolderField::FolderClass => "folder:FolderClass",
            FolderField::DisplayName => "folder:DisplayName",
            FolderField::TotalCount => "folder:TotalCount",
            FolderField::ChildFolderCount => "folder:ChildFolderCount",
            FolderField::ManagedFolderInformation => "folder:ManagedFolderInformation",
            FolderField::EffectiveRights => "folder:EffectiveRights",
            FolderField::DistinguishedFolderId => "folder:DistinguishedFolderId",
            FolderField::PolicyTag => "folder:PolicyTag",
            FolderField::ArchiveTag => "folder:ArchiveTag",
            FolderField::PermissionSet => "folder:PermissionSet",
            FolderField::UnreadCount => "folder:UnreadCount",
            FolderField::SearchParameters => "folder:SearchParameters",
            FolderField::SharingEffectiveRights => "folder:SharingEffectiveRights",
            FolderField::ExtendedProperty => return None,
        })
    }

    /// Property path for use in `AdditionalProperties` and `SetFolderField`.
    #[must_use]
    pub fn property(self) -> Option<PropertyField> {
        self.uri().map(PropertyField::standard)
    }
}

bitflags! {
    /// Rights the authenticated user holds on a folder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EffectiveRights: u8 {
        /// May create associated (hidden) items.
        const CREATE_ASSOCIATED = 1 << 0;
        /// May create items.
        const CREATE_CONTENTS = 1 << 1;
        /// May create subfolders.
        const CREATE_HIERARCHY = 1 << 2;
        /// May delete the folder.
        const DELETE = 1 << 3;
        /// May modify the folder.
        const MODIFY = 1 << 4;
        /// May read the folder.
        const READ = 1 << 5;
        /// May see items marked private.
        const VIEW_PRIVATE_ITEMS = 1 << 6;
    }
}

pub(crate) fn decode_rights(
    reader: &mut XmlReader<'_>,
    _: &XmlElement<'_>,
    _: Option<Value>,
) -> Result<Value> {
    let mut rights = EffectiveRights::empty();
    while let Some(child) = reader.next_child()? {
        let flag = match child.local_name() {
            "CreateAssociated" => EffectiveRights::CREATE_ASSOCIATED,
            "CreateContents" => EffectiveRights::CREATE_CONTENTS,
            "CreateHierarchy" => EffectiveRights::CREATE_HIERARCHY,
            "Delete" => EffectiveRights::DELETE,
            "Modify" => EffectiveRights::MODIFY,
            "Read" => EffectiveRights::READ,
            "ViewPrivateItems" => EffectiveRights::VIEW_PRIVATE_ITEMS,
            _ => return Err(child.unexpected("an effective right")),
        };
        if parse_bool(reader.read_text(&child)?.trim())? {
            rights |= flag;
        }
    }
    Ok(Value::Rights(rights))
}

static FOLDER_FIELDS: LazyLock<FieldTable<FolderField>> = LazyLock::new(|| {
    use FolderField as F;
    FieldTable::new(
        Ns::Types,
        vec![
            FieldEntry::new(F::Id, "FolderId", decode_id, encode_id),
            FieldEntry::new(F::ParentId, "ParentFolderId", decode_id, encode_id),
            FieldEntry::new(F::FolderClass, "FolderClass", decode_string, encode_string),
            FieldEntry::new(F::DisplayName, "DisplayName", decode_string, encode_string),
            FieldEntry::read_only(F::TotalCount, "TotalCount", decode_integer),
            FieldEntry::read_only(F::ChildFolderCount, "ChildFolderCount", decode_integer),
            FieldEntry::new(
                F::ExtendedProperty,
                "ExtendedProperty",
                decode_extended_property,
                encode_extended_property,
            ),
            FieldEntry::ignored(F::ManagedFolderInformation, "ManagedFolderInformation"),
            FieldEntry::read_only(F::EffectiveRights, "EffectiveRights", decode_rights),
            FieldEntry::ignored(F::DistinguishedFolderId, "DistinguishedFolderId"),
            FieldEntry::ignored(F::PolicyTag, "PolicyTag"),
            FieldEntry::ignored(F::ArchiveTag, "ArchiveTag"),
            FieldEntry::ignored(F::PermissionSet, "PermissionSet"),
            FieldEntry::read_only(F::UnreadCount, "UnreadCount", decode_integer),
            FieldEntry::ignored(F::SearchParameters, "SearchParameters"),
            FieldEntry::ignored(F::SharingEffectiveRights, "SharingEffectiveRights"),
        ],
    )
});

/// An EWS folder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Folder {
    kind: FolderKind,
    fields: FieldMap<FolderField>,
    valid: bool,
    parent: Option<Identifier>,
    children: Vec<Folder>,
}

impl Folder {
    /// Creates an empty, valid folder of the given kind.
    #[must_use]
    pub fn new(kind: FolderKind) -> Self {
        Self {
            kind,
            valid: true,
            ..Self::default()
        }
    }

    /// Creates an explicitly invalid folder: empty fields, `is_valid() == false`.
    #[must_use]
    pub fn invalid(kind: FolderKind) -> Self {
        Self {
            kind,
            valid: false,
            ..Self::default()
        }
    }

    /// Reads a folder element (`t:Folder`, `t:CalendarFolder`, ...).
    ///
    /// A field that fails to decode makes the whole folder invalid; the cursor
    /// is advanced past the folder element so siblings can still be read.
    pub fn read(reader: &mut XmlReader<'_>, element: &XmlElement<'_>) -> Result<Self> {
        let kind = match FolderKind::from_element_name(element.local_name()) {
            Some(kind) if element.ns() == &Ns::Types => kind,
            _ => return Err(element.unexpected("a folder element")),
        };

        let mut fields = FieldMap::new();
        match FOLDER_FIELDS.read_item(reader, &mut fields) {
            Ok(()) => Ok(Self {
                kind,
                fields,
                valid: true,
                ..Self::default()
            }),
            Err(e) => {
                warn!(element = element.local_name(), error = %e, "Dropping malformed folder");
                reader.skip(element)?;
                Ok(Self::invalid(kind))
            }
        }
    }

    /// Writes the folder element with every writable field.
    pub fn write(&self, writer: &mut XmlWriter) -> Result<()> {
        self.write_with(writer, None)
    }

    /// Writes the folder element with only the listed fields.
    pub fn write_fields(&self, writer: &mut XmlWriter, subset: &[FolderField]) -> Result<()> {
        self.write_with(writer, Some(subset))
    }

    fn write_with(&self, writer: &mut XmlWriter, subset: Option<&[FolderField]>) -> Result<()> {
        if !self.valid {
            return Err(Error::InvalidEntity {
                operation: "write".into(),
                entity: self.kind.element_name().into(),
            });
        }
        let name = format!("t:{}", self.kind.element_name());
        writer.open(&name)?;
        FOLDER_FIELDS.write_items(writer, &self.fields, subset)?;
        writer.end(&name)
    }

    /// Writes a single field element, as used by `SetFolderField`.
    pub fn write_field(&self, writer: &mut XmlWriter, field: FolderField) -> Result<()> {
        let entry = FOLDER_FIELDS.entry(field).ok_or_else(|| Error::InvalidConfig {
            message: format!("folder field {field:?} is not in the table"),
        })?;
        let (Some(value), Some(encode)) = (self.fields.get(&field), entry.encode) else {
            return Err(Error::InvalidConfig {
                message: format!("folder field {field:?} is unset or not writable"),
            });
        };
        FOLDER_FIELDS.write_field(writer, entry.name, value, encode)
    }

    /// Element kind.
    #[must_use]
    pub fn kind(&self) -> FolderKind {
        self.kind
    }

    /// `false` for a folder that failed to decode.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// All decoded fields.
    #[must_use]
    pub fn fields(&self) -> &FieldMap<FolderField> {
        &self.fields
    }

    /// Raw value of `field`.
    #[must_use]
    pub fn get(&self, field: FolderField) -> Option<&Value> {
        self.fields.get(&field)
    }

    /// Sets `field`, replacing any previous value.
    pub fn set(&mut self, field: FolderField, value: Value) {
        self.fields.insert(field, value);
    }

    /// Removes `field`, returning its value.
    pub fn remove(&mut self, field: FolderField) -> Option<Value> {
        self.fields.remove(&field)
    }

    /// `FolderId`.
    #[must_use]
    pub fn id(&self) -> Option<&Identifier> {
        self.get(FolderField::Id).and_then(Value::as_id)
    }

    /// `ParentFolderId`.
    #[must_use]
    pub fn parent_id(&self) -> Option<&Identifier> {
        self.get(FolderField::ParentId).and_then(Value::as_id)
    }

    /// `DisplayName`.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.get(FolderField::DisplayName).and_then(Value::as_str)
    }

    /// `FolderClass`, e.g. `IPF.Note`.
    #[must_use]
    pub fn folder_class(&self) -> Option<&str> {
        self.get(FolderField::FolderClass).and_then(Value::as_str)
    }

    /// `TotalCount`.
    #[must_use]
    pub fn total_count(&self) -> Option<i64> {
        self.get(FolderField::TotalCount).and_then(Value::as_integer)
    }

    /// `ChildFolderCount`.
    #[must_use]
    pub fn child_folder_count(&self) -> Option<i64> {
        self.get(FolderField::ChildFolderCount).and_then(Value::as_integer)
    }

    /// `UnreadCount`.
    #[must_use]
    pub fn unread_count(&self) -> Option<i64> {
        self.get(FolderField::UnreadCount).and_then(Value::as_integer)
    }

    /// `EffectiveRights` of the authenticated user.
    #[must_use]
    pub fn effective_rights(&self) -> Option<EffectiveRights> {
        self.get(FolderField::EffectiveRights).and_then(Value::as_rights)
    }

    /// Extended properties returned for the folder.
    #[must_use]
    pub fn extended_properties(&self) -> Option<&ExtendedProperties> {
        self.get(FolderField::ExtendedProperty).and_then(Value::as_properties)
    }

    /// Sets the folder id.
    pub fn set_id(&mut self, id: Identifier) {
        self.set(FolderField::Id, Value::Id(id));
    }

    /// Sets the parent folder id.
    pub fn set_parent_id(&mut self, id: Identifier) {
        self.set(FolderField::ParentId, Value::Id(id));
    }

    /// Sets the display name.
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.set(FolderField::DisplayName, Value::String(name.into()));
    }

    /// Sets the folder class.
    pub fn set_folder_class(&mut self, class: impl Into<String>) {
        self.set(FolderField::FolderClass, Value::String(class.into()));
    }

    /// Adds or replaces one extended property.
    pub fn set_extended_property(&mut self, field: PropertyField, value: ExtendedValue) {
        match self.fields.get_mut(&FolderField::ExtendedProperty) {
            Some(Value::Properties(props)) => {
                props.insert(field, value);
            }
            _ => {
                let mut props = ExtendedProperties::new();
                props.insert(field, value);
                self.set(FolderField::ExtendedProperty, Value::Properties(props));
            }
        }
    }

    /// Identifier of the parent this folder was attached to in a tree.
    #[must_use]
    pub fn parent(&self) -> Option<&Identifier> {
        self.parent.as_ref()
    }

    /// Child folders, when assembled into a tree.
    #[must_use]
    pub fn children(&self) -> &[Folder] {
        &self.children
    }

    /// Attaches a child, recording this folder's id as its parent.
    pub fn add_child(&mut self, mut child: Folder) {
        child.parent = self.id().cloned();
        self.children.push(child);
    }

    /// The folder followed by all descendants, parents before children.
    #[must_use]
    pub fn pre_order(&self) -> Vec<&Folder> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(folder) = stack.pop() {
            out.push(folder);
            stack.extend(folder.children.iter().rev());
        }
        out
    }

    /// Builds a tree under `root` from a flat list of descendants linked by
    /// `ParentFolderId`. Descendants that do not connect to `root` are reported
    /// as [`Error::OrphanedFolders`].
    pub fn assemble_tree(mut root: Folder, folders: Vec<Folder>) -> Result<Folder> {
        let mut by_parent: HashMap<String, Vec<Folder>> = HashMap::new();
        let mut unparented = Vec::new();
        for folder in folders {
            match folder.parent_id().and_then(Identifier::id) {
                Some(parent) => by_parent.entry(parent.to_string()).or_default().push(folder),
                None => unparented.push(folder),
            }
        }

        fn attach(folder: &mut Folder, by_parent: &mut HashMap<String, Vec<Folder>>) {
            let Some(id) = folder.id().and_then(Identifier::id).map(str::to_string) else {
                return;
            };
            for mut child in by_parent.remove(&id).unwrap_or_default() {
                attach(&mut child, by_parent);
                folder.add_child(child);
            }
        }

        attach(&mut root, &mut by_parent);

        let orphans: Vec<String> = by_parent
            .into_values()
            .flatten()
            .chain(unparented)
            .map(|f| f.id().map_or_else(|| "(no id)".to_string(), ToString::to_string))
            .collect();
        if !orphans.is_empty() {
            return Err(Error::OrphanedFolders { ids: orphans });
        }
        Ok(root)
    }
}
