//! Folder and item identifiers.
//!
//! An [`Identifier`] is either a well-known [`DistinguishedFolder`], an opaque
//! server id with an optional change key, or unspecified. Equality is
//! structural: two real ids with different change keys are different values.
//!
//! ```
//! use ews_sync::id::{DistinguishedFolder, Identifier};
//!
//! let a = Identifier::real("AAMkAD", Some("CQAAAB"));
//! let b = Identifier::real("AAMkAD", Some("CQAAAC"));
//! assert_ne!(a, b);
//! assert_eq!(a.id(), b.id());
//!
//! let inbox = Identifier::Distinguished(DistinguishedFolder::Inbox);
//! assert_eq!(inbox.to_string(), "inbox");
//! ```

use crate::error::{Error, Result};
use crate::xml::{XmlElement, XmlReader, XmlWriter};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{LazyLock, RwLock};

macro_rules! distinguished_folders {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Well-known folder names usable before the server's real id is known.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[non_exhaustive]
        pub enum DistinguishedFolder {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )+
        }

        impl DistinguishedFolder {
            /// Every distinguished folder, in declaration order.
            pub const ALL: &'static [DistinguishedFolder] = &[$(DistinguishedFolder::$variant),+];

            /// The wire name used in `DistinguishedFolderId/@Id`.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(DistinguishedFolder::$variant => $name,)+
                }
            }
        }

        impl FromStr for DistinguishedFolder {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(DistinguishedFolder::$variant),)+
                    other => Err(Error::malformed(format!("unknown distinguished folder '{other}'"))),
                }
            }
        }
    };
}

distinguished_folders! {
    Calendar => "calendar",
    Contacts => "contacts",
    DeletedItems => "deleteditems",
    Drafts => "drafts",
    Inbox => "inbox",
    Journal => "journal",
    Notes => "notes",
    Outbox => "outbox",
    SentItems => "sentitems",
    Tasks => "tasks",
    MsgFolderRoot => "msgfolderroot",
    PublicFoldersRoot => "publicfoldersroot",
    Root => "root",
    JunkEmail => "junkemail",
    SearchFolders => "searchfolders",
    VoiceMail => "voicemail",
    RecoverableItemsRoot => "recoverableitemsroot",
    RecoverableItemsDeletions => "recoverableitemsdeletions",
    RecoverableItemsVersions => "recoverableitemsversions",
    RecoverableItemsPurges => "recoverableitemspurges",
    ArchiveRoot => "archiveroot",
    ArchiveMsgFolderRoot => "archivemsgfolderroot",
    ArchiveDeletedItems => "archivedeleteditems",
    ArchiveRecoverableItemsRoot => "archiverecoverableitemsroot",
    SyncIssues => "syncissues",
    Conflicts => "conflicts",
    LocalFailures => "localfailures",
    ServerFailures => "serverfailures",
    Archive => "archive",
}

impl std::fmt::Display for DistinguishedFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a real identifier is written as a folder or an item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// `t:FolderId`
    Folder,
    /// `t:ItemId`
    Item,
}

/// A folder or item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Identifier {
    /// A well-known folder.
    Distinguished(DistinguishedFolder),
    /// A server-assigned id with its version token.
    Real {
        /// Opaque server id.
        id: String,
        /// Version token, changes whenever the object changes.
        change_key: Option<String>,
    },
    /// No identifier was present.
    #[default]
    Unspecified,
}

impl Identifier {
    /// Creates a real identifier. An empty change key is treated as absent.
    #[must_use]
    pub fn real(id: impl Into<String>, change_key: Option<&str>) -> Self {
        Identifier::Real {
            id: id.into(),
            change_key: change_key.filter(|k| !k.is_empty()).map(str::to_string),
        }
    }

    /// Returns the opaque id of a real identifier.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Identifier::Real { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Returns the change key of a real identifier.
    #[must_use]
    pub fn change_key(&self) -> Option<&str> {
        match self {
            Identifier::Real { change_key, .. } => change_key.as_deref(),
            _ => None,
        }
    }

    /// Returns the same identifier without its change key.
    #[must_use]
    pub fn without_change_key(&self) -> Self {
        match self {
            Identifier::Real { id, .. } => Identifier::Real {
                id: id.clone(),
                change_key: None,
            },
            other => other.clone(),
        }
    }

    /// Returns `true` for [`Identifier::Unspecified`].
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Identifier::Unspecified)
    }

    /// Reads an identifier from any element carrying `Id`/`ChangeKey` attributes.
    ///
    /// `DistinguishedFolderId` is resolved through the well-known name table.
    /// A missing `Id` yields [`Identifier::Unspecified`]. The element is always
    /// consumed, including any children (such as `Mailbox`).
    pub fn read(reader: &mut XmlReader<'_>, element: &XmlElement<'_>) -> Result<Self> {
        let id = element.attribute("Id")?;
        let change_key = element.attribute("ChangeKey")?;
        reader.skip(element)?;

        let Some(id) = id else {
            return Ok(Identifier::Unspecified);
        };

        if element.local_name() == "DistinguishedFolderId" {
            return Ok(Identifier::Distinguished(id.parse()?));
        }

        Ok(Identifier::real(id, change_key.as_deref()))
    }

    /// Attributes describing this identifier on an element (`Id`, `ChangeKey`).
    #[must_use]
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        match self {
            Identifier::Distinguished(folder) => vec![("Id", folder.as_str().to_string())],
            Identifier::Real { id, change_key } => {
                let mut attrs = vec![("Id", id.clone())];
                if let Some(key) = change_key.as_deref().filter(|k| !k.is_empty()) {
                    attrs.push(("ChangeKey", key.to_string()));
                }
                attrs
            }
            Identifier::Unspecified => Vec::new(),
        }
    }

    /// Writes the identifier as `t:DistinguishedFolderId`, `t:FolderId` or `t:ItemId`.
    pub fn write(&self, writer: &mut XmlWriter, kind: IdKind) -> Result<()> {
        let element = match (self, kind) {
            (Identifier::Distinguished(_), _) => "t:DistinguishedFolderId",
            (Identifier::Real { .. }, IdKind::Folder) => "t:FolderId",
            (Identifier::Real { .. }, IdKind::Item) => "t:ItemId",
            (Identifier::Unspecified, _) => {
                return Err(Error::malformed("cannot write an unspecified identifier"));
            }
        };
        writer.empty(element, &self.attributes())
    }

    /// Human-readable description for logs, using the diagnostic name cache.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Identifier::Real { id, .. } => match display_name(id) {
                Some(name) => format!("{name} ({})", abbreviate(id)),
                None => abbreviate(id),
            },
            other => other.to_string(),
        }
    }
}

impl From<DistinguishedFolder> for Identifier {
    fn from(folder: DistinguishedFolder) -> Self {
        Identifier::Distinguished(folder)
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Distinguished(folder) => f.write_str(folder.as_str()),
            Identifier::Real { id, .. } => f.write_str(id),
            Identifier::Unspecified => f.write_str("(unspecified)"),
        }
    }
}

/// Server ids are long base64 strings; logs only need the distinguishing tail.
fn abbreviate(id: &str) -> String {
    const KEEP: usize = 12;
    let count = id.chars().count();
    if count <= KEEP {
        id.to_string()
    } else {
        let tail: String = id.chars().skip(count - KEEP).collect();
        format!("…{tail}")
    }
}

/// Process-wide id → display name cache, for diagnostics only.
static NAME_CACHE: LazyLock<RwLock<HashMap<String, String>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Records a display name for a real id. Best effort: a poisoned lock drops the update.
pub fn remember_name(id: &str, name: &str) {
    if let Ok(mut cache) = NAME_CACHE.write() {
        cache.insert(id.to_string(), name.to_string());
    }
}

/// Looks up a previously recorded display name.
#[must_use]
pub fn display_name(id: &str) -> Option<String> {
    NAME_CACHE.read().ok()?.get(id).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::types_fragment;

    fn read_first(content: &str) -> Identifier {
        let doc = types_fragment(content);
        let mut reader = XmlReader::new(&doc);
        reader.root().unwrap();
        let element = reader.next_child().unwrap().unwrap();
        Identifier::read(&mut reader, &element).unwrap()
    }

    #[test]
    fn test_equality_requires_same_change_key() {
        let a = Identifier::real("X", Some("K1"));
        let b = Identifier::real("X", Some("K2"));
        assert_ne!(a, b);
        assert_eq!(a, Identifier::real("X", Some("K1")));
        assert_eq!(a.without_change_key(), b.without_change_key());
    }

    #[test]
    fn test_distinguished_equality_and_cross_variant() {
        let inbox = Identifier::Distinguished(DistinguishedFolder::Inbox);
        assert_eq!(inbox, Identifier::from(DistinguishedFolder::Inbox));
        assert_ne!(inbox, Identifier::real("inbox", None));
        assert_ne!(inbox, Identifier::Unspecified);
        assert_ne!(Identifier::real("X", None), Identifier::Unspecified);
    }

    #[test]
    fn test_empty_change_key_is_absent() {
        assert_eq!(Identifier::real("X", Some("")), Identifier::real("X", None));
    }

    #[test]
    fn test_read_real_and_distinguished() {
        let id = read_first(r#"<t:ParentFolderId Id="AAMk" ChangeKey="AQAA"/>"#);
        assert_eq!(id, Identifier::real("AAMk", Some("AQAA")));

        let id = read_first(r#"<t:DistinguishedFolderId Id="msgfolderroot"/>"#);
        assert_eq!(id, Identifier::Distinguished(DistinguishedFolder::MsgFolderRoot));

        let id = read_first(r#"<t:FolderId ChangeKey="AQAA"/>"#);
        assert!(id.is_unspecified());
    }

    #[test]
    fn test_read_consumes_mailbox_child() {
        let doc = types_fragment(
            r#"<t:DistinguishedFolderId Id="inbox"><t:Mailbox><t:EmailAddress>a@b.c</t:EmailAddress></t:Mailbox></t:DistinguishedFolderId><t:FolderId Id="B"/>"#,
        );
        let mut reader = XmlReader::new(&doc);
        reader.root().unwrap();
        let first = reader.next_child().unwrap().unwrap();
        Identifier::read(&mut reader, &first).unwrap();
        let second = reader.next_child().unwrap().unwrap();
        assert_eq!(Identifier::read(&mut reader, &second).unwrap().id(), Some("B"));
    }

    #[test]
    fn test_write_variants() {
        let mut w = XmlWriter::new();
        Identifier::real("A", Some("K")).write(&mut w, IdKind::Folder).unwrap();
        Identifier::real("B", None).write(&mut w, IdKind::Item).unwrap();
        Identifier::from(DistinguishedFolder::SentItems)
            .write(&mut w, IdKind::Folder)
            .unwrap();
        assert_eq!(
            w.into_string(),
            r#"<t:FolderId Id="A" ChangeKey="K"/><t:ItemId Id="B"/><t:DistinguishedFolderId Id="sentitems"/>"#
        );

    }

    #[test]
    fn test_unspecified_write_is_protocol_error() {
        let mut w = XmlWriter::new();
        let err = Identifier::Unspecified
            .write(&mut w, IdKind::Folder)
            .unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
        assert_eq!(err.category(), crate::error::ErrorCategory::Protocol);
        assert!(w.into_string().is_empty());
    }

    #[test]
    fn test_distinguished_table_round_trip() {
        assert!(DistinguishedFolder::ALL.len() >= 25);
        for folder in DistinguishedFolder::ALL {
            assert_eq!(folder.as_str().parse::<DistinguishedFolder>().unwrap(), *folder);
        }
    }

    #[test]
    fn test_name_cache() {
        remember_name("AAMkADlongidentifier0001", "Projects");
        assert_eq!(display_name("AAMkADlongidentifier0001").as_deref(), Some("Projects"));
        let described = Identifier::real("AAMkADlongidentifier0001", None).describe();
        assert!(described.starts_with("Projects ("));
    }
}
