use super::{is_messages, read_bool, unexpected_payload, Operation, Shape};
use crate::error::{Error, Result};
use crate::folder::{Folder, FolderKind};
use crate::id::{IdKind, Identifier};
use crate::xml::{Ns, XmlElement, XmlReader, XmlWriter};

/// `SyncFolderHierarchy`: changes to the folder tree since a sync state.
#[derive(Debug, Clone)]
pub struct SyncFolderHierarchy {
    /// Properties returned for created and updated folders.
    pub shape: Shape,
    /// Root of the synchronized subtree; the whole mailbox when `None`.
    pub sync_folder: Option<Identifier>,
    /// Opaque state from the previous round; `None` starts from scratch.
    pub sync_state: Option<String>,
}

impl SyncFolderHierarchy {
    /// Syncs the hierarchy under `sync_folder` (the whole mailbox if `None`)
    /// from `sync_state` (the beginning if `None`).
    #[must_use]
    pub fn new(shape: Shape, sync_folder: Option<Identifier>, sync_state: Option<String>) -> Self {
        Self {
            shape,
            sync_folder,
            sync_state,
        }
    }
}

/// Kind of a hierarchy change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A folder appeared.
    Create,
    /// A folder changed.
    Update,
    /// A folder was removed.
    Delete,
}

/// One entry of a hierarchy changelist.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeListEntry {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Id of the changed folder.
    pub id: Identifier,
    /// Present for `Create` and `Update`.
    pub folder: Option<Folder>,
}

impl ChangeListEntry {
    /// A create carrying `folder`.
    #[must_use]
    pub fn create(folder: Folder) -> Self {
        Self {
            kind: ChangeKind::Create,
            id: folder.id().cloned().unwrap_or_default(),
            folder: Some(folder),
        }
    }

    /// An update carrying `folder`.
    #[must_use]
    pub fn update(folder: Folder) -> Self {
        Self {
            kind: ChangeKind::Update,
            id: folder.id().cloned().unwrap_or_default(),
            folder: Some(folder),
        }
    }

    /// A delete of `id`.
    #[must_use]
    pub fn delete(id: Identifier) -> Self {
        Self {
            kind: ChangeKind::Delete,
            id,
            folder: None,
        }
    }
}

/// Payload of a `SyncFolderHierarchyResponseMessage`.
#[derive(Debug, Clone, Default)]
pub struct SyncFolderHierarchyResult {
    /// State to pass to the next call.
    pub sync_state: String,
    /// `IncludesLastFolderInRange`.
    pub includes_last: bool,
    /// Changes in server order.
    pub changes: Vec<ChangeListEntry>,
}

fn read_change(
    reader: &mut XmlReader<'_>,
    element: &XmlElement<'_>,
) -> Result<ChangeListEntry> {
    let kind = match element.local_name() {
        "Create" => ChangeKind::Create,
        "Update" => ChangeKind::Update,
        "Delete" => ChangeKind::Delete,
        _ => return Err(element.unexpected("t:Create, t:Update or t:Delete")),
    };

    let mut id = Identifier::Unspecified;
    let mut folder = None;
    while let Some(child) = reader.next_child()? {
        if child.ns() != &Ns::Types {
            return Err(child.unexpected("a t: element"));
        }
        if child.local_name() == "FolderId" {
            id = Identifier::read(reader, &child)?;
        } else if FolderKind::from_element_name(child.local_name()).is_some() {
            let f = Folder::read(reader, &child)?;
            if let Some(folder_id) = f.id() {
                id = folder_id.clone();
            }
            folder = Some(f);
        } else {
            return Err(child.unexpected("t:FolderId or a folder element"));
        }
    }

    if kind != ChangeKind::Delete && folder.is_none() {
        return Err(Error::malformed(format!(
            "{} change without a folder",
            element.local_name()
        )));
    }
    Ok(ChangeListEntry { kind, id, folder })
}

impl Operation for SyncFolderHierarchy {
    const NAME: &'static str = "SyncFolderHierarchy";
    type Payload = SyncFolderHierarchyResult;

    fn expected_messages(&self) -> Option<usize> {
        Some(1)
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        self.shape.write(writer, "m:FolderShape")?;
        if let Some(folder) = &self.sync_folder {
            writer.open("m:SyncFolderId")?;
            folder.write(writer, IdKind::Folder)?;
            writer.end("m:SyncFolderId")?;
        }
        if let Some(state) = &self.sync_state {
            writer.text_element("m:SyncState", state)?;
        }
        Ok(())
    }

    fn read_payload(
        reader: &mut XmlReader<'_>,
        element: &XmlElement<'_>,
        payload: &mut Self::Payload,
    ) -> Result<()> {
        if is_messages(element, "SyncState") {
            payload.sync_state = reader.read_text(element)?;
        } else if is_messages(element, "IncludesLastFolderInRange") {
            payload.includes_last = read_bool(reader, element)?;
        } else if is_messages(element, "Changes") {
            while let Some(change) = reader.next_child()? {
                payload.changes.push(read_change(reader, &change)?);
            }
        } else {
            return Err(unexpected_payload(Self::NAME, element));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DistinguishedFolder;
    use crate::request::{parse_response, BaseShape, Request, ServerVersion};

    #[test]
    fn test_body_with_state() {
        let op = SyncFolderHierarchy::new(
            Shape::new(BaseShape::IdOnly),
            Some(DistinguishedFolder::MsgFolderRoot.into()),
            Some("H4sI".into()),
        );
        let request = Request::build(&op, ServerVersion::default()).unwrap();
        assert!(request.envelope().contains(
            r#"<m:SyncFolderId><t:DistinguishedFolderId Id="msgfolderroot"/></m:SyncFolderId><m:SyncState>H4sI</m:SyncState>"#
        ));
    }

    #[test]
    fn test_body_without_state() {
        let op = SyncFolderHierarchy::new(Shape::new(BaseShape::IdOnly), None, None);
        let request = Request::build(&op, ServerVersion::default()).unwrap();
        assert!(!request.envelope().contains("SyncState"));
        assert!(!request.envelope().contains("SyncFolderId"));
    }

    #[test]
    fn test_changes_parsed() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
<m:SyncFolderHierarchyResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
<m:ResponseMessages><m:SyncFolderHierarchyResponseMessage ResponseClass="Success">
<m:ResponseCode>NoError</m:ResponseCode>
<m:SyncState>STATE2</m:SyncState>
<m:IncludesLastFolderInRange>true</m:IncludesLastFolderInRange>
<m:Changes>
  <t:Create><t:Folder><t:FolderId Id="N" ChangeKey="1"/></t:Folder></t:Create>
  <t:Update><t:CalendarFolder><t:FolderId Id="U" ChangeKey="2"/></t:CalendarFolder></t:Update>
  <t:Delete><t:FolderId Id="D" ChangeKey="3"/></t:Delete>
</m:Changes>
</m:SyncFolderHierarchyResponseMessage></m:ResponseMessages></m:SyncFolderHierarchyResponse></s:Body></s:Envelope>"#;

        let result = parse_response::<SyncFolderHierarchy>(body)
            .unwrap()
            .remove(0)
            .into_result("SyncFolderHierarchy")
            .unwrap();
        assert_eq!(result.sync_state, "STATE2");
        assert!(result.includes_last);

        let kinds: Vec<_> = result.changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, [ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete]);
        assert_eq!(result.changes[1].id, Identifier::real("U", Some("2")));
        assert_eq!(
            result.changes[1].folder.as_ref().map(Folder::kind),
            Some(FolderKind::Calendar)
        );
        assert!(result.changes[2].folder.is_none());
    }
}
