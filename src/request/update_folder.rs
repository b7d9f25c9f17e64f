use super::{is_messages, read_folders, unexpected_payload, Operation};
use crate::error::{Error, Result};
use crate::folder::{Folder, FolderField};
use crate::id::IdKind;
use crate::property::PropertyField;
use crate::xml::{XmlElement, XmlReader, XmlWriter};

/// Changes to apply to one folder.
///
/// `folder` carries the target id (with its change key) and the values of the
/// fields listed in `set`. Setting [`FolderField::ExtendedProperty`] writes one
/// update per extended property present on `folder`.
#[derive(Debug, Clone)]
pub struct FolderChange {
    /// Folder carrying the id and the new values.
    pub folder: Folder,
    /// Fields to set from `folder`.
    pub set: Vec<FolderField>,
    /// Properties to delete.
    pub delete: Vec<PropertyField>,
}

impl FolderChange {
    /// A change to `folder` with nothing selected.
    #[must_use]
    pub fn new(folder: Folder) -> Self {
        Self {
            folder,
            set: Vec::new(),
            delete: Vec::new(),
        }
    }

    /// Sets `field` from the folder's value.
    #[must_use]
    pub fn set(mut self, field: FolderField) -> Self {
        self.set.push(field);
        self
    }

    /// Deletes `field` on the server.
    #[must_use]
    pub fn delete(mut self, field: impl Into<PropertyField>) -> Self {
        self.delete.push(field.into());
        self
    }

    fn write(&self, writer: &mut XmlWriter) -> Result<()> {
        let id = self.folder.id().ok_or_else(|| Error::InvalidConfig {
            message: "folder change without a folder id".into(),
        })?;

        writer.open("t:FolderChange")?;
        id.write(writer, IdKind::Folder)?;
        writer.open("t:Updates")?;
        for &field in &self.set {
            self.write_set(writer, field)?;
        }
        for path in &self.delete {
            writer.open("t:DeleteFolderField")?;
            path.write(writer)?;
            writer.end("t:DeleteFolderField")?;
        }
        writer.end("t:Updates")?;
        writer.end("t:FolderChange")
    }

    fn write_set(&self, writer: &mut XmlWriter, field: FolderField) -> Result<()> {
        let element = format!("t:{}", self.folder.kind().element_name());

        if field == FolderField::ExtendedProperty {
            let Some(props) = self.folder.extended_properties() else {
                return Ok(());
            };
            for (path, value) in props {
                let mut single = Folder::new(self.folder.kind());
                single.set_extended_property(path.clone(), value.clone());

                writer.open("t:SetFolderField")?;
                path.write(writer)?;
                writer.open(&element)?;
                single.write_field(writer, FolderField::ExtendedProperty)?;
                writer.end(&element)?;
                writer.end("t:SetFolderField")?;
            }
            return Ok(());
        }

        let path = field.property().ok_or_else(|| Error::InvalidConfig {
            message: format!("folder field {field:?} has no property path"),
        })?;
        writer.open("t:SetFolderField")?;
        path.write(writer)?;
        writer.open(&element)?;
        self.folder.write_field(writer, field)?;
        writer.end(&element)?;
        writer.end("t:SetFolderField")
    }
}

/// `UpdateFolder`: one response message per change.
#[derive(Debug, Clone)]
pub struct UpdateFolder {
    /// Changes to apply.
    pub changes: Vec<FolderChange>,
}

impl UpdateFolder {
    /// Applies `changes`.
    #[must_use]
    pub fn new(changes: Vec<FolderChange>) -> Self {
        Self { changes }
    }
}

impl Operation for UpdateFolder {
    const NAME: &'static str = "UpdateFolder";
    type Payload = Vec<Folder>;

    fn expected_messages(&self) -> Option<usize> {
        Some(self.changes.len())
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        writer.open("m:FolderChanges")?;
        for change in &self.changes {
            change.write(writer)?;
        }
        writer.end("m:FolderChanges")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::FolderKind;
    use crate::id::Identifier;
    use crate::property::{ExtendedValue, PropertyType};
    use crate::request::{Request, ServerVersion};

    fn target() -> Folder {
        let mut folder = Folder::new(FolderKind::Generic);
        folder.set_id(Identifier::real("F1", Some("CK1")));
        folder
    }

    #[test]
    fn test_set_and_delete() {
        let mut folder = target();
        folder.set_display_name("Renamed");
        let change = FolderChange::new(folder)
            .set(FolderField::DisplayName)
            .delete("folder:FolderClass");

        let request =
            Request::build(&UpdateFolder::new(vec![change]), ServerVersion::default()).unwrap();
        assert!(request.envelope().contains(
            r#"<m:FolderChanges><t:FolderChange><t:FolderId Id="F1" ChangeKey="CK1"/><t:Updates><t:SetFolderField><t:FieldURI FieldURI="folder:DisplayName"/><t:Folder><t:DisplayName>Renamed</t:DisplayName></t:Folder></t:SetFolderField><t:DeleteFolderField><t:FieldURI FieldURI="folder:FolderClass"/></t:DeleteFolderField></t:Updates></t:FolderChange></m:FolderChanges>"#
        ));
    }

    #[test]
    fn test_extended_property_set() {
        let mut folder = target();
        folder.set_extended_property(
            PropertyField::tag(0x10f4, PropertyType::Boolean),
            ExtendedValue::Single("true".into()),
        );
        let change = FolderChange::new(folder).set(FolderField::ExtendedProperty);

        let request =
            Request::build(&UpdateFolder::new(vec![change]), ServerVersion::default()).unwrap();
        let xml = request.envelope();
        assert!(xml.contains(
            r#"<t:SetFolderField><t:ExtendedFieldURI PropertyTag="0x10f4" PropertyType="Boolean"/><t:Folder><t:ExtendedProperty>"#
        ));
        assert!(xml.contains("<t:Value>true</t:Value>"));
    }

    #[test]
    fn test_missing_id_rejected() {
        let change = FolderChange::new(Folder::new(FolderKind::Generic));
        assert!(Request::build(&UpdateFolder::new(vec![change]), ServerVersion::default()).is_err());
    }

    #[test]
    fn test_unset_field_rejected() {
        let change = FolderChange::new(target()).set(FolderField::DisplayName);
        assert!(Request::build(&UpdateFolder::new(vec![change]), ServerVersion::default()).is_err());
    }
}
