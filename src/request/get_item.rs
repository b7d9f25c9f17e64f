use super::{is_messages, unexpected_payload, write_ids, Operation, Shape};
use crate::error::Result;
use crate::id::{IdKind, Identifier};
use crate::item::Item;
use crate::xml::{XmlElement, XmlReader, XmlWriter};

/// `GetItem`: one response message per requested item id.
#[derive(Debug, Clone)]
pub struct GetItem {
    /// Properties to return.
    pub shape: Shape,
    /// Items to fetch.
    pub ids: Vec<Identifier>,
}

impl GetItem {
    /// Fetches `ids`.
    #[must_use]
    pub fn new(shape: Shape, ids: Vec<Identifier>) -> Self {
        Self { shape, ids }
    }
}

impl Operation for GetItem {
    const NAME: &'static str = "GetItem";
    type Payload = Vec<Item>;

    fn expected_messages(&self) -> Option<usize> {
        Some(self.ids.len())
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        self.shape.write(writer, "m:ItemShape")?;
        write_ids(writer, "m:ItemIds", &self.ids, IdKind::Item)
    }

    fn read_payload(
        reader: &mut XmlReader<'_>,
        element: &XmlElement<'_>,
        payload: &mut Self::Payload,
    ) -> Result<()> {
        if !is_messages(element, "Items") {
            return Err(unexpected_payload(Self::NAME, element));
        }
        while let Some(child) = reader.next_child()? {
            payload.push(Item::read(reader, &child)?);
        }
        Ok(())
    }
}
