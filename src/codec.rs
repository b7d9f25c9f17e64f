//! Table-driven conversion between EWS XML elements and typed field values.
//!
//! Each entity kind declares a static [`FieldTable`] listing the child elements
//! it understands. Reading walks the children of an entity element and stores
//! one [`Value`] per key; writing emits the present values in table order.

use crate::error::{Error, Result};
use crate::folder::EffectiveRights;
use crate::id::Identifier;
use crate::item::Mailbox;
use crate::property::ExtendedProperties;
use crate::xml::{Ns, XmlElement, XmlReader, XmlWriter};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text content.
    String(String),
    /// Integer content.
    Integer(i64),
    /// `true`/`false` content.
    Bool(bool),
    /// Date-time, normalised to UTC.
    DateTime(DateTime<Utc>),
    /// Identifier carried in attributes.
    Id(Identifier),
    /// List of `t:String` children.
    Strings(Vec<String>),
    /// Folder or item rights.
    Rights(EffectiveRights),
    /// Extended properties keyed by field.
    Properties(ExtendedProperties),
    /// A single mailbox.
    Mailbox(Mailbox),
}

impl Value {
    /// The string, if this is [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is [`Value::Integer`].
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The flag, if this is [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The timestamp, if this is [`Value::DateTime`].
    #[must_use]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// The identifier, if this is [`Value::Id`].
    #[must_use]
    pub fn as_id(&self) -> Option<&Identifier> {
        match self {
            Value::Id(id) => Some(id),
            _ => None,
        }
    }

    /// The list, if this is [`Value::Strings`].
    #[must_use]
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Value::Strings(v) => Some(v),
            _ => None,
        }
    }

    /// The rights, if this is [`Value::Rights`].
    #[must_use]
    pub fn as_rights(&self) -> Option<EffectiveRights> {
        match self {
            Value::Rights(r) => Some(*r),
            _ => None,
        }
    }

    /// The property map, if this is [`Value::Properties`].
    #[must_use]
    pub fn as_properties(&self) -> Option<&ExtendedProperties> {
        match self {
            Value::Properties(p) => Some(p),
            _ => None,
        }
    }

    /// The mailbox, if this is [`Value::Mailbox`].
    #[must_use]
    pub fn as_mailbox(&self) -> Option<&Mailbox> {
        match self {
            Value::Mailbox(m) => Some(m),
            _ => None,
        }
    }

    /// Attributes carried on the field's own element. Identifiers live in
    /// attributes (`<t:ParentFolderId Id=".." ChangeKey=".."/>`).
    #[must_use]
    pub fn element_attributes(&self) -> Vec<(&'static str, String)> {
        match self {
            Value::Id(id) => id.attributes(),
            _ => Vec::new(),
        }
    }

    /// Splits a value into the parts written as separate sibling elements.
    /// Only extended properties repeat; everything else is a single part.
    fn parts(&self) -> Vec<Value> {
        match self {
            Value::Properties(props) => props
                .iter()
                .map(|(field, value)| {
                    let mut single = ExtendedProperties::new();
                    single.insert(field.clone(), value.clone());
                    Value::Properties(single)
                })
                .collect(),
            other => vec![other.clone()],
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Bool(_) => "bool",
            Value::DateTime(_) => "datetime",
            Value::Id(_) => "identifier",
            Value::Strings(_) => "string list",
            Value::Rights(_) => "rights",
            Value::Properties(_) => "extended properties",
            Value::Mailbox(_) => "mailbox",
        }
    }
}

/// Field values keyed by a closed field enumeration.
pub type FieldMap<K> = BTreeMap<K, Value>;

/// Decodes one element. Receives the value already stored for the key, if any.
pub type Decoder = fn(&mut XmlReader<'_>, &XmlElement<'_>, Option<Value>) -> Result<Value>;

/// Encodes a value as element content. The enclosing element is written by the table.
pub type Encoder = fn(&mut XmlWriter, &Value) -> Result<()>;

/// One row of a [`FieldTable`].
#[derive(Clone, Copy)]
pub struct FieldEntry<K> {
    /// Field key in the entity's field map.
    pub key: K,
    /// Local element name.
    pub name: &'static str,
    /// Reader for the element; `None` for write-only fields.
    pub decode: Option<Decoder>,
    /// Writer for the element; `None` for read-only fields.
    pub encode: Option<Encoder>,
    /// Skip the element when reading.
    pub ignore: bool,
}

impl<K: std::fmt::Debug> std::fmt::Debug for FieldEntry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldEntry")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

impl<K> FieldEntry<K> {
    /// A field that is both read and written.
    pub const fn new(key: K, name: &'static str, decode: Decoder, encode: Encoder) -> Self {
        Self {
            key,
            name,
            decode: Some(decode),
            encode: Some(encode),
            ignore: false,
        }
    }

    /// A field that is read but never written (server-computed).
    pub const fn read_only(key: K, name: &'static str, decode: Decoder) -> Self {
        Self {
            key,
            name,
            decode: Some(decode),
            encode: None,
            ignore: false,
        }
    }

    /// A known element whose content is skipped.
    pub const fn ignored(key: K, name: &'static str) -> Self {
        Self {
            key,
            name,
            decode: None,
            encode: None,
            ignore: true,
        }
    }
}

/// An ordered field table with a name index and a declared namespace.
#[derive(Debug)]
pub struct FieldTable<K> {
    ns: Ns,
    entries: Vec<FieldEntry<K>>,
    index: HashMap<&'static str, usize>,
}

impl<K> FieldTable<K>
where
    K: Copy + Ord + std::fmt::Debug,
{
    /// Builds a table whose elements all live in `ns`.
    #[must_use]
    pub fn new(ns: Ns, entries: Vec<FieldEntry<K>>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.name, i))
            .collect();
        Self { ns, entries, index }
    }

    /// Looks up an entry by key.
    #[must_use]
    pub fn entry(&self, key: K) -> Option<&FieldEntry<K>> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Looks up an entry by element local name.
    #[must_use]
    pub fn entry_by_name(&self, name: &str) -> Option<&FieldEntry<K>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Reads every child element of the current element into `fields`.
    ///
    /// Returns once the parent's end tag has been consumed. On error the
    /// cursor may be anywhere inside the parent; callers recover with
    /// [`XmlReader::skip_to`].
    pub fn read_item(&self, reader: &mut XmlReader<'_>, fields: &mut FieldMap<K>) -> Result<()> {
        while let Some(element) = reader.next_child()? {
            self.read_field(reader, &element, fields)?;
        }
        Ok(())
    }

    fn read_field(
        &self,
        reader: &mut XmlReader<'_>,
        element: &XmlElement<'_>,
        fields: &mut FieldMap<K>,
    ) -> Result<()> {
        if element.ns() != &self.ns {
            return Err(element.unexpected(format!("element in {}", self.ns)));
        }

        let entry = self
            .entry_by_name(element.local_name())
            .ok_or_else(|| element.unexpected("a known field element"))?;

        if entry.ignore {
            info!(element = element.local_name(), "Ignoring unsupported field");
            return reader.skip(element);
        }

        let decode = entry.decode.ok_or_else(|| {
            Error::malformed(format!("no decoder for field '{}'", entry.name))
        })?;

        let previous = fields.remove(&entry.key);
        let value = decode(reader, element, previous)?;
        fields.insert(entry.key, value);
        Ok(())
    }

    /// Writes the present fields in table order.
    ///
    /// With `subset`, only the listed keys are considered. Fields without an
    /// encoder are skipped. An encoder failure returns immediately; siblings
    /// already written stay in the output.
    pub fn write_items(
        &self,
        writer: &mut XmlWriter,
        fields: &FieldMap<K>,
        subset: Option<&[K]>,
    ) -> Result<()> {
        for entry in &self.entries {
            if subset.is_some_and(|keys| !keys.contains(&entry.key)) {
                continue;
            }
            let (Some(value), Some(encode)) = (fields.get(&entry.key), entry.encode) else {
                continue;
            };
            self.write_field(writer, entry.name, value, encode)?;
        }
        Ok(())
    }

    /// Writes one field as `<prefix:name ...>content</prefix:name>`, repeating
    /// the element for multi-part values.
    pub fn write_field(
        &self,
        writer: &mut XmlWriter,
        name: &str,
        value: &Value,
        encode: Encoder,
    ) -> Result<()> {
        let qualified = format!("{}:{name}", self.ns.prefix());
        for part in value.parts() {
            writer.start(&qualified, &part.element_attributes())?;
            encode(writer, &part)?;
            writer.end(&qualified)?;
        }
        Ok(())
    }
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::malformed(format!(
        "expected {expected} value, found {}",
        value.type_name()
    ))
}

// ─── Decoders ───────────────────────────────────────────────────────────────

/// Reads the element text.
pub fn decode_string(
    reader: &mut XmlReader<'_>,
    element: &XmlElement<'_>,
    _: Option<Value>,
) -> Result<Value> {
    Ok(Value::String(reader.read_text(element)?))
}

/// Reads the element text as an integer.
pub fn decode_integer(
    reader: &mut XmlReader<'_>,
    element: &XmlElement<'_>,
    _: Option<Value>,
) -> Result<Value> {
    let text = reader.read_text(element)?;
    text.trim()
        .parse()
        .map(Value::Integer)
        .map_err(|_| Error::malformed(format!("'{text}' is not an integer")))
}

/// Reads `true`/`false` (or `1`/`0`).
pub fn decode_bool(
    reader: &mut XmlReader<'_>,
    element: &XmlElement<'_>,
    _: Option<Value>,
) -> Result<Value> {
    let text = reader.read_text(element)?;
    parse_bool(text.trim()).map(Value::Bool)
}

pub(crate) fn parse_bool(text: &str) -> Result<bool> {
    match text {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::malformed(format!("'{other}' is not a boolean"))),
    }
}

/// Reads an RFC 3339 timestamp.
pub fn decode_datetime(
    reader: &mut XmlReader<'_>,
    element: &XmlElement<'_>,
    _: Option<Value>,
) -> Result<Value> {
    let text = reader.read_text(element)?;
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
        .map_err(|e| Error::malformed(format!("'{text}' is not a date-time: {e}")))
}

/// Reads an identifier from the element attributes.
pub fn decode_id(
    reader: &mut XmlReader<'_>,
    element: &XmlElement<'_>,
    _: Option<Value>,
) -> Result<Value> {
    Identifier::read(reader, element).map(Value::Id)
}

/// Decodes a list of `<t:String>` children.
pub fn decode_strings(
    reader: &mut XmlReader<'_>,
    _: &XmlElement<'_>,
    _: Option<Value>,
) -> Result<Value> {
    let mut strings = Vec::new();
    while let Some(child) = reader.next_child()? {
        if !child.is(&Ns::Types, "String") {
            return Err(child.unexpected("t:String"));
        }
        strings.push(reader.read_text(&child)?);
    }
    Ok(Value::Strings(strings))
}

// ─── Encoders ───────────────────────────────────────────────────────────────

/// Writes a string value as text.
pub fn encode_string(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    let s = value.as_str().ok_or_else(|| mismatch("string", value))?;
    writer.text(s)
}

/// Writes an integer value as text.
pub fn encode_integer(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    let n = value.as_integer().ok_or_else(|| mismatch("integer", value))?;
    writer.text(&n.to_string())
}

/// Writes a flag as `true`/`false`.
pub fn encode_bool(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    let b = value.as_bool().ok_or_else(|| mismatch("bool", value))?;
    writer.text(if b { "true" } else { "false" })
}

/// Writes an RFC 3339 UTC timestamp, keeping fractional seconds.
pub fn encode_datetime(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    let dt = value.as_datetime().ok_or_else(|| mismatch("datetime", value))?;
    writer.text(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Identifiers are carried entirely in the element's attributes.
pub fn encode_id(_: &mut XmlWriter, value: &Value) -> Result<()> {
    match value.as_id() {
        Some(Identifier::Unspecified) => {
            Err(Error::malformed("cannot write an unspecified identifier"))
        }
        Some(_) => Ok(()),
        None => Err(mismatch("identifier", value)),
    }
}

/// Writes each string as a `t:String` child.
pub fn encode_strings(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    let strings = value.as_strings().ok_or_else(|| mismatch("string list", value))?;
    for s in strings {
        writer.text_element("t:String", s)?;
    }
    Ok(())
}
