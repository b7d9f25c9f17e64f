//! Property paths and extended (MAPI) properties.
//!
//! A [`PropertyField`] names a property either by its EWS schema URI, by an
//! indexed URI, by property set plus id or name, or by raw MAPI tag. The hash
//! is computed once at construction; equality is structural, so a tag and a
//! set+id naming the same server property are distinct keys.

use crate::codec::Value;
use crate::error::{Error, Result};
use crate::xml::{Ns, XmlElement, XmlReader, XmlWriter};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Property set of an extended property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertySet {
    /// `DistinguishedPropertySetId`, e.g. `PublicStrings`.
    Distinguished(String),
    /// `PropertySetId` GUID.
    Guid(String),
}

/// Numeric id or string name within a property set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyId {
    /// `PropertyId`.
    Id(i32),
    /// `PropertyName`.
    Name(String),
}

macro_rules! property_types {
    ($($variant:ident),+ $(,)?) => {
        /// MAPI property type as spelled in `PropertyType`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PropertyType {
            $(#[doc = concat!("`", stringify!($variant), "`.")] $variant,)+
        }

        impl PropertyType {
            /// Spelling used in the `PropertyType` attribute.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(PropertyType::$variant => stringify!($variant),)+
                }
            }
        }

        impl FromStr for PropertyType {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $(stringify!($variant) => Ok(PropertyType::$variant),)+
                    other => Err(Error::malformed(format!("unknown property type '{other}'"))),
                }
            }
        }
    };
}

property_types! {
    ApplicationTime,
    ApplicationTimeArray,
    Binary,
    BinaryArray,
    Boolean,
    CLSID,
    CLSIDArray,
    Currency,
    CurrencyArray,
    Double,
    DoubleArray,
    Error,
    Float,
    FloatArray,
    Integer,
    IntegerArray,
    Long,
    LongArray,
    Null,
    Object,
    ObjectArray,
    Short,
    ShortArray,
    SystemTime,
    SystemTimeArray,
    String,
    StringArray,
}

impl PropertyType {
    /// Whether values of this type are carried in `t:Values`.
    #[must_use]
    pub fn is_multi_valued(self) -> bool {
        self.as_str().ends_with("Array")
    }
}

/// The structural forms of a property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// `t:FieldURI`, e.g. `folder:DisplayName`.
    StandardUri(String),
    /// `t:IndexedFieldURI`, e.g. `contacts:EmailAddress` / `EmailAddress1`.
    IndexedUri {
        /// `FieldURI` attribute.
        uri: String,
        /// `FieldIndex` attribute.
        index: String,
    },
    /// `t:ExtendedFieldURI` addressed by set and id or name.
    Extended {
        /// Property set the id or name belongs to.
        set: PropertySet,
        /// Id or name within the set.
        id: PropertyId,
        /// MAPI type.
        ty: PropertyType,
    },
    /// `t:ExtendedFieldURI` addressed by MAPI tag.
    Tag {
        /// `PropertyTag` value.
        tag: u16,
        /// MAPI type.
        ty: PropertyType,
    },
}

/// A hashable property path.
#[derive(Debug, Clone)]
pub struct PropertyField {
    kind: PropertyKind,
    hash: u64,
}

impl PropertyField {
    /// Builds a field and precomputes its hash.
    #[must_use]
    pub fn new(kind: PropertyKind) -> Self {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            kind,
        }
    }

    /// A `t:FieldURI`.
    #[must_use]
    pub fn standard(uri: impl Into<String>) -> Self {
        Self::new(PropertyKind::StandardUri(uri.into()))
    }

    /// A `t:IndexedFieldURI`.
    #[must_use]
    pub fn indexed(uri: impl Into<String>, index: impl Into<String>) -> Self {
        Self::new(PropertyKind::IndexedUri {
            uri: uri.into(),
            index: index.into(),
        })
    }

    /// A `t:ExtendedFieldURI` addressed by property set.
    #[must_use]
    pub fn extended(set: PropertySet, id: PropertyId, ty: PropertyType) -> Self {
        Self::new(PropertyKind::Extended { set, id, ty })
    }

    /// A `t:ExtendedFieldURI` addressed by MAPI tag.
    #[must_use]
    pub fn tag(tag: u16, ty: PropertyType) -> Self {
        Self::new(PropertyKind::Tag { tag, ty })
    }

    /// The structural form of the field.
    #[must_use]
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// Property type for extended forms.
    #[must_use]
    pub fn property_type(&self) -> Option<PropertyType> {
        match &self.kind {
            PropertyKind::Extended { ty, .. } | PropertyKind::Tag { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    /// Reads a `FieldURI`, `IndexedFieldURI` or `ExtendedFieldURI` element.
    pub fn read(reader: &mut XmlReader<'_>, element: &XmlElement<'_>) -> Result<Self> {
        let field = Self::from_element(element)?;
        reader.skip(element)?;
        Ok(field)
    }

    fn from_element(element: &XmlElement<'_>) -> Result<Self> {
        let required = |name: &str| -> Result<String> {
            element.attribute(name)?.ok_or_else(|| {
                Error::malformed(format!("{} without {name}", element.qualified()))
            })
        };

        match element.local_name() {
            "FieldURI" => Ok(Self::standard(required("FieldURI")?)),
            "IndexedFieldURI" => Ok(Self::indexed(required("FieldURI")?, required("FieldIndex")?)),
            "ExtendedFieldURI" => {
                let ty: PropertyType = required("PropertyType")?.parse()?;

                if let Some(tag) = element.attribute("PropertyTag")? {
                    return Ok(Self::tag(parse_tag(&tag)?, ty));
                }

                let set = match (
                    element.attribute("DistinguishedPropertySetId")?,
                    element.attribute("PropertySetId")?,
                ) {
                    (Some(name), _) => PropertySet::Distinguished(name),
                    (None, Some(guid)) => PropertySet::Guid(guid),
                    (None, None) => {
                        return Err(Error::malformed(
                            "ExtendedFieldURI without a property set or tag",
                        ))
                    }
                };

                let id = match (element.attribute("PropertyId")?, element.attribute("PropertyName")?) {
                    (Some(id), _) => PropertyId::Id(
                        id.trim()
                            .parse()
                            .map_err(|_| Error::malformed(format!("invalid PropertyId '{id}'")))?,
                    ),
                    (None, Some(name)) => PropertyId::Name(name),
                    (None, None) => {
                        return Err(Error::malformed(
                            "ExtendedFieldURI without PropertyId or PropertyName",
                        ))
                    }
                };

                Ok(Self::extended(set, id, ty))
            }
            _ => Err(element.unexpected("t:FieldURI, t:IndexedFieldURI or t:ExtendedFieldURI")),
        }
    }

    /// Writes the path element.
    pub fn write(&self, writer: &mut XmlWriter) -> Result<()> {
        match &self.kind {
            PropertyKind::StandardUri(uri) => {
                writer.empty("t:FieldURI", &[("FieldURI", uri.as_str())])
            }
            PropertyKind::IndexedUri { uri, index } => writer.empty(
                "t:IndexedFieldURI",
                &[("FieldURI", uri.as_str()), ("FieldIndex", index.as_str())],
            ),
            PropertyKind::Extended { set, id, ty } => {
                let mut attrs: Vec<(&str, String)> = Vec::with_capacity(3);
                match set {
                    PropertySet::Distinguished(name) => {
                        attrs.push(("DistinguishedPropertySetId", name.clone()));
                    }
                    PropertySet::Guid(guid) => attrs.push(("PropertySetId", guid.clone())),
                }
                match id {
                    PropertyId::Id(n) => attrs.push(("PropertyId", n.to_string())),
                    PropertyId::Name(name) => attrs.push(("PropertyName", name.clone())),
                }
                attrs.push(("PropertyType", ty.as_str().to_string()));
                writer.empty("t:ExtendedFieldURI", &attrs)
            }
            PropertyKind::Tag { tag, ty } => writer.empty(
                "t:ExtendedFieldURI",
                &[
                    ("PropertyTag", format!("0x{tag:04x}")),
                    ("PropertyType", ty.as_str().to_string()),
                ],
            ),
        }
    }
}

fn parse_tag(text: &str) -> Result<u16> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| Error::malformed(format!("invalid PropertyTag '{text}'")))
}

impl PartialEq for PropertyField {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.kind == other.kind
    }
}

impl Eq for PropertyField {}

impl Hash for PropertyField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl From<&str> for PropertyField {
    fn from(uri: &str) -> Self {
        Self::standard(uri)
    }
}

/// Value of an extended property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedValue {
    /// `t:Value`.
    Single(String),
    /// `t:Values`.
    Multi(Vec<String>),
}

/// Extended properties of one entity.
pub type ExtendedProperties = HashMap<PropertyField, ExtendedValue>;

/// Decodes one `t:ExtendedProperty`, merging into the properties read so far.
pub fn decode_extended_property(
    reader: &mut XmlReader<'_>,
    _: &XmlElement<'_>,
    previous: Option<Value>,
) -> Result<Value> {
    let mut properties = match previous {
        Some(Value::Properties(props)) => props,
        _ => ExtendedProperties::new(),
    };

    let mut field = None;
    let mut value = None;
    while let Some(child) = reader.next_child()? {
        if child.ns() != &Ns::Types {
            return Err(child.unexpected("t: element in ExtendedProperty"));
        }
        match child.local_name() {
            "ExtendedFieldURI" => field = Some(PropertyField::read(reader, &child)?),
            "Value" => value = Some(ExtendedValue::Single(reader.read_text(&child)?)),
            "Values" => {
                let mut values = Vec::new();
                while let Some(v) = reader.next_child()? {
                    if !v.is(&Ns::Types, "Value") {
                        return Err(v.unexpected("t:Value"));
                    }
                    values.push(reader.read_text(&v)?);
                }
                value = Some(ExtendedValue::Multi(values));
            }
            _ => return Err(child.unexpected("t:ExtendedFieldURI, t:Value or t:Values")),
        }
    }

    let field = field.ok_or_else(|| Error::malformed("ExtendedProperty without ExtendedFieldURI"))?;
    let value = value.ok_or_else(|| Error::malformed("ExtendedProperty without a value"))?;
    properties.insert(field, value);
    Ok(Value::Properties(properties))
}

/// Encodes the content of one `t:ExtendedProperty` element.
pub fn encode_extended_property(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    let properties = value
        .as_properties()
        .ok_or_else(|| Error::malformed("expected extended properties"))?;

    for (field, value) in properties {
        field.write(writer)?;
        match value {
            ExtendedValue::Single(v) => writer.text_element("t:Value", v)?,
            ExtendedValue::Multi(values) => {
                writer.open("t:Values")?;
                for v in values {
                    writer.text_element("t:Value", v)?;
                }
                writer.end("t:Values")?;
            }
        }
    }
    Ok(())
}
