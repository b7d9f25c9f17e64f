//! The `Item` entity.
//!
//! Items are read so that folder contents can be enumerated and identified.
//! Body, attachment, recurrence and contact/task payloads are recognised but
//! not interpreted.

use crate::codec::{
    decode_bool, decode_datetime, decode_id, decode_integer, decode_string, decode_strings,
    encode_bool, encode_datetime, encode_id, encode_integer, encode_string, encode_strings,
    FieldEntry, FieldMap, FieldTable, Value,
};
use crate::error::{Error, Result};
use crate::folder::decode_rights;
use crate::id::Identifier;
use crate::property::{decode_extended_property, encode_extended_property, ExtendedProperties};
use crate::xml::{Ns, XmlElement, XmlReader, XmlWriter};
use chrono::{DateTime, Utc};
use std::sync::LazyLock;
use tracing::warn;

/// Item element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemKind {
    /// `t:Item`.
    #[default]
    Item,
    /// `t:Message`.
    Message,
    /// `t:CalendarItem`.
    CalendarItem,
    /// `t:Contact`.
    Contact,
    /// `t:DistributionList`.
    DistributionList,
    /// `t:Task`.
    Task,
    /// `t:MeetingRequest`.
    MeetingRequest,
    /// `t:MeetingResponse`.
    MeetingResponse,
    /// `t:MeetingCancellation`.
    MeetingCancellation,
    /// `t:PostItem`.
    PostItem,
}

impl ItemKind {
    /// Element name in the types namespace.
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            ItemKind::Item => "Item",
            ItemKind::Message => "Message",
            ItemKind::CalendarItem => "CalendarItem",
            ItemKind::Contact => "Contact",
            ItemKind::DistributionList => "DistributionList",
            ItemKind::Task => "Task",
            ItemKind::MeetingRequest => "MeetingRequest",
            ItemKind::MeetingResponse => "MeetingResponse",
            ItemKind::MeetingCancellation => "MeetingCancellation",
            ItemKind::PostItem => "PostItem",
        }
    }

    /// Kind for a types-namespace element name.
    #[must_use]
    pub fn from_element_name(name: &str) -> Option<Self> {
        Some(match name {
            "Item" => ItemKind::Item,
            "Message" => ItemKind::Message,
            "CalendarItem" => ItemKind::CalendarItem,
            "Contact" => ItemKind::Contact,
            "DistributionList" => ItemKind::DistributionList,
            "Task" => ItemKind::Task,
            "MeetingRequest" => ItemKind::MeetingRequest,
            "MeetingResponse" => ItemKind::MeetingResponse,
            "MeetingCancellation" => ItemKind::MeetingCancellation,
            "PostItem" => ItemKind::PostItem,
            _ => return None,
        })
    }
}

/// Item fields this crate decodes. Recognised-but-skipped elements share
/// [`ItemField::Unmodelled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemField {
    /// `t:ItemId`.
    Id,
    /// `t:ParentFolderId`.
    ParentFolderId,
    /// `t:ItemClass`.
    ItemClass,
    /// `t:Subject`.
    Subject,
    /// `t:Sensitivity`.
    Sensitivity,
    /// `t:DateTimeReceived`.
    DateTimeReceived,
    /// `t:Size`.
    Size,
    /// `t:Categories`.
    Categories,
    /// `t:Importance`.
    Importance,
    /// `t:InReplyTo`.
    InReplyTo,
    /// `t:IsSubmitted`.
    IsSubmitted,
    /// `t:IsDraft`.
    IsDraft,
    /// `t:IsFromMe`.
    IsFromMe,
    /// `t:IsResend`.
    IsResend,
    /// `t:IsUnmodified`.
    IsUnmodified,
    /// `t:DateTimeSent`.
    DateTimeSent,
    /// `t:DateTimeCreated`.
    DateTimeCreated,
    /// `t:ReminderDueBy`.
    ReminderDueBy,
    /// `t:ReminderIsSet`.
    ReminderIsSet,
    /// `t:ReminderMinutesBeforeStart`.
    ReminderMinutesBeforeStart,
    /// `t:DisplayCc`.
    DisplayCc,
    /// `t:DisplayTo`.
    DisplayTo,
    /// `t:HasAttachments`.
    HasAttachments,
    /// `t:ExtendedProperty`.
    ExtendedProperty,
    /// `t:Culture`.
    Culture,
    /// `t:EffectiveRights`.
    EffectiveRights,
    /// `t:LastModifiedName`.
    LastModifiedName,
    /// `t:LastModifiedTime`.
    LastModifiedTime,
    /// `t:IsAssociated`.
    IsAssociated,
    /// `t:ConversationId`.
    ConversationId,
    /// `t:Sender`.
    Sender,
    /// `t:IsReadReceiptRequested`.
    IsReadReceiptRequested,
    /// `t:IsDeliveryReceiptRequested`.
    IsDeliveryReceiptRequested,
    /// `t:ConversationIndex`.
    ConversationIndex,
    /// `t:ConversationTopic`.
    ConversationTopic,
    /// `t:From`.
    From,
    /// `t:InternetMessageId`.
    InternetMessageId,
    /// `t:IsRead`.
    IsRead,
    /// `t:IsResponseRequested`.
    IsResponseRequested,
    /// `t:References`.
    References,
    /// `t:ReceivedBy`.
    ReceivedBy,
    /// `t:ReceivedRepresenting`.
    ReceivedRepresenting,
    /// `t:UID`.
    Uid,
    /// `t:RecurrenceId`.
    RecurrenceId,
    /// `t:DateTimeStamp`.
    DateTimeStamp,
    /// `t:Start`.
    Start,
    /// `t:End`.
    End,
    /// `t:OriginalStart`.
    OriginalStart,
    /// `t:IsAllDayEvent`.
    IsAllDayEvent,
    /// `t:LegacyFreeBusyStatus`.
    LegacyFreeBusyStatus,
    /// `t:Location`.
    Location,
    /// `t:IsMeeting`.
    IsMeeting,
    /// `t:IsCancelled`.
    IsCancelled,
    /// `t:IsRecurring`.
    IsRecurring,
    /// `t:CalendarItemType`.
    CalendarItemType,
    /// `t:MyResponseType`.
    MyResponseType,
    /// `t:Organizer`.
    Organizer,
    /// `t:Duration`.
    Duration,
    /// `t:AppointmentSequenceNumber`.
    AppointmentSequenceNumber,
    /// `t:AppointmentState`.
    AppointmentState,
    /// Known elements this crate does not decode.
    Unmodelled,
}

/// A mailbox reference (`t:Mailbox`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mailbox {
    /// `Name`.
    pub name: Option<String>,
    /// `EmailAddress`.
    pub email_address: Option<String>,
    /// `RoutingType`, usually `SMTP`.
    pub routing_type: Option<String>,
    /// `MailboxType`.
    pub mailbox_type: Option<String>,
}

/// Decodes a wrapper element (`t:From`, `t:Organizer`, ...) holding one `t:Mailbox`.
fn decode_mailbox(
    reader: &mut XmlReader<'_>,
    _: &XmlElement<'_>,
    _: Option<Value>,
) -> Result<Value> {
    let mut mailbox = Mailbox::default();
    while let Some(wrapper) = reader.next_child()? {
        if !wrapper.is(&Ns::Types, "Mailbox") {
            return Err(wrapper.unexpected("t:Mailbox"));
        }
        while let Some(child) = reader.next_child()? {
            match child.local_name() {
                "Name" => mailbox.name = Some(reader.read_text(&child)?),
                "EmailAddress" => mailbox.email_address = Some(reader.read_text(&child)?),
                "RoutingType" => mailbox.routing_type = Some(reader.read_text(&child)?),
                "MailboxType" => mailbox.mailbox_type = Some(reader.read_text(&child)?),
                _ => reader.skip(&child)?,
            }
        }
    }
    Ok(Value::Mailbox(mailbox))
}

fn encode_mailbox(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    let mailbox = value
        .as_mailbox()
        .ok_or_else(|| Error::malformed("expected a mailbox value"))?;
    writer.open("t:Mailbox")?;
    for (name, text) in [
        ("t:Name", &mailbox.name),
        ("t:EmailAddress", &mailbox.email_address),
        ("t:RoutingType", &mailbox.routing_type),
        ("t:MailboxType", &mailbox.mailbox_type),
    ] {
        if let Some(text) = text {
            writer.text_element(name, text)?;
        }
    }
    writer.end("t:Mailbox")
}

/// Elements recognised on some item kinds whose content is not interpreted.
const UNMODELLED: &[&str] = &[
    "MimeContent",
    "Body",
    "Attachments",
    "InternetMessageHeaders",
    "ResponseObjects",
    "WebClientReadFormQueryString",
    "WebClientEditFormQueryString",
    "UniqueBody",
    "ToRecipients",
    "CcRecipients",
    "BccRecipients",
    "ReplyTo",
    "RequiredAttendees",
    "OptionalAttendees",
    "Resources",
    "When",
    "TimeZone",
    "Recurrence",
    "FirstOccurrence",
    "LastOccurrence",
    "ModifiedOccurrences",
    "DeletedOccurrences",
    "StartTimeZone",
    "EndTimeZone",
    "MeetingTimeZone",
    "ConferenceType",
    "AllowNewTimeProposal",
    "IsOnlineMeeting",
    "MeetingWorkspaceUrl",
    "NetShowUrl",
    "MeetingRequestWasSent",
    "AdjacentMeetingCount",
    "ConflictingMeetingCount",
    "AssociatedCalendarItemId",
    "IsDelegated",
    "IsOutOfDate",
    "HasBeenProcessed",
    "ResponseType",
    "MeetingRequestType",
    "IntendedFreeBusyStatus",
    "FileAs",
    "FileAsMapping",
    "DisplayName",
    "GivenName",
    "Initials",
    "MiddleName",
    "Nickname",
    "CompleteName",
    "CompanyName",
    "EmailAddresses",
    "PhysicalAddresses",
    "PhoneNumbers",
    "AssistantName",
    "Birthday",
    "BusinessHomePage",
    "Children",
    "Companies",
    "ContactSource",
    "Department",
    "Generation",
    "ImAddresses",
    "JobTitle",
    "Manager",
    "Mileage",
    "OfficeLocation",
    "PostalAddressIndex",
    "Profession",
    "SpouseName",
    "Surname",
    "WeddingAnniversary",
    "HasPicture",
    "Members",
    "ActualWork",
    "AssignedTime",
    "BillingInformation",
    "ChangeCount",
    "CompleteDate",
    "Contacts",
    "DelegationState",
    "Delegator",
    "DueDate",
    "IsAssignmentEditable",
    "IsComplete",
    "IsTeamTask",
    "Owner",
    "PercentComplete",
    "StartDate",
    "Status",
    "StatusDescription",
    "TotalWork",
    "PostedTime",
];

static ITEM_FIELDS: LazyLock<FieldTable<ItemField>> = LazyLock::new(|| {
    use ItemField as F;
    let mut entries = vec![
        FieldEntry::new(F::Id, "ItemId", decode_id, encode_id),
        FieldEntry::new(F::ParentFolderId, "ParentFolderId", decode_id, encode_id),
        FieldEntry::new(F::ItemClass, "ItemClass", decode_string, encode_string),
        FieldEntry::new(F::Subject, "Subject", decode_string, encode_string),
        FieldEntry::new(F::Sensitivity, "Sensitivity", decode_string, encode_string),
        FieldEntry::read_only(F::DateTimeReceived, "DateTimeReceived", decode_datetime),
        FieldEntry::read_only(F::Size, "Size", decode_integer),
        FieldEntry::new(F::Categories, "Categories", decode_strings, encode_strings),
        FieldEntry::new(F::Importance, "Importance", decode_string, encode_string),
        FieldEntry::new(F::InReplyTo, "InReplyTo", decode_string, encode_string),
        FieldEntry::read_only(F::IsSubmitted, "IsSubmitted", decode_bool),
        FieldEntry::read_only(F::IsDraft, "IsDraft", decode_bool),
        FieldEntry::read_only(F::IsFromMe, "IsFromMe", decode_bool),
        FieldEntry::read_only(F::IsResend, "IsResend", decode_bool),
        FieldEntry::read_only(F::IsUnmodified, "IsUnmodified", decode_bool),
        FieldEntry::read_only(F::DateTimeSent, "DateTimeSent", decode_datetime),
        FieldEntry::read_only(F::DateTimeCreated, "DateTimeCreated", decode_datetime),
        FieldEntry::new(F::ReminderDueBy, "ReminderDueBy", decode_datetime, encode_datetime),
        FieldEntry::new(F::ReminderIsSet, "ReminderIsSet", decode_bool, encode_bool),
        FieldEntry::new(
            F::ReminderMinutesBeforeStart,
            "ReminderMinutesBeforeStart",
            decode_integer,
            encode_integer,
        ),
        FieldEntry::read_only(F::DisplayCc, "DisplayCc", decode_string),
        FieldEntry::read_only(F::DisplayTo, "DisplayTo", decode_string),
        FieldEntry::read_only(F::HasAttachments, "HasAttachments", decode_bool),
        FieldEntry::new(
            F::ExtendedProperty,
            "ExtendedProperty",
            decode_extended_property,
            encode_extended_property,
        ),
        FieldEntry::new(F::Culture, "Culture", decode_string, encode_string),
        FieldEntry::read_only(F::EffectiveRights, "EffectiveRights", decode_rights),
        FieldEntry::read_only(F::LastModifiedName, "LastModifiedName", decode_string),
        FieldEntry::read_only(F::LastModifiedTime, "LastModifiedTime", decode_datetime),
        FieldEntry::read_only(F::IsAssociated, "IsAssociated", decode_bool),
        FieldEntry::read_only(F::ConversationId, "ConversationId", decode_id),
        FieldEntry::new(F::Sender, "Sender", decode_mailbox, encode_mailbox),
        FieldEntry::new(
            F::IsReadReceiptRequested,
            "IsReadReceiptRequested",
            decode_bool,
            encode_bool,
        ),
        FieldEntry::new(
            F::IsDeliveryReceiptRequested,
            "IsDeliveryReceiptRequested",
            decode_bool,
            encode_bool,
        ),
        FieldEntry::read_only(F::ConversationIndex, "ConversationIndex", decode_string),
        FieldEntry::read_only(F::ConversationTopic, "ConversationTopic", decode_string),
        FieldEntry::new(F::From, "From", decode_mailbox, encode_mailbox),
        FieldEntry::new(F::InternetMessageId, "InternetMessageId", decode_string, encode_string),
        FieldEntry::new(F::IsRead, "IsRead", decode_bool, encode_bool),
        FieldEntry::new(F::IsResponseRequested, "IsResponseRequested", decode_bool, encode_bool),
        FieldEntry::new(F::References, "References", decode_string, encode_string),
        FieldEntry::read_only(F::ReceivedBy, "ReceivedBy", decode_mailbox),
        FieldEntry::read_only(F::ReceivedRepresenting, "ReceivedRepresenting", decode_mailbox),
        FieldEntry::new(F::Uid, "UID", decode_string, encode_string),
        FieldEntry::read_only(F::RecurrenceId, "RecurrenceId", decode_datetime),
        FieldEntry::read_only(F::DateTimeStamp, "DateTimeStamp", decode_datetime),
        FieldEntry::new(F::Start, "Start", decode_datetime, encode_datetime),
        FieldEntry::new(F::End, "End", decode_datetime, encode_datetime),
        FieldEntry::read_only(F::OriginalStart, "OriginalStart", decode_datetime),
        FieldEntry::new(F::IsAllDayEvent, "IsAllDayEvent", decode_bool, encode_bool),
        FieldEntry::new(
            F::LegacyFreeBusyStatus,
            "LegacyFreeBusyStatus",
            decode_string,
            encode_string,
        ),
        FieldEntry::new(F::Location, "Location", decode_string, encode_string),
        FieldEntry::read_only(F::IsMeeting, "IsMeeting", decode_bool),
        FieldEntry::read_only(F::IsCancelled, "IsCancelled", decode_bool),
        FieldEntry::read_only(F::IsRecurring, "IsRecurring", decode_bool),
        FieldEntry::read_only(F::CalendarItemType, "CalendarItemType", decode_string),
        FieldEntry::read_only(F::MyResponseType, "MyResponseType", decode_string),
        FieldEntry::read_only(F::Organizer, "Organizer", decode_mailbox),
        FieldEntry::read_only(F::Duration, "Duration", decode_string),
        FieldEntry::read_only(
            F::AppointmentSequenceNumber,
            "AppointmentSequenceNumber",
            decode_integer,
        ),
        FieldEntry::read_only(F::AppointmentState, "AppointmentState", decode_integer),
    ];
    entries.extend(UNMODELLED.iter().map(|&name| FieldEntry::ignored(F::Unmodelled, name)));
    FieldTable::new(Ns::Types, entries)
});

/// An EWS item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    kind: ItemKind,
    fields: FieldMap<ItemField>,
    valid: bool,
}

impl Item {
    /// Creates an empty, valid item of the given kind.
    #[must_use]
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            fields: FieldMap::new(),
            valid: true,
        }
    }

    /// Creates an explicitly invalid item.
    #[must_use]
    pub fn invalid(kind: ItemKind) -> Self {
        Self {
            kind,
            fields: FieldMap::new(),
            valid: false,
        }
    }

    /// Reads an item element. Decode failures yield an invalid item and leave
    /// the cursor after the item element.
    pub fn read(reader: &mut XmlReader<'_>, element: &XmlElement<'_>) -> Result<Self> {
        let kind = match ItemKind::from_element_name(element.local_name()) {
            Some(kind) if element.ns() == &Ns::Types => kind,
            _ => return Err(element.unexpected("an item element")),
        };

        let mut fields = FieldMap::new();
        if let Err(e) = ITEM_FIELDS.read_item(reader, &mut fields) {
            warn!(element = element.local_name(), error = %e, "Dropping malformed item");
            reader.skip(element)?;
            return Ok(Self::invalid(kind));
        }
        Ok(Self {
            kind,
            fields,
            valid: true,
        })
    }

    /// Writes the item element with every writable field.
    pub fn write(&self, writer: &mut XmlWriter) -> Result<()> {
        if !self.valid {
            return Err(Error::InvalidEntity {
                operation: "write".into(),
                entity: self.kind.element_name().into(),
            });
        }
        let name = format!("t:{}", self.kind.element_name());
        writer.open(&name)?;
        ITEM_FIELDS.write_items(writer, &self.fields, None)?;
        writer.end(&name)
    }

    /// Element kind.
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// `false` for an item that failed to decode.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// All decoded fields.
    #[must_use]
    pub fn fields(&self) -> &FieldMap<ItemField> {
        &self.fields
    }

    /// Raw value of `field`.
    #[must_use]
    pub fn get(&self, field: ItemField) -> Option<&Value> {
        self.fields.get(&field)
    }

    /// Sets `field`, replacing any previous value.
    pub fn set(&mut self, field: ItemField, value: Value) {
        self.fields.insert(field, value);
    }

    /// Removes `field`, returning its value.
    pub fn remove(&mut self, field: ItemField) -> Option<Value> {
        self.fields.remove(&field)
    }

    /// `ItemId`.
    #[must_use]
    pub fn id(&self) -> Option<&Identifier> {
        self.get(ItemField::Id).and_then(Value::as_id)
    }

    /// `ParentFolderId`.
    #[must_use]
    pub fn parent_folder_id(&self) -> Option<&Identifier> {
        self.get(ItemField::ParentFolderId).and_then(Value::as_id)
    }

    /// `ItemClass`, e.g. `IPM.Note`.
    #[must_use]
    pub fn item_class(&self) -> Option<&str> {
        self.get(ItemField::ItemClass).and_then(Value::as_str)
    }

    /// `Subject`.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get(ItemField::Subject).and_then(Value::as_str)
    }

    /// `DateTimeReceived`.
    #[must_use]
    pub fn date_time_received(&self) -> Option<DateTime<Utc>> {
        self.get(ItemField::DateTimeReceived).and_then(Value::as_datetime)
    }

    /// `Size` in bytes.
    #[must_use]
    pub fn size(&self) -> Option<i64> {
        self.get(ItemField::Size).and_then(Value::as_integer)
    }

    /// `IsRead`.
    #[must_use]
    pub fn is_read(&self) -> Option<bool> {
        self.get(ItemField::IsRead).and_then(Value::as_bool)
    }

    /// Sender from `From`.
    #[must_use]
    pub fn from_mailbox(&self) -> Option<&Mailbox> {
        self.get(ItemField::From).and_then(Value::as_mailbox)
    }

    /// Calendar `UID`.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.get(ItemField::Uid).and_then(Value::as_str)
    }

    /// `CalendarItemType`: `Single`, `Occurrence`, `Exception` or `RecurringMaster`.
    #[must_use]
    pub fn calendar_item_type(&self) -> Option<&str> {
        self.get(ItemField::CalendarItemType).and_then(Value::as_str)
    }

    /// `RecurrenceId` of an occurrence or exception.
    #[must_use]
    pub fn recurrence_id(&self) -> Option<DateTime<Utc>> {
        self.get(ItemField::RecurrenceId).and_then(Value::as_datetime)
    }

    /// `OriginalStart` of an occurrence or exception.
    #[must_use]
    pub fn original_start(&self) -> Option<DateTime<Utc>> {
        self.get(ItemField::OriginalStart).and_then(Value::as_datetime)
    }

    /// Extended properties returned for the item.
    #[must_use]
    pub fn extended_properties(&self) -> Option<&ExtendedProperties> {
        self.get(ItemField::ExtendedProperty).and_then(Value::as_properties)
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.set(ItemField::Subject, Value::String(subject.into()));
    }
}
