use serde::{Deserialize, Serialize};

use crate::wire::codec::buffer::{
    check_capacity, get_items, items_len, put_list, PacketReader, PacketWriter, WireFormat,
};
use crate::wire::codec::CodecError;
use crate::wire::ident::{
    Acs, CapId, DriveId, Identifier, LsmId, MessageId, PanelId, PoolId, PortId, SubpanelId,
    VolId,
};
use crate::wire::status::Status;
use crate::wire::types::{Type, Version};
use crate::wire::visit::{VisitMut, Walk};

/// Status code, identifier type byte and the fixed identifier slot.
pub const RESPONSE_STATUS_LEN: usize = 11;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub status: Status,
    pub identifier: Identifier,
}

impl ResponseStatus {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            identifier: Identifier::None,
        }
    }

    pub fn with_identifier(status: Status, identifier: Identifier) -> Self {
        Self { status, identifier }
    }
}

impl WireFormat for ResponseStatus {
    fn encoded_len(&self, _version: Version) -> usize {
        RESPONSE_STATUS_LEN
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        writer.put_u16(self.status.code());
        writer.put_u8(self.identifier.kind().code());
        self.identifier.encode_slot(version, writer);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let status = Status(reader.get_u16()?);
        let kind = decode_type(reader.get_u8()?, "identifier_type")?;
        let identifier = Identifier::decode_slot(kind, version, reader)?;
        Ok(Self { status, identifier })
    }
}

/// An identifier paired with the outcome for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdStatus<T> {
    pub id: T,
    pub status: ResponseStatus,
}

impl<T> IdStatus<T> {
    pub fn new(id: T, status: ResponseStatus) -> Self {
        Self { id, status }
    }
}

impl<T: WireFormat> WireFormat for IdStatus<T> {
    fn encoded_len(&self, version: Version) -> usize {
        self.id.encoded_len(version) + RESPONSE_STATUS_LEN
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.id.encode(version, writer);
        self.status.encode(version, writer);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            id: T::decode(version, reader)?,
            status: ResponseStatus::decode(version, reader)?,
        })
    }
}

impl ResponseStatus {
    /// Walks the identifier, then the status. The status is reported
    /// against the identifier's LSM, or `owner` when it names none.
    pub fn walk_for<V: VisitMut + ?Sized>(&mut self, owner: Option<LsmId>, visitor: &mut V) {
        self.identifier.walk(visitor);
        let owner = self.identifier.status_owner().or(owner);
        visitor.visit_status(&mut self.status, owner);
    }
}

impl Walk for ResponseStatus {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.walk_for(None, visitor);
    }
}

impl<T: Walk> Walk for IdStatus<T> {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.id.walk(visitor);
        self.status.walk_for(self.id.status_owner(), visitor);
    }
}

pub fn decode_type(code: u8, field: &'static str) -> Result<Type, CodecError> {
    Type::from_code(code).ok_or(CodecError::UnknownCode {
        field,
        code: i64::from(code),
    })
}

/// Expands `$body` once per list variant with `$items` bound to the vector.
macro_rules! each_list {
    ($list:ident, $value:expr, $items:ident => $body:expr) => {
        match $value {
            $list::Acs($items) => $body,
            $list::Lsm($items) => $body,
            $list::Cap($items) => $body,
            $list::Drive($items) => $body,
            $list::Port($items) => $body,
            $list::Volume($items) => $body,
            $list::Pool($items) => $body,
            $list::Request($items) => $body,
            $list::Panel($items) => $body,
            $list::Subpanel($items) => $body,
        }
    };
}

/// Identifiers of a single kind, preceded on the wire by their count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdList {
    Acs(Vec<Acs>),
    Lsm(Vec<LsmId>),
    Cap(Vec<CapId>),
    Drive(Vec<DriveId>),
    Port(Vec<PortId>),
    Volume(Vec<VolId>),
    Pool(Vec<PoolId>),
    Request(Vec<MessageId>),
    Panel(Vec<PanelId>),
    Subpanel(Vec<SubpanelId>),
}

/// Per-identifier outcomes of a single kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusList {
    Acs(Vec<IdStatus<Acs>>),
    Lsm(Vec<IdStatus<LsmId>>),
    Cap(Vec<IdStatus<CapId>>),
    Drive(Vec<IdStatus<DriveId>>),
    Port(Vec<IdStatus<PortId>>),
    Volume(Vec<IdStatus<VolId>>),
    Pool(Vec<IdStatus<PoolId>>),
    Request(Vec<IdStatus<MessageId>>),
    Panel(Vec<IdStatus<PanelId>>),
    Subpanel(Vec<IdStatus<SubpanelId>>),
}

fn list_kind_from(kind: Type, field: &'static str) -> Result<Type, CodecError> {
    match kind {
        Type::Acs
        | Type::Lsm
        | Type::Cap
        | Type::Drive
        | Type::Port
        | Type::Volume
        | Type::Pool
        | Type::Request
        | Type::Panel
        | Type::Subpanel => Ok(kind),
        other => Err(CodecError::UnknownCode {
            field,
            code: i64::from(other.code()),
        }),
    }
}

impl IdList {
    pub fn kind(&self) -> Type {
        match self {
            Self::Acs(_) => Type::Acs,
            Self::Lsm(_) => Type::Lsm,
            Self::Cap(_) => Type::Cap,
            Self::Drive(_) => Type::Drive,
            Self::Port(_) => Type::Port,
            Self::Volume(_) => Type::Volume,
            Self::Pool(_) => Type::Pool,
            Self::Request(_) => Type::Request,
            Self::Panel(_) => Type::Panel,
            Self::Subpanel(_) => Type::Subpanel,
        }
    }

    pub fn len(&self) -> usize {
        each_list!(Self, self, items => items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of the elements, excluding the count.
    pub fn items_len(&self, version: Version) -> usize {
        each_list!(Self, self, items => items_len(items, version))
    }

    pub fn encode(&self, version: Version, writer: &mut PacketWriter) {
        each_list!(Self, self, items => put_list(items, version, writer))
    }

    pub fn decode_items(
        kind: Type,
        version: Version,
        reader: &mut PacketReader<'_>,
        count: usize,
    ) -> Result<Self, CodecError> {
        let capacity = version.max_ids();
        let list = match list_kind_from(kind, "id_type")? {
            Type::Acs => Self::Acs(get_items(version, reader, "ids", count, capacity)?),
            Type::Lsm => Self::Lsm(get_items(version, reader, "ids", count, capacity)?),
            Type::Cap => Self::Cap(get_items(version, reader, "ids", count, capacity)?),
            Type::Drive => Self::Drive(get_items(version, reader, "ids", count, capacity)?),
            Type::Port => Self::Port(get_items(version, reader, "ids", count, capacity)?),
            Type::Volume => Self::Volume(get_items(version, reader, "ids", count, capacity)?),
            Type::Pool => Self::Pool(get_items(version, reader, "ids", count, capacity)?),
            Type::Request => Self::Request(get_items(version, reader, "ids", count, capacity)?),
            Type::Panel => Self::Panel(get_items(version, reader, "ids", count, capacity)?),
            _ => Self::Subpanel(get_items(version, reader, "ids", count, capacity)?),
        };
        Ok(list)
    }

    pub fn check_capacity(&self, capacity: usize) -> Result<(), CodecError> {
        each_list!(Self, self, items => check_capacity(items, "ids", capacity))
    }

    /// Keeps the first `max` identifiers. Returns how many were dropped.
    pub fn truncate(&mut self, max: usize) -> usize {
        each_list!(Self, self, items => {
            let dropped = items.len().saturating_sub(max);
            items.truncate(max);
            dropped
        })
    }
}

impl StatusList {
    pub fn kind(&self) -> Type {
        match self {
            Self::Acs(_) => Type::Acs,
            Self::Lsm(_) => Type::Lsm,
            Self::Cap(_) => Type::Cap,
            Self::Drive(_) => Type::Drive,
            Self::Port(_) => Type::Port,
            Self::Volume(_) => Type::Volume,
            Self::Pool(_) => Type::Pool,
            Self::Request(_) => Type::Request,
            Self::Panel(_) => Type::Panel,
            Self::Subpanel(_) => Type::Subpanel,
        }
    }

    pub fn empty(kind: Type) -> Result<Self, CodecError> {
        let list = match list_kind_from(kind, "id_type")? {
            Type::Acs => Self::Acs(Vec::new()),
            Type::Lsm => Self::Lsm(Vec::new()),
            Type::Cap => Self::Cap(Vec::new()),
            Type::Drive => Self::Drive(Vec::new()),
            Type::Port => Self::Port(Vec::new()),
            Type::Volume => Self::Volume(Vec::new()),
            Type::Pool => Self::Pool(Vec::new()),
            Type::Request => Self::Request(Vec::new()),
            Type::Panel => Self::Panel(Vec::new()),
            _ => Self::Subpanel(Vec::new()),
        };
        Ok(list)
    }

    pub fn len(&self) -> usize {
        each_list!(Self, self, items => items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items_len(&self, version: Version) -> usize {
        each_list!(Self, self, items => items_len(items, version))
    }

    pub fn encode(&self, version: Version, writer: &mut PacketWriter) {
        each_list!(Self, self, items => put_list(items, version, writer))
    }

    pub fn decode_items(
        kind: Type,
        version: Version,
        reader: &mut PacketReader<'_>,
        count: usize,
    ) -> Result<Self, CodecError> {
        let capacity = version.max_ids();
        let list = match list_kind_from(kind, "id_type")? {
            Type::Acs => Self::Acs(get_items(version, reader, "statuses", count, capacity)?),
            Type::Lsm => Self::Lsm(get_items(version, reader, "statuses", count, capacity)?),
            Type::Cap => Self::Cap(get_items(version, reader, "statuses", count, capacity)?),
            Type::Drive => Self::Drive(get_items(version, reader, "statuses", count, capacity)?),
            Type::Port => Self::Port(get_items(version, reader, "statuses", count, capacity)?),
            Type::Volume => Self::Volume(get_items(version, reader, "statuses", count, capacity)?),
            Type::Pool => Self::Pool(get_items(version, reader, "statuses", count, capacity)?),
            Type::Request => {
                Self::Request(get_items(version, reader, "statuses", count, capacity)?)
            }
            Type::Panel => Self::Panel(get_items(version, reader, "statuses", count, capacity)?),
            _ => Self::Subpanel(get_items(version, reader, "statuses", count, capacity)?),
        };
        Ok(list)
    }

    pub fn check_capacity(&self, capacity: usize) -> Result<(), CodecError> {
        each_list!(Self, self, items => check_capacity(items, "statuses", capacity))
    }

    pub fn truncate(&mut self, max: usize) -> usize {
        each_list!(Self, self, items => {
            let dropped = items.len().saturating_sub(max);
            items.truncate(max);
            dropped
        })
    }
}

/// Audit target: the whole server or an explicit identifier list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditScope<L> {
    Server,
    Listed(L),
}

impl AuditScope<IdList> {
    pub fn kind(&self) -> Type {
        match self {
            Self::Server => Type::Server,
            Self::Listed(list) => list.kind(),
        }
    }
}

impl AuditScope<StatusList> {
    pub fn kind(&self) -> Type {
        match self {
            Self::Server => Type::Server,
            Self::Listed(list) => list.kind(),
        }
    }
}

impl Walk for IdList {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        each_list!(Self, self, items => items.walk(visitor))
    }
}

impl Walk for StatusList {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        each_list!(Self, self, items => items.walk(visitor))
    }
}

impl<L: Walk> Walk for AuditScope<L> {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        if let Self::Listed(list) = self {
            list.walk(visitor);
        }
    }
}

/// Writes the count and elements of an audit scope; SERVER has none.
pub fn put_scope_ids(scope: &AuditScope<IdList>, version: Version, writer: &mut PacketWriter) {
    match scope {
        AuditScope::Server => writer.put_u16(0),
        AuditScope::Listed(list) => list.encode(version, writer),
    }
}

#[cfg(test)]
mod tests {
    use super::{IdList, IdStatus, ResponseStatus, StatusList, RESPONSE_STATUS_LEN};
    use crate::wire::codec::buffer::{PacketReader, PacketWriter, WireFormat};
    use crate::wire::ident::{Identifier, LsmId, VolId};
    use crate::wire::status::Status;
    use crate::wire::types::{Type, Version};
    use crate::wire::visit::{VisitMut, Walk};

    #[test]
    fn response_status_is_eleven_bytes_for_any_identifier() {
        let status = ResponseStatus::with_identifier(
            Status::VOLUME_IN_USE,
            Identifier::Volume(VolId::parse("A00001").expect("valid label")),
        );
        let mut writer = PacketWriter::default();
        status.encode(Version::V2, &mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), RESPONSE_STATUS_LEN);
        assert_eq!(bytes[2], Type::Volume.code());

        let decoded = ResponseStatus::decode(Version::V2, &mut PacketReader::new(&bytes))
            .expect("status decodes");
        assert_eq!(decoded, status);
    }

    #[test]
    fn truncate_reports_dropped_entries() {
        let mut ids = IdList::Lsm((0..10).map(|lsm| LsmId::new(0, lsm)).collect());
        assert_eq!(ids.truncate(4), 6);
        assert_eq!(ids.len(), 4);
        assert_eq!(ids.truncate(8), 0);
    }

    struct Remap;

    impl VisitMut for Remap {
        fn visit_status(&mut self, status: &mut Status, _owner: Option<LsmId>) {
            *status = Status::VARY_DISALLOWED;
        }
    }

    #[test]
    fn walking_a_status_list_reaches_every_status() {
        let mut list = StatusList::Acs(vec![
            IdStatus::new(0, ResponseStatus::new(Status::SUCCESS)),
            IdStatus::new(1, ResponseStatus::new(Status::ACS_ONLINE)),
        ]);
        list.walk(&mut Remap);
        let StatusList::Acs(items) = list else {
            panic!("variant preserved");
        };
        assert!(items.iter().all(|item| item.status.status == Status::VARY_DISALLOWED));
    }

    #[test]
    fn decoding_rejects_non_identifier_kinds() {
        let bytes: [u8; 0] = [];
        let err = IdList::decode_items(Type::Server, Version::V4, &mut PacketReader::new(&bytes), 0)
            .expect_err("SERVER carries no identifiers");
        assert!(err.to_string().contains("id_type"));
    }
}
