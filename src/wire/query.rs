use serde::{Deserialize, Serialize};

use crate::wire::codec::buffer::{
    check_capacity, get_items, get_list, items_len, put_list, PacketReader, PacketWriter,
    WireFormat, COUNT_LEN,
};
use crate::wire::codec::CodecError;
use crate::wire::ident::{Acs, CapId, CellId, DriveId, LsmId, MessageId, PoolId, PortId, VolId};
use crate::wire::record::decode_type;
use crate::wire::status::Status;
use crate::wire::types::{
    CapMode, CapPriority, Command, DriveType, Freecells, Location, MediaType, State, Type,
    Version, ALL_MEDIA_TYPE, ANY_DRIVE_TYPE,
};
use crate::wire::visit::{VisitMut, Walk};

pub const MEDIA_NAME_LEN: usize = 16;
/// Command classes counted in a request summary: audit, mount, dismount,
/// enter and eject.
pub const SUMMARY_CLASSES: usize = 5;

/// Whether a QUERY of `kind` exists at `version`.
pub fn is_query_type_available(kind: Type, version: Version) -> bool {
    match kind {
        Type::Server
        | Type::Acs
        | Type::Lsm
        | Type::Cap
        | Type::Drive
        | Type::Mount
        | Type::Volume
        | Type::Port
        | Type::Request => true,
        Type::Clean | Type::Scratch | Type::Pool | Type::MountScratch => version >= Version::V1,
        Type::MixedMediaInfo => version.has_media_types(),
        _ => false,
    }
}

fn get_state(reader: &mut PacketReader<'_>) -> Result<State, CodecError> {
    let code = reader.get_u8()?;
    State::from_code(code).ok_or(CodecError::UnknownCode {
        field: "state",
        code: i64::from(code),
    })
}

fn get_status(reader: &mut PacketReader<'_>) -> Result<Status, CodecError> {
    Ok(Status(reader.get_u16()?))
}

/// Writes a field that exists only when `present` holds for the version.
pub(crate) fn put_optional_i8(
    value: Option<i8>,
    present: bool,
    fallback: i8,
    writer: &mut PacketWriter,
) {
    if present {
        writer.put_i8(value.unwrap_or(fallback));
    }
}

pub(crate) fn get_optional_i8(
    present: bool,
    reader: &mut PacketReader<'_>,
) -> Result<Option<i8>, CodecError> {
    if present {
        Ok(Some(reader.get_i8()?))
    } else {
        Ok(None)
    }
}

pub(crate) fn check_optional<T>(
    field: &'static str,
    value: &Option<T>,
    present: bool,
) -> Result<(), CodecError> {
    if value.is_some() != present {
        let reason = if present {
            "required at this version".to_owned()
        } else {
            "not carried at this version".to_owned()
        };
        return Err(CodecError::InvalidField { field, reason });
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    /// Per command class: [current, pending].
    pub requests: [[u16; 2]; SUMMARY_CLASSES],
}

impl WireFormat for RequestSummary {
    fn encoded_len(&self, _version: Version) -> usize {
        SUMMARY_CLASSES * 4
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        for [current, pending] in self.requests {
            writer.put_u16(current);
            writer.put_u16(pending);
        }
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let mut requests = [[0u16; 2]; SUMMARY_CLASSES];
        for class in &mut requests {
            *class = [reader.get_u16()?, reader.get_u16()?];
        }
        Ok(Self { requests })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub state: State,
    pub freecells: Freecells,
    pub requests: RequestSummary,
}

impl WireFormat for ServerStatus {
    fn encoded_len(&self, version: Version) -> usize {
        1 + 4 + self.requests.encoded_len(version)
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        writer.put_u8(self.state.code());
        writer.put_i32(self.freecells);
        self.requests.encode(version, writer);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            state: get_state(reader)?,
            freecells: reader.get_i32()?,
            requests: RequestSummary::decode(version, reader)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcsStatus {
    pub acs: Acs,
    pub state: State,
    pub freecells: Freecells,
    pub requests: RequestSummary,
    pub status: Status,
}

impl WireFormat for AcsStatus {
    fn encoded_len(&self, version: Version) -> usize {
        1 + 1 + 4 + self.requests.encoded_len(version) + 2
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        writer.put_i8(self.acs);
        writer.put_u8(self.state.code());
        writer.put_i32(self.freecells);
        self.requests.encode(version, writer);
        writer.put_u16(self.status.code());
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            acs: reader.get_i8()?,
            state: get_state(reader)?,
            freecells: reader.get_i32()?,
            requests: RequestSummary::decode(version, reader)?,
            status: get_status(reader)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LsmStatus {
    pub lsm_id: LsmId,
    pub state: State,
    pub freecells: Freecells,
    pub requests: RequestSummary,
    pub status: Status,
}

impl WireFormat for LsmStatus {
    fn encoded_len(&self, version: Version) -> usize {
        2 + 1 + 4 + self.requests.encoded_len(version) + 2
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.lsm_id.encode(version, writer);
        writer.put_u8(self.state.code());
        writer.put_i32(self.freecells);
        self.requests.encode(version, writer);
        writer.put_u16(self.status.code());
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            lsm_id: LsmId::decode(version, reader)?,
            state: get_state(reader)?,
            freecells: reader.get_i32()?,
            requests: RequestSummary::decode(version, reader)?,
            status: get_status(reader)?,
        })
    }
}

/// CAP record. Priority and mode exist from version 2 on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapStatus {
    pub cap_id: CapId,
    pub status: Status,
    pub priority: Option<CapPriority>,
    pub cap_size: u16,
    pub state: State,
    pub mode: Option<CapMode>,
}

impl WireFormat for CapStatus {
    fn encoded_len(&self, version: Version) -> usize {
        let extras = if version.has_cap_numbers() { 2 } else { 0 };
        3 + 2 + 2 + 1 + extras
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        let extended = version.has_cap_numbers();
        self.cap_id.encode(version, writer);
        writer.put_u16(self.status.code());
        put_optional_i8(self.priority, extended, 0, writer);
        writer.put_u16(self.cap_size);
        writer.put_u8(self.state.code());
        if extended {
            writer.put_u8(self.mode.unwrap_or(CapMode::Manual).code());
        }
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let extended = version.has_cap_numbers();
        let cap_id = CapId::decode(version, reader)?;
        let status = get_status(reader)?;
        let priority = get_optional_i8(extended, reader)?;
        let cap_size = reader.get_u16()?;
        let state = get_state(reader)?;
        let mode = if extended {
            let code = reader.get_u8()?;
            Some(CapMode::from_code(code).ok_or(CodecError::UnknownCode {
                field: "cap_mode",
                code: i64::from(code),
            })?)
        } else {
            None
        };
        Ok(Self {
            cap_id,
            status,
            priority,
            cap_size,
            state,
            mode,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanStatus {
    pub vol_id: VolId,
    pub media_type: Option<MediaType>,
    pub home_location: CellId,
    pub max_use: u16,
    pub current_use: u16,
    pub status: Status,
}

impl WireFormat for CleanStatus {
    fn encoded_len(&self, version: Version) -> usize {
        6 + usize::from(version.has_media_types()) + 5 + 2 + 2 + 2
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.vol_id.encode(version, writer);
        put_optional_i8(self.media_type, version.has_media_types(), ALL_MEDIA_TYPE, writer);
        self.home_location.encode(version, writer);
        writer.put_u16(self.max_use);
        writer.put_u16(self.current_use);
        writer.put_u16(self.status.code());
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            vol_id: VolId::decode(version, reader)?,
            media_type: get_optional_i8(version.has_media_types(), reader)?,
            home_location: CellId::decode(version, reader)?,
            max_use: reader.get_u16()?,
            current_use: reader.get_u16()?,
            status: get_status(reader)?,
        })
    }
}

/// Drive record; also nested inside mount and mount-scratch records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveStatus {
    pub drive_id: DriveId,
    pub vol_id: VolId,
    pub drive_type: Option<DriveType>,
    pub state: State,
    pub status: Status,
}

impl WireFormat for DriveStatus {
    fn encoded_len(&self, version: Version) -> usize {
        4 + 6 + usize::from(version.has_media_types()) + 1 + 2
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.drive_id.encode(version, writer);
        self.vol_id.encode(version, writer);
        put_optional_i8(self.drive_type, version.has_media_types(), ANY_DRIVE_TYPE, writer);
        writer.put_u8(self.state.code());
        writer.put_u16(self.status.code());
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            drive_id: DriveId::decode(version, reader)?,
            vol_id: VolId::decode(version, reader)?,
            drive_type: get_optional_i8(version.has_media_types(), reader)?,
            state: get_state(reader)?,
            status: get_status(reader)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountStatus {
    pub vol_id: VolId,
    pub status: Status,
    pub drives: Vec<DriveStatus>,
}

impl WireFormat for MountStatus {
    fn encoded_len(&self, version: Version) -> usize {
        6 + 2 + COUNT_LEN + items_len(&self.drives, version)
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.vol_id.encode(version, writer);
        writer.put_u16(self.status.code());
        put_list(&self.drives, version, writer);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            vol_id: VolId::decode(version, reader)?,
            status: get_status(reader)?,
            drives: get_list(version, reader, "drive_status", version.max_drive_status())?,
        })
    }
}

/// Where a volume currently sits. Encoded as a type byte and a five-byte
/// slot that fits either a cell or a drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeLocation {
    Cell(CellId),
    Drive(DriveId),
}

const LOCATION_SLOT_LEN: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStatus {
    pub vol_id: VolId,
    pub media_type: Option<MediaType>,
    pub location: VolumeLocation,
    pub status: Status,
}

impl WireFormat for VolumeStatus {
    fn encoded_len(&self, version: Version) -> usize {
        6 + usize::from(version.has_media_types()) + 1 + LOCATION_SLOT_LEN + 2
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.vol_id.encode(version, writer);
        put_optional_i8(self.media_type, version.has_media_types(), ALL_MEDIA_TYPE, writer);
        match self.location {
            VolumeLocation::Cell(cell) => {
                writer.put_u8(Location::Cell.code());
                cell.encode(version, writer);
            }
            VolumeLocation::Drive(drive) => {
                writer.put_u8(Location::Drive.code());
                drive.encode(version, writer);
                writer.put_zeros(LOCATION_SLOT_LEN - drive.encoded_len(version));
            }
        }
        writer.put_u16(self.status.code());
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let vol_id = VolId::decode(version, reader)?;
        let media_type = get_optional_i8(version.has_media_types(), reader)?;
        let code = reader.get_u8()?;
        let slot = reader.get_array::<LOCATION_SLOT_LEN>()?;
        let mut inner = PacketReader::new(&slot);
        let location = match Location::from_code(code) {
            Some(Location::Cell) => VolumeLocation::Cell(CellId::decode(version, &mut inner)?),
            Some(Location::Drive) => VolumeLocation::Drive(DriveId::decode(version, &mut inner)?),
            None => {
                return Err(CodecError::UnknownCode {
                    field: "location_type",
                    code: i64::from(code),
                })
            }
        };
        Ok(Self {
            vol_id,
            media_type,
            location,
            status: get_status(reader)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStatus {
    pub port_id: PortId,
    pub state: State,
    pub status: Status,
}

impl WireFormat for PortStatus {
    fn encoded_len(&self, _version: Version) -> usize {
        2 + 1 + 2
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.port_id.encode(version, writer);
        writer.put_u8(self.state.code());
        writer.put_u16(self.status.code());
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            port_id: PortId::decode(version, reader)?,
            state: get_state(reader)?,
            status: get_status(reader)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub request: MessageId,
    pub command: Command,
    pub status: Status,
}

impl WireFormat for RequestStatus {
    fn encoded_len(&self, _version: Version) -> usize {
        2 + 1 + 2
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_u16(self.request);
        writer.put_u8(self.command.code());
        writer.put_u16(self.status.code());
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let request = reader.get_u16()?;
        let code = reader.get_u8()?;
        let command = Command::from_code(code).ok_or(CodecError::UnknownCommand { code })?;
        Ok(Self {
            request,
            command,
            status: get_status(reader)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchStatus {
    pub vol_id: VolId,
    pub media_type: Option<MediaType>,
    pub home_location: CellId,
    pub pool_id: PoolId,
    pub status: Status,
}

impl WireFormat for ScratchStatus {
    fn encoded_len(&self, version: Version) -> usize {
        6 + usize::from(version.has_media_types()) + 5 + self.pool_id.encoded_len(version) + 2
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.vol_id.encode(version, writer);
        put_optional_i8(self.media_type, version.has_media_types(), ALL_MEDIA_TYPE, writer);
        self.home_location.encode(version, writer);
        self.pool_id.encode(version, writer);
        writer.put_u16(self.status.code());
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            vol_id: VolId::decode(version, reader)?,
            media_type: get_optional_i8(version.has_media_types(), reader)?,
            home_location: CellId::decode(version, reader)?,
            pool_id: PoolId::decode(version, reader)?,
            status: get_status(reader)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub pool_id: PoolId,
    pub volume_count: u32,
    pub low_water_mark: u32,
    pub high_water_mark: u32,
    pub attributes: u32,
    pub status: Status,
}

impl WireFormat for PoolStatus {
    fn encoded_len(&self, version: Version) -> usize {
        self.pool_id.encoded_len(version) + 16 + 2
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.pool_id.encode(version, writer);
        writer.put_u32(self.volume_count);
        writer.put_u32(self.low_water_mark);
        writer.put_u32(self.high_water_mark);
        writer.put_u32(self.attributes);
        writer.put_u16(self.status.code());
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            pool_id: PoolId::decode(version, reader)?,
            volume_count: reader.get_u32()?,
            low_water_mark: reader.get_u32()?,
            high_water_mark: reader.get_u32()?,
            attributes: reader.get_u32()?,
            status: get_status(reader)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountScratchStatus {
    pub pool_id: PoolId,
    pub status: Status,
    pub drives: Vec<DriveStatus>,
}

impl WireFormat for MountScratchStatus {
    fn encoded_len(&self, version: Version) -> usize {
        self.pool_id.encoded_len(version) + 2 + COUNT_LEN + items_len(&self.drives, version)
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.pool_id.encode(version, writer);
        writer.put_u16(self.status.code());
        put_list(&self.drives, version, writer);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            pool_id: PoolId::decode(version, reader)?,
            status: get_status(reader)?,
            drives: get_list(version, reader, "drive_status", version.max_drive_status())?,
        })
    }
}

/// Fixed-width, NUL padded display name of a media or drive type.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeName([u8; MEDIA_NAME_LEN]);

impl TypeName {
    pub fn new(name: &str) -> Self {
        let mut bytes = [0u8; MEDIA_NAME_LEN];
        let len = name.len().min(MEDIA_NAME_LEN);
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self(bytes)
    }

    pub fn as_str(&self) -> String {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(MEDIA_NAME_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl std::fmt::Debug for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeName({:?})", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub media_type: MediaType,
    pub name: TypeName,
    pub cleaning_cartridge: bool,
}

impl WireFormat for MediaInfo {
    fn encoded_len(&self, _version: Version) -> usize {
        1 + MEDIA_NAME_LEN + 1
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_i8(self.media_type);
        writer.put_bytes(&self.name.0);
        writer.put_u8(u8::from(self.cleaning_cartridge));
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            media_type: reader.get_i8()?,
            name: TypeName(reader.get_array::<MEDIA_NAME_LEN>()?),
            cleaning_cartridge: reader.get_u8()? != 0,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveTypeInfo {
    pub drive_type: DriveType,
    pub name: TypeName,
}

impl WireFormat for DriveTypeInfo {
    fn encoded_len(&self, _version: Version) -> usize {
        1 + MEDIA_NAME_LEN
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_i8(self.drive_type);
        writer.put_bytes(&self.name.0);
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            drive_type: reader.get_i8()?,
            name: TypeName(reader.get_array::<MEDIA_NAME_LEN>()?),
        })
    }
}

/// Selection of a QUERY request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryCriteria {
    Server,
    Acs(Vec<Acs>),
    Lsm(Vec<LsmId>),
    Cap(Vec<CapId>),
    Clean(Vec<VolId>),
    Drive(Vec<DriveId>),
    Mount(Vec<VolId>),
    Volume(Vec<VolId>),
    Port(Vec<PortId>),
    Request(Vec<MessageId>),
    Scratch(Vec<PoolId>),
    Pool(Vec<PoolId>),
    MountScratch {
        media_type: Option<MediaType>,
        pools: Vec<PoolId>,
    },
    MixedMediaInfo,
}

/// Expands `$body` for every criteria variant holding a plain list.
macro_rules! each_criteria_list {
    ($value:expr, $items:ident => $body:expr, $otherwise:expr) => {
        match $value {
            QueryCriteria::Acs($items) => $body,
            QueryCriteria::Lsm($items) => $body,
            QueryCriteria::Cap($items) => $body,
            QueryCriteria::Clean($items) => $body,
            QueryCriteria::Drive($items) => $body,
            QueryCriteria::Mount($items) => $body,
            QueryCriteria::Volume($items) => $body,
            QueryCriteria::Port($items) => $body,
            QueryCriteria::Request($items) => $body,
            QueryCriteria::Scratch($items) => $body,
            QueryCriteria::Pool($items) => $body,
            QueryCriteria::MountScratch { pools: $items, .. } => $body,
            QueryCriteria::Server | QueryCriteria::MixedMediaInfo => $otherwise,
        }
    };
}

impl QueryCriteria {
    pub fn kind(&self) -> Type {
        match self {
            Self::Server => Type::Server,
            Self::Acs(_) => Type::Acs,
            Self::Lsm(_) => Type::Lsm,
            Self::Cap(_) => Type::Cap,
            Self::Clean(_) => Type::Clean,
            Self::Drive(_) => Type::Drive,
            Self::Mount(_) => Type::Mount,
            Self::Volume(_) => Type::Volume,
            Self::Port(_) => Type::Port,
            Self::Request(_) => Type::Request,
            Self::Scratch(_) => Type::Scratch,
            Self::Pool(_) => Type::Pool,
            Self::MountScratch { .. } => Type::MountScratch,
            Self::MixedMediaInfo => Type::MixedMediaInfo,
        }
    }

    pub fn len(&self) -> usize {
        each_criteria_list!(self, items => items.len(), 0)
    }

    /// Type byte, media type where carried and the count field.
    pub fn fixed_len(&self, version: Version) -> usize {
        match self {
            Self::Server | Self::MixedMediaInfo => 1,
            Self::MountScratch { .. } => 1 + usize::from(version.has_media_types()) + COUNT_LEN,
            _ => 1 + COUNT_LEN,
        }
    }

    pub fn encoded_len(&self, version: Version) -> usize {
        self.fixed_len(version)
            + each_criteria_list!(self, items => items_len(items, version), 0)
    }

    pub fn validate(&self, version: Version) -> Result<(), CodecError> {
        let kind = self.kind();
        if !is_query_type_available(kind, version) {
            return Err(CodecError::TypeUnavailable { kind, version });
        }
        if let Self::MountScratch { media_type, .. } = self {
            check_optional("media_type", media_type, version.has_media_types())?;
        }
        each_criteria_list!(self, items => check_capacity(items, "criteria", version.max_ids()), Ok(()))
    }

    pub fn encode(&self, version: Version, writer: &mut PacketWriter) {
        writer.put_u8(self.kind().code());
        if let Self::MountScratch { media_type, .. } = self {
            put_optional_i8(*media_type, version.has_media_types(), ALL_MEDIA_TYPE, writer);
        }
        each_criteria_list!(self, items => put_list(items, version, writer), ())
    }

    pub fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let kind = decode_type(reader.get_u8()?, "query_type")?;
        if !is_query_type_available(kind, version) {
            return Err(CodecError::TypeUnavailable { kind, version });
        }
        let capacity = version.max_ids();
        let criteria = match kind {
            Type::Server => Self::Server,
            Type::MixedMediaInfo => Self::MixedMediaInfo,
            Type::Acs => Self::Acs(get_list(version, reader, "criteria", capacity)?),
            Type::Lsm => Self::Lsm(get_list(version, reader, "criteria", capacity)?),
            Type::Cap => Self::Cap(get_list(version, reader, "criteria", capacity)?),
            Type::Clean => Self::Clean(get_list(version, reader, "criteria", capacity)?),
            Type::Drive => Self::Drive(get_list(version, reader, "criteria", capacity)?),
            Type::Mount => Self::Mount(get_list(version, reader, "criteria", capacity)?),
            Type::Volume => Self::Volume(get_list(version, reader, "criteria", capacity)?),
            Type::Port => Self::Port(get_list(version, reader, "criteria", capacity)?),
            Type::Request => Self::Request(get_list(version, reader, "criteria", capacity)?),
            Type::Scratch => Self::Scratch(get_list(version, reader, "criteria", capacity)?),
            Type::Pool => Self::Pool(get_list(version, reader, "criteria", capacity)?),
            _ => Self::MountScratch {
                media_type: get_optional_i8(version.has_media_types(), reader)?,
                pools: get_list(version, reader, "criteria", capacity)?,
            },
        };
        Ok(criteria)
    }

    /// Keeps the first `max` entries. Returns how many were dropped.
    pub fn truncate(&mut self, max: usize) -> usize {
        each_criteria_list!(self, items => {
            let dropped = items.len().saturating_sub(max);
            items.truncate(max);
            dropped
        }, 0)
    }
}

/// Records of a QUERY response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Server(Vec<ServerStatus>),
    Acs(Vec<AcsStatus>),
    Lsm(Vec<LsmStatus>),
    Cap(Vec<CapStatus>),
    Clean(Vec<CleanStatus>),
    Drive(Vec<DriveStatus>),
    Mount(Vec<MountStatus>),
    Volume(Vec<VolumeStatus>),
    Port(Vec<PortStatus>),
    Request(Vec<RequestStatus>),
    Scratch(Vec<ScratchStatus>),
    Pool(Vec<PoolStatus>),
    MountScratch(Vec<MountScratchStatus>),
    MixedMediaInfo {
        media: Vec<MediaInfo>,
        drives: Vec<DriveTypeInfo>,
    },
}

macro_rules! each_record_list {
    ($value:expr, $items:ident => $body:expr) => {
        match $value {
            QueryStatus::Server($items) => $body,
            QueryStatus::Acs($items) => $body,
            QueryStatus::Lsm($items) => $body,
            QueryStatus::Cap($items) => $body,
            QueryStatus::Clean($items) => $body,
            QueryStatus::Drive($items) => $body,
            QueryStatus::Mount($items) => $body,
            QueryStatus::Volume($items) => $body,
            QueryStatus::Port($items) => $body,
            QueryStatus::Request($items) => $body,
            QueryStatus::Scratch($items) => $body,
            QueryStatus::Pool($items) => $body,
            QueryStatus::MountScratch($items) => $body,
            QueryStatus::MixedMediaInfo { media: $items, .. } => $body,
        }
    };
}

impl QueryStatus {
    pub fn kind(&self) -> Type {
        match self {
            Self::Server(_) => Type::Server,
            Self::Acs(_) => Type::Acs,
            Self::Lsm(_) => Type::Lsm,
            Self::Cap(_) => Type::Cap,
            Self::Clean(_) => Type::Clean,
            Self::Drive(_) => Type::Drive,
            Self::Mount(_) => Type::Mount,
            Self::Volume(_) => Type::Volume,
            Self::Port(_) => Type::Port,
            Self::Request(_) => Type::Request,
            Self::Scratch(_) => Type::Scratch,
            Self::Pool(_) => Type::Pool,
            Self::MountScratch(_) => Type::MountScratch,
            Self::MixedMediaInfo { .. } => Type::MixedMediaInfo,
        }
    }

    /// An empty record list answering a query of `kind`.
    pub fn empty(kind: Type) -> Result<Self, CodecError> {
        let records = match kind {
            Type::Server => Self::Server(Vec::new()),
            Type::Acs => Self::Acs(Vec::new()),
            Type::Lsm => Self::Lsm(Vec::new()),
            Type::Cap => Self::Cap(Vec::new()),
            Type::Clean => Self::Clean(Vec::new()),
            Type::Drive => Self::Drive(Vec::new()),
            Type::Mount => Self::Mount(Vec::new()),
            Type::Volume => Self::Volume(Vec::new()),
            Type::Port => Self::Port(Vec::new()),
            Type::Request => Self::Request(Vec::new()),
            Type::Scratch => Self::Scratch(Vec::new()),
            Type::Pool => Self::Pool(Vec::new()),
            Type::MountScratch => Self::MountScratch(Vec::new()),
            Type::MixedMediaInfo => Self::MixedMediaInfo {
                media: Vec::new(),
                drives: Vec::new(),
            },
            other => {
                return Err(CodecError::UnknownCode {
                    field: "query_type",
                    code: i64::from(other.code()),
                })
            }
        };
        Ok(records)
    }

    /// Number of records in the first list.
    pub fn len(&self) -> usize {
        each_record_list!(self, items => items.len())
    }

    /// Type byte and the first count field.
    pub fn fixed_len(&self, _version: Version) -> usize {
        1 + COUNT_LEN
    }

    pub fn encoded_len(&self, version: Version) -> usize {
        let tail = match self {
            Self::MixedMediaInfo { drives, .. } => COUNT_LEN + items_len(drives, version),
            _ => 0,
        };
        self.fixed_len(version) + each_record_list!(self, items => items_len(items, version)) + tail
    }

    pub fn validate(&self, version: Version) -> Result<(), CodecError> {
        let kind = self.kind();
        if !is_query_type_available(kind, version) {
            return Err(CodecError::TypeUnavailable { kind, version });
        }
        each_record_list!(self, items => check_capacity(items, "query_status", version.max_ids()))?;

        let media = version.has_media_types();
        let extended_cap = version.has_cap_numbers();
        let drive_capacity = version.max_drive_status();
        let check_drive_types = |drives: &[DriveStatus]| -> Result<(), CodecError> {
            drives
                .iter()
                .try_for_each(|drive| check_optional("drive_type", &drive.drive_type, media))
        };
        let check_drives = |drives: &[DriveStatus]| -> Result<(), CodecError> {
            check_capacity(drives, "drive_status", drive_capacity)?;
            check_drive_types(drives)
        };
        match self {
            Self::Cap(records) => records.iter().try_for_each(|record| {
                check_optional("cap_priority", &record.priority, extended_cap)?;
                check_optional("cap_mode", &record.mode, extended_cap)
            }),
            Self::Clean(records) => records
                .iter()
                .try_for_each(|record| check_optional("media_type", &record.media_type, media)),
            Self::Drive(records) => check_drive_types(records),
            Self::Mount(records) => records
                .iter()
                .try_for_each(|record| check_drives(&record.drives)),
            Self::Volume(records) => records
                .iter()
                .try_for_each(|record| check_optional("media_type", &record.media_type, media)),
            Self::Scratch(records) => records.iter().try_for_each(|record| {
                check_optional("media_type", &record.media_type, media)?;
                check_pool(record.pool_id, version)
            }),
            Self::Pool(records) => records
                .iter()
                .try_for_each(|record| check_pool(record.pool_id, version)),
            Self::MountScratch(records) => records.iter().try_for_each(|record| {
                check_pool(record.pool_id, version)?;
                check_drives(&record.drives)
            }),
            Self::MixedMediaInfo { drives, .. } => {
                check_capacity(drives, "drive_types", version.max_ids())
            }
            _ => Ok(()),
        }
    }

    pub fn encode(&self, version: Version, writer: &mut PacketWriter) {
        writer.put_u8(self.kind().code());
        each_record_list!(self, items => put_list(items, version, writer));
        if let Self::MixedMediaInfo { drives, .. } = self {
            put_list(drives, version, writer);
        }
    }

    pub fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let kind = decode_type(reader.get_u8()?, "query_type")?;
        if !is_query_type_available(kind, version) {
            return Err(CodecError::TypeUnavailable { kind, version });
        }
        let count = usize::from(reader.get_u16()?);
        let capacity = version.max_ids();
        let field = "query_status";
        let records = match kind {
            Type::Server => Self::Server(get_items(version, reader, field, count, capacity)?),
            Type::Acs => Self::Acs(get_items(version, reader, field, count, capacity)?),
            Type::Lsm => Self::Lsm(get_items(version, reader, field, count, capacity)?),
            Type::Cap => Self::Cap(get_items(version, reader, field, count, capacity)?),
            Type::Clean => Self::Clean(get_items(version, reader, field, count, capacity)?),
            Type::Drive => Self::Drive(get_items(version, reader, field, count, capacity)?),
            Type::Mount => Self::Mount(get_items(version, reader, field, count, capacity)?),
            Type::Volume => Self::Volume(get_items(version, reader, field, count, capacity)?),
            Type::Port => Self::Port(get_items(version, reader, field, count, capacity)?),
            Type::Request => Self::Request(get_items(version, reader, field, count, capacity)?),
            Type::Scratch => Self::Scratch(get_items(version, reader, field, count, capacity)?),
            Type::Pool => Self::Pool(get_items(version, reader, field, count, capacity)?),
            Type::MountScratch => {
                Self::MountScratch(get_items(version, reader, field, count, capacity)?)
            }
            _ => Self::MixedMediaInfo {
                media: get_items(version, reader, "media_types", count, capacity)?,
                drives: get_list(version, reader, "drive_types", capacity)?,
            },
        };
        Ok(records)
    }

    /// Truncates records to `max_records` and nested drive lists to
    /// `max_drives`. Returns the dropped counts as (field, from, to).
    pub fn truncate(
        &mut self,
        max_records: usize,
        max_drives: usize,
    ) -> Vec<(&'static str, usize, usize)> {
        let mut dropped = Vec::new();
        let before = self.len();
        each_record_list!(&mut *self, items => items.truncate(max_records));
        if before > max_records {
            dropped.push(("query_status", before, max_records));
        }
        let mut clamp_drives = |drives: &mut Vec<DriveStatus>| {
            if drives.len() > max_drives {
                dropped.push(("drive_status", drives.len(), max_drives));
                drives.truncate(max_drives);
            }
        };
        match self {
            Self::Mount(records) => records.iter_mut().for_each(|r| clamp_drives(&mut r.drives)),
            Self::MountScratch(records) => {
                records.iter_mut().for_each(|r| clamp_drives(&mut r.drives))
            }
            _ => {}
        }
        dropped
    }
}

pub(crate) fn check_pool(pool_id: PoolId, version: Version) -> Result<(), CodecError> {
    if pool_id.fits(version) {
        Ok(())
    } else {
        Err(CodecError::InvalidField {
            field: "pool_id",
            reason: format!("{} does not fit the {version} encoding", pool_id.0),
        })
    }
}

impl Walk for CapStatus {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.cap_id.walk(visitor);
        visitor.visit_status(&mut self.status, Some(self.cap_id.lsm_id));
        visitor.visit_cap_extras(&mut self.priority, &mut self.mode);
        if let Some(priority) = self.priority.as_mut() {
            visitor.visit_priority(priority);
        }
    }
}

impl Walk for DriveStatus {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.drive_id.walk(visitor);
        visitor.visit_drive_type(&mut self.drive_type);
        visitor.visit_status(&mut self.status, Some(self.drive_id.panel_id.lsm_id));
    }
}

impl Walk for QueryCriteria {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        match self {
            Self::Server | Self::MixedMediaInfo => {}
            Self::Acs(ids) => ids.walk(visitor),
            Self::Lsm(ids) => ids.walk(visitor),
            Self::Cap(ids) => ids.walk(visitor),
            Self::Drive(ids) => ids.walk(visitor),
            Self::Port(ids) => ids.walk(visitor),
            Self::Clean(_) | Self::Mount(_) | Self::Volume(_) | Self::Request(_) => {}
            Self::Scratch(pools) | Self::Pool(pools) => pools.walk(visitor),
            Self::MountScratch { media_type, pools } => {
                visitor.visit_media_type(media_type);
                pools.walk(visitor);
            }
        }
    }
}

impl Walk for QueryStatus {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        match self {
            Self::Server(_) | Self::MixedMediaInfo { .. } => {}
            Self::Request(records) => {
                for record in records {
                    visitor.visit_status(&mut record.status, None);
                }
            }
            Self::Acs(records) => {
                for record in records {
                    visitor.visit_acs(&mut record.acs);
                    visitor.visit_status(&mut record.status, None);
                }
            }
            Self::Lsm(records) => {
                for record in records {
                    record.lsm_id.walk(visitor);
                    visitor.visit_status(&mut record.status, Some(record.lsm_id));
                }
            }
            Self::Cap(records) => records.walk(visitor),
            Self::Clean(records) => {
                for record in records {
                    visitor.visit_media_type(&mut record.media_type);
                    record.home_location.walk(visitor);
                    visitor.visit_status(&mut record.status, None);
                }
            }
            Self::Drive(records) => records.walk(visitor),
            Self::Mount(records) => {
                for record in records {
                    visitor.visit_status(&mut record.status, None);
                    record.drives.walk(visitor);
                }
            }
            Self::Volume(records) => {
                for record in records {
                    visitor.visit_media_type(&mut record.media_type);
                    match &mut record.location {
                        VolumeLocation::Cell(cell) => cell.walk(visitor),
                        VolumeLocation::Drive(drive) => drive.walk(visitor),
                    }
                    visitor.visit_status(&mut record.status, None);
                }
            }
            Self::Port(records) => {
                for record in records {
                    record.port_id.walk(visitor);
                    visitor.visit_status(&mut record.status, None);
                }
            }
            Self::Scratch(records) => {
                for record in records {
                    visitor.visit_media_type(&mut record.media_type);
                    record.home_location.walk(visitor);
                    record.pool_id.walk(visitor);
                    visitor.visit_status(&mut record.status, None);
                }
            }
            Self::Pool(records) => {
                for record in records {
                    record.pool_id.walk(visitor);
                    visitor.visit_status(&mut record.status, None);
                }
            }
            Self::MountScratch(records) => {
                for record in records {
                    record.pool_id.walk(visitor);
                    visitor.visit_status(&mut record.status, None);
                    record.drives.walk(visitor);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CapStatus, DriveStatus, MountScratchStatus, QueryCriteria, QueryStatus, VolumeLocation,
        VolumeStatus,
    };
    use crate::wire::codec::buffer::{PacketReader, PacketWriter, WireFormat};
    use crate::wire::codec::CodecError;
    use crate::wire::ident::{CapId, DriveId, PoolId, VolId};
    use crate::wire::status::Status;
    use crate::wire::types::{CapMode, State, Type, Version};

    fn drive(n: i8) -> DriveStatus {
        DriveStatus {
            drive_id: DriveId::new(0, 0, 1, n),
            vol_id: VolId::default(),
            drive_type: None,
            state: State::Online,
            status: Status::DRIVE_AVAILABLE,
        }
    }

    #[test]
    fn cap_record_grows_priority_and_mode_at_version_two() {
        let mut record = CapStatus {
            cap_id: CapId::new(0, 1, 0),
            status: Status::SUCCESS,
            priority: None,
            cap_size: 40,
            state: State::Online,
            mode: None,
        };
        assert_eq!(record.encoded_len(Version::V1), 8);
        record.priority = Some(5);
        record.mode = Some(CapMode::Automatic);
        assert_eq!(record.encoded_len(Version::V2), 10);

        let mut writer = PacketWriter::default();
        record.encode(Version::V2, &mut writer);
        let bytes = writer.into_bytes();
        let decoded =
            CapStatus::decode(Version::V2, &mut PacketReader::new(&bytes)).expect("record decodes");
        assert_eq!(decoded, record);
    }

    #[test]
    fn volume_location_slot_is_padded_for_drives() {
        let record = VolumeStatus {
            vol_id: VolId::parse("T00042").expect("valid label"),
            media_type: None,
            location: VolumeLocation::Drive(DriveId::new(0, 1, 2, 3)),
            status: Status::VOLUME_IN_DRIVE,
        };
        let mut writer = PacketWriter::default();
        record.encode(Version::V3, &mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), record.encoded_len(Version::V3));
        let decoded = VolumeStatus::decode(Version::V3, &mut PacketReader::new(&bytes))
            .expect("record decodes");
        assert_eq!(decoded.location, record.location);
    }

    #[test]
    fn criteria_types_follow_their_first_version() {
        let pools = QueryCriteria::Pool(vec![PoolId(3)]);
        assert!(pools.validate(Version::V1).is_ok());
        let err = pools.validate(Version::V0).expect_err("POOL query is v1+");
        assert!(matches!(
            err,
            CodecError::TypeUnavailable {
                kind: Type::Pool,
                version: Version::V0
            }
        ));
        assert!(QueryCriteria::MixedMediaInfo.validate(Version::V3).is_err());
    }

    #[test]
    fn mount_scratch_media_type_is_v4_only() {
        let criteria = QueryCriteria::MountScratch {
            media_type: Some(2),
            pools: vec![PoolId(1)],
        };
        assert_eq!(criteria.fixed_len(Version::V4), 4);
        assert!(criteria.validate(Version::V4).is_ok());
        assert!(criteria.validate(Version::V3).is_err());
    }

    #[test]
    fn truncation_clamps_nested_drive_lists() {
        let mut records = QueryStatus::MountScratch(vec![MountScratchStatus {
            pool_id: PoolId(1),
            status: Status::SUCCESS,
            drives: (0..200).map(|n| drive((n % 100) as i8)).collect(),
        }]);
        let dropped = records.truncate(42, 128);
        assert_eq!(dropped, vec![("drive_status", 200, 128)]);
        let QueryStatus::MountScratch(records) = records else {
            panic!("variant preserved");
        };
        assert_eq!(records[0].drives.len(), 128);
    }

    #[test]
    fn decode_rejects_drive_lists_over_capacity() {
        let records = QueryStatus::MountScratch(vec![MountScratchStatus {
            pool_id: PoolId(1),
            status: Status::SUCCESS,
            drives: (0..130).map(|n| drive((n % 100) as i8)).collect(),
        }]);
        let mut writer = PacketWriter::default();
        records.encode(Version::V1, &mut writer);
        let bytes = writer.into_bytes();
        let err = QueryStatus::decode(Version::V1, &mut PacketReader::new(&bytes))
            .expect_err("130 drive statuses exceed the v1 capacity");
        assert!(matches!(
            err,
            CodecError::CountExceedsCapacity {
                field: "drive_status",
                count: 130,
                capacity: 128
            }
        ));
    }
}
