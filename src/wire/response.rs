use serde::{Deserialize, Serialize};

use crate::wire::codec::buffer::{
    check_capacity, get_items, get_list, items_len, put_list, PacketReader, PacketWriter,
    WireFormat, COUNT_LEN,
};
use crate::wire::codec::CodecError;
use crate::wire::header::MessageHeader;
use crate::wire::ident::{CapId, DriveId, LockId, LsmId, MessageId, PoolId, UserId, VolId};
use crate::wire::query::{check_pool, QueryStatus};
use crate::wire::record::{decode_type, AuditScope, IdStatus, ResponseStatus, StatusList};
use crate::wire::request::vary_kind_allowed;
use crate::wire::types::{CapMode, CapPriority, Command, State, Type, Version};
use crate::wire::visit::{VisitMut, Walk};

/// One QUERY_LOCK answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord<T> {
    pub id: T,
    pub lock_id: LockId,
    /// Seconds the lock has been held.
    pub duration: u32,
    /// Requests waiting on the lock.
    pub pending: u32,
    pub user_id: UserId,
    pub status: ResponseStatus,
}

impl<T: WireFormat> WireFormat for LockRecord<T> {
    fn encoded_len(&self, version: Version) -> usize {
        self.id.encoded_len(version)
            + 2
            + 4
            + 4
            + self.user_id.encoded_len(version)
            + self.status.encoded_len(version)
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.id.encode(version, writer);
        writer.put_i16(self.lock_id);
        writer.put_u32(self.duration);
        writer.put_u32(self.pending);
        self.user_id.encode(version, writer);
        self.status.encode(version, writer);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            id: T::decode(version, reader)?,
            lock_id: reader.get_i16()?,
            duration: reader.get_u32()?,
            pending: reader.get_u32()?,
            user_id: UserId::decode(version, reader)?,
            status: ResponseStatus::decode(version, reader)?,
        })
    }
}

impl<T: Walk> Walk for LockRecord<T> {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        self.id.walk(visitor);
        self.status.walk_for(self.id.status_owner(), visitor);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockRecords {
    Volume(Vec<LockRecord<VolId>>),
    Drive(Vec<LockRecord<DriveId>>),
}

impl LockRecords {
    pub fn kind(&self) -> Type {
        match self {
            Self::Volume(_) => Type::Volume,
            Self::Drive(_) => Type::Drive,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Volume(records) => records.len(),
            Self::Drive(records) => records.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseBody {
    /// Immediate receipt for any command; never carries a variable portion.
    Acknowledge {
        message_id: MessageId,
    },
    /// IDLE and START.
    Empty,
    Audit {
        cap_id: CapId,
        scope: AuditScope<StatusList>,
    },
    Cancel {
        request: MessageId,
    },
    Dismount {
        vol_id: VolId,
        drive_id: DriveId,
    },
    /// EJECT and ENTER.
    EjectEnter {
        cap_id: CapId,
        volumes: Vec<IdStatus<VolId>>,
    },
    /// LOCK, UNLOCK and CLEAR_LOCK.
    Lock {
        statuses: StatusList,
    },
    QueryLock {
        records: LockRecords,
    },
    Mount {
        vol_id: VolId,
        drive_id: DriveId,
    },
    MountScratch {
        pool_id: PoolId,
        drive_id: DriveId,
        vol_id: VolId,
    },
    Query(QueryStatus),
    SetCap {
        priority: CapPriority,
        mode: CapMode,
        caps: Vec<IdStatus<CapId>>,
    },
    SetClean {
        max_use: u16,
        volumes: Vec<IdStatus<VolId>>,
    },
    SetScratch {
        pool_id: PoolId,
        volumes: Vec<IdStatus<VolId>>,
    },
    SetOwner {
        owner: UserId,
        volumes: Vec<IdStatus<VolId>>,
    },
    Vary {
        state: State,
        statuses: StatusList,
    },
    DefinePool {
        low_water_mark: u32,
        high_water_mark: u32,
        attributes: u32,
        pools: Vec<IdStatus<PoolId>>,
    },
    DeletePool {
        pools: Vec<IdStatus<PoolId>>,
    },
}

fn unavailable(kind: Type, version: Version) -> CodecError {
    CodecError::TypeUnavailable { kind, version }
}

fn get_kind(reader: &mut PacketReader<'_>, field: &'static str) -> Result<Type, CodecError> {
    decode_type(reader.get_u8()?, field)
}

fn get_state(reader: &mut PacketReader<'_>) -> Result<State, CodecError> {
    let code = reader.get_u8()?;
    State::from_code(code).ok_or(CodecError::UnknownCode {
        field: "state",
        code: i64::from(code),
    })
}

/// Reads a count, treating an exhausted intermediate response as empty.
fn get_count(reader: &mut PacketReader<'_>, clamp: bool) -> Result<usize, CodecError> {
    if clamp && reader.remaining() == 0 {
        return Ok(0);
    }
    Ok(usize::from(reader.get_u16()?))
}

fn check_pools(pools: &[IdStatus<PoolId>], version: Version) -> Result<(), CodecError> {
    pools
        .iter()
        .try_for_each(|entry| check_pool(entry.id, version))
}

impl ResponseBody {
    pub fn matches(&self, command: Command) -> bool {
        match self {
            Self::Acknowledge { .. } => true,
            Self::Empty => matches!(command, Command::Idle | Command::Start),
            Self::Audit { .. } => command == Command::Audit,
            Self::Cancel { .. } => command == Command::Cancel,
            Self::Dismount { .. } => command == Command::Dismount,
            Self::EjectEnter { .. } => matches!(command, Command::Eject | Command::Enter),
            Self::Lock { .. } => matches!(
                command,
                Command::Lock | Command::Unlock | Command::ClearLock
            ),
            Self::QueryLock { .. } => command == Command::QueryLock,
            Self::Mount { .. } => command == Command::Mount,
            Self::MountScratch { .. } => command == Command::MountScratch,
            Self::Query(_) => command == Command::Query,
            Self::SetCap { .. } => command == Command::SetCap,
            Self::SetClean { .. } => command == Command::SetClean,
            Self::SetScratch { .. } => command == Command::SetScratch,
            Self::SetOwner { .. } => command == Command::SetOwner,
            Self::Vary { .. } => command == Command::Vary,
            Self::DefinePool { .. } => command == Command::DefinePool,
            Self::DeletePool { .. } => command == Command::DeletePool,
        }
    }

    /// An empty final body for `command`, used when a task ends without
    /// any data from the library.
    pub fn empty_for(command: Command) -> Self {
        match command {
            Command::Idle | Command::Start => Self::Empty,
            Command::Audit => Self::Audit {
                cap_id: CapId::default(),
                scope: AuditScope::Server,
            },
            Command::Cancel => Self::Cancel { request: 0 },
            Command::Dismount => Self::Dismount {
                vol_id: VolId::default(),
                drive_id: DriveId::default(),
            },
            Command::Eject | Command::Enter => Self::EjectEnter {
                cap_id: CapId::default(),
                volumes: Vec::new(),
            },
            Command::Lock | Command::Unlock | Command::ClearLock => Self::Lock {
                statuses: StatusList::Volume(Vec::new()),
            },
            Command::QueryLock => Self::QueryLock {
                records: LockRecords::Volume(Vec::new()),
            },
            Command::Mount => Self::Mount {
                vol_id: VolId::default(),
                drive_id: DriveId::default(),
            },
            Command::MountScratch => Self::MountScratch {
                pool_id: PoolId::default(),
                drive_id: DriveId::default(),
                vol_id: VolId::default(),
            },
            Command::Query => Self::Query(QueryStatus::Server(Vec::new())),
            Command::SetCap => Self::SetCap {
                priority: 0,
                mode: CapMode::Same,
                caps: Vec::new(),
            },
            Command::SetClean => Self::SetClean {
                max_use: 0,
                volumes: Vec::new(),
            },
            Command::SetScratch => Self::SetScratch {
                pool_id: PoolId::default(),
                volumes: Vec::new(),
            },
            Command::SetOwner => Self::SetOwner {
                owner: UserId::default(),
                volumes: Vec::new(),
            },
            Command::Vary => Self::Vary {
                state: State::Online,
                statuses: StatusList::Acs(Vec::new()),
            },
            Command::DefinePool => Self::DefinePool {
                low_water_mark: 0,
                high_water_mark: 0,
                attributes: 0,
                pools: Vec::new(),
            },
            Command::DeletePool => Self::DeletePool { pools: Vec::new() },
        }
    }

    /// Bytes up to and including the count of the variable portion, or the
    /// whole body when there is none.
    pub fn fixed_len(&self, version: Version) -> usize {
        match self {
            Self::Acknowledge { .. } => 2,
            Self::Empty => 0,
            Self::Audit { .. } => 3 + 1 + COUNT_LEN,
            Self::Cancel { .. } => 2,
            Self::Dismount { .. } | Self::Mount { .. } => 6 + 4,
            Self::EjectEnter { .. } => 3 + COUNT_LEN,
            Self::Lock { .. } | Self::QueryLock { .. } => 1 + COUNT_LEN,
            Self::MountScratch { pool_id, .. } => pool_id.encoded_len(version) + 4 + 6,
            Self::Query(records) => records.fixed_len(version),
            Self::SetCap { .. } => 1 + 1 + COUNT_LEN,
            Self::SetClean { .. } => 2 + COUNT_LEN,
            Self::SetScratch { pool_id, .. } => pool_id.encoded_len(version) + COUNT_LEN,
            Self::SetOwner { owner, .. } => owner.encoded_len(version) + 1 + COUNT_LEN,
            Self::Vary { .. } => 1 + 1 + COUNT_LEN,
            Self::DefinePool { .. } => 12 + COUNT_LEN,
            Self::DeletePool { .. } => COUNT_LEN,
        }
    }

    pub fn encoded_len(&self, version: Version) -> usize {
        let variable = match self {
            Self::Acknowledge { .. }
            | Self::Empty
            | Self::Cancel { .. }
            | Self::Dismount { .. }
            | Self::Mount { .. }
            | Self::MountScratch { .. } => 0,
            Self::Audit { scope, .. } => match scope {
                AuditScope::Server => 0,
                AuditScope::Listed(statuses) => statuses.items_len(version),
            },
            Self::EjectEnter { volumes, .. }
            | Self::SetClean { volumes, .. }
            | Self::SetScratch { volumes, .. }
            | Self::SetOwner { volumes, .. } => items_len(volumes, version),
            Self::Lock { statuses } | Self::Vary { statuses, .. } => statuses.items_len(version),
            Self::QueryLock { records } => match records {
                LockRecords::Volume(records) => items_len(records, version),
                LockRecords::Drive(records) => items_len(records, version),
            },
            Self::Query(records) => return records.encoded_len(version),
            Self::SetCap { caps, .. } => items_len(caps, version),
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => {
                items_len(pools, version)
            }
        };
        self.fixed_len(version) + variable
    }

    /// Element count of the variable portion.
    pub fn variable_count(&self) -> usize {
        match self {
            Self::Acknowledge { .. }
            | Self::Empty
            | Self::Cancel { .. }
            | Self::Dismount { .. }
            | Self::Mount { .. }
            | Self::MountScratch { .. } => 0,
            Self::Audit { scope, .. } => match scope {
                AuditScope::Server => 0,
                AuditScope::Listed(statuses) => statuses.len(),
            },
            Self::EjectEnter { volumes, .. }
            | Self::SetClean { volumes, .. }
            | Self::SetScratch { volumes, .. }
            | Self::SetOwner { volumes, .. } => volumes.len(),
            Self::Lock { statuses } | Self::Vary { statuses, .. } => statuses.len(),
            Self::QueryLock { records } => records.len(),
            Self::Query(records) => records.len(),
            Self::SetCap { caps, .. } => caps.len(),
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => pools.len(),
        }
    }

    pub fn validate(&self, header: &MessageHeader) -> Result<(), CodecError> {
        let version = header.version;
        let is_ack = matches!(self, Self::Acknowledge { .. });
        if is_ack != header.is_acknowledge() || !self.matches(header.command) {
            return Err(CodecError::BodyMismatch {
                command: header.command,
            });
        }
        let max_ids = version.max_ids();
        match self {
            Self::Acknowledge { .. }
            | Self::Empty
            | Self::Cancel { .. }
            | Self::Dismount { .. }
            | Self::Mount { .. } => Ok(()),
            Self::MountScratch { pool_id, .. } => check_pool(*pool_id, version),
            Self::Audit { scope, .. } => match scope {
                AuditScope::Server => Ok(()),
                AuditScope::Listed(statuses) => match statuses.kind() {
                    Type::Acs | Type::Lsm | Type::Panel | Type::Subpanel => {
                        statuses.check_capacity(max_ids)
                    }
                    other => Err(unavailable(other, version)),
                },
            },
            Self::EjectEnter { volumes, .. }
            | Self::SetClean { volumes, .. }
            | Self::SetOwner { volumes, .. } => check_capacity(volumes, "volumes", max_ids),
            Self::SetScratch { pool_id, volumes } => {
                check_pool(*pool_id, version)?;
                check_capacity(volumes, "volumes", max_ids)
            }
            Self::Lock { statuses } => match statuses.kind() {
                Type::Volume | Type::Drive => statuses.check_capacity(max_ids),
                other => Err(unavailable(other, version)),
            },
            Self::QueryLock { records } => match records {
                LockRecords::Volume(records) => check_capacity(records, "lock_records", max_ids),
                LockRecords::Drive(records) => check_capacity(records, "lock_records", max_ids),
            },
            Self::Query(records) => records.validate(version),
            Self::SetCap { caps, .. } => check_capacity(caps, "caps", max_ids),
            Self::Vary { statuses, .. } => {
                if !vary_kind_allowed(statuses.kind(), version) {
                    return Err(unavailable(statuses.kind(), version));
                }
                statuses.check_capacity(max_ids)
            }
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => {
                check_capacity(pools, "pools", max_ids)?;
                check_pools(pools, version)
            }
        }
    }

    pub fn encode(&self, version: Version, writer: &mut PacketWriter) {
        match self {
            Self::Acknowledge { message_id } => writer.put_u16(*message_id),
            Self::Empty => {}
            Self::Audit { cap_id, scope } => {
                cap_id.encode(version, writer);
                writer.put_u8(scope.kind().code());
                match scope {
                    AuditScope::Server => writer.put_u16(0),
                    AuditScope::Listed(statuses) => statuses.encode(version, writer),
                }
            }
            Self::Cancel { request } => writer.put_u16(*request),
            Self::Dismount { vol_id, drive_id } | Self::Mount { vol_id, drive_id } => {
                vol_id.encode(version, writer);
                drive_id.encode(version, writer);
            }
            Self::EjectEnter { cap_id, volumes } => {
                cap_id.encode(version, writer);
                put_list(volumes, version, writer);
            }
            Self::Lock { statuses } => {
                writer.put_u8(statuses.kind().code());
                statuses.encode(version, writer);
            }
            Self::QueryLock { records } => {
                writer.put_u8(records.kind().code());
                match records {
                    LockRecords::Volume(records) => put_list(records, version, writer),
                    LockRecords::Drive(records) => put_list(records, version, writer),
                }
            }
            Self::MountScratch {
                pool_id,
                drive_id,
                vol_id,
            } => {
                pool_id.encode(version, writer);
                drive_id.encode(version, writer);
                vol_id.encode(version, writer);
            }
            Self::Query(records) => records.encode(version, writer),
            Self::SetCap {
                priority,
                mode,
                caps,
            } => {
                writer.put_i8(*priority);
                writer.put_u8(mode.code());
                put_list(caps, version, writer);
            }
            Self::SetClean { max_use, volumes } => {
                writer.put_u16(*max_use);
                put_list(volumes, version, writer);
            }
            Self::SetScratch { pool_id, volumes } => {
                pool_id.encode(version, writer);
                put_list(volumes, version, writer);
            }
            Self::SetOwner { owner, volumes } => {
                owner.encode(version, writer);
                writer.put_u8(Type::Volume.code());
                put_list(volumes, version, writer);
            }
            Self::Vary { state, statuses } => {
                writer.put_u8(state.code());
                writer.put_u8(statuses.kind().code());
                statuses.encode(version, writer);
            }
            Self::DefinePool {
                low_water_mark,
                high_water_mark,
                attributes,
                pools,
            } => {
                writer.put_u32(*low_water_mark);
                writer.put_u32(*high_water_mark);
                writer.put_u32(*attributes);
                put_list(pools, version, writer);
            }
            Self::DeletePool { pools } => put_list(pools, version, writer),
        }
    }

    pub fn decode(
        header: &MessageHeader,
        reader: &mut PacketReader<'_>,
    ) -> Result<Self, CodecError> {
        let version = header.version;
        let max_ids = version.max_ids();
        if header.is_acknowledge() {
            return Ok(Self::Acknowledge {
                message_id: reader.get_u16()?,
            });
        }
        let clamp = header.is_intermediate();
        let body = match header.command {
            Command::Idle | Command::Start => Self::Empty,
            Command::Audit => {
                let cap_id = CapId::decode(version, reader)?;
                let kind = get_kind(reader, "audit_type")?;
                let count = get_count(reader, clamp)?;
                let scope = if kind == Type::Server {
                    AuditScope::Server
                } else {
                    AuditScope::Listed(StatusList::decode_items(kind, version, reader, count)?)
                };
                Self::Audit { cap_id, scope }
            }
            Command::Cancel => Self::Cancel {
                request: reader.get_u16()?,
            },
            Command::Dismount => Self::Dismount {
                vol_id: VolId::decode(version, reader)?,
                drive_id: DriveId::decode(version, reader)?,
            },
            Command::Eject | Command::Enter => {
                let cap_id = CapId::decode(version, reader)?;
                let count = get_count(reader, clamp)?;
                Self::EjectEnter {
                    cap_id,
                    volumes: get_items(version, reader, "volumes", count, max_ids)?,
                }
            }
            Command::Lock | Command::Unlock | Command::ClearLock => {
                let kind = get_kind(reader, "lock_type")?;
                let count = usize::from(reader.get_u16()?);
                Self::Lock {
                    statuses: StatusList::decode_items(kind, version, reader, count)?,
                }
            }
            Command::QueryLock => {
                let records = match get_kind(reader, "lock_type")? {
                    Type::Volume => {
                        LockRecords::Volume(get_list(version, reader, "lock_records", max_ids)?)
                    }
                    Type::Drive => {
                        LockRecords::Drive(get_list(version, reader, "lock_records", max_ids)?)
                    }
                    other => return Err(unavailable(other, version)),
                };
                Self::QueryLock { records }
            }
            Command::Mount => Self::Mount {
                vol_id: VolId::decode(version, reader)?,
                drive_id: DriveId::decode(version, reader)?,
            },
            Command::MountScratch => Self::MountScratch {
                pool_id: PoolId::decode(version, reader)?,
                drive_id: DriveId::decode(version, reader)?,
                vol_id: VolId::decode(version, reader)?,
            },
            Command::Query => Self::Query(QueryStatus::decode(version, reader)?),
            Command::SetCap => {
                let priority = reader.get_i8()?;
                let code = reader.get_u8()?;
                let mode = CapMode::from_code(code).ok_or(CodecError::UnknownCode {
                    field: "cap_mode",
                    code: i64::from(code),
                })?;
                Self::SetCap {
                    priority,
                    mode,
                    caps: get_list(version, reader, "caps", max_ids)?,
                }
            }
            Command::SetClean => Self::SetClean {
                max_use: reader.get_u16()?,
                volumes: get_list(version, reader, "volumes", max_ids)?,
            },
            Command::SetScratch => Self::SetScratch {
                pool_id: PoolId::decode(version, reader)?,
                volumes: get_list(version, reader, "volumes", max_ids)?,
            },
            Command::SetOwner => {
                let owner = UserId::decode(version, reader)?;
                let kind = get_kind(reader, "owner_type")?;
                if kind != Type::Volume {
                    return Err(unavailable(kind, version));
                }
                Self::SetOwner {
                    owner,
                    volumes: get_list(version, reader, "volumes", max_ids)?,
                }
            }
            Command::Vary => {
                let state = get_state(reader)?;
                let kind = get_kind(reader, "vary_type")?;
                if !vary_kind_allowed(kind, version) {
                    return Err(unavailable(kind, version));
                }
                let count = usize::from(reader.get_u16()?);
                Self::Vary {
                    state,
                    statuses: StatusList::decode_items(kind, version, reader, count)?,
                }
            }
            Command::DefinePool => Self::DefinePool {
                low_water_mark: reader.get_u32()?,
                high_water_mark: reader.get_u32()?,
                attributes: reader.get_u32()?,
                pools: get_list(version, reader, "pools", max_ids)?,
            },
            Command::DeletePool => Self::DeletePool {
                pools: get_list(version, reader, "pools", max_ids)?,
            },
        };
        Ok(body)
    }

    /// Truncates the variable portion to `max_ids` and nested drive lists
    /// to `max_drives`. Returns the dropped counts as (field, from, to).
    pub fn truncate(
        &mut self,
        max_ids: usize,
        max_drives: usize,
    ) -> Vec<(&'static str, usize, usize)> {
        if let Self::Query(records) = self {
            return records.truncate(max_ids, max_drives);
        }
        let before = self.variable_count();
        if before <= max_ids {
            return Vec::new();
        }
        match self {
            Self::Audit { scope, .. } => {
                if let AuditScope::Listed(statuses) = scope {
                    statuses.truncate(max_ids);
                }
            }
            Self::EjectEnter { volumes, .. }
            | Self::SetClean { volumes, .. }
            | Self::SetScratch { volumes, .. }
            | Self::SetOwner { volumes, .. } => volumes.truncate(max_ids),
            Self::Lock { statuses } | Self::Vary { statuses, .. } => {
                statuses.truncate(max_ids);
            }
            Self::QueryLock { records } => match records {
                LockRecords::Volume(records) => records.truncate(max_ids),
                LockRecords::Drive(records) => records.truncate(max_ids),
            },
            Self::SetCap { caps, .. } => caps.truncate(max_ids),
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => {
                pools.truncate(max_ids)
            }
            _ => {}
        }
        vec![("statuses", before, max_ids)]
    }
}

impl Walk for ResponseBody {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        match self {
            Self::Acknowledge { .. } | Self::Empty | Self::Cancel { .. } => {}
            Self::Audit { cap_id, scope } => {
                cap_id.walk(visitor);
                scope.walk(visitor);
            }
            Self::Dismount { drive_id, .. } | Self::Mount { drive_id, .. } => {
                drive_id.walk(visitor)
            }
            Self::EjectEnter { cap_id, volumes } => {
                cap_id.walk(visitor);
                volumes.walk(visitor);
            }
            Self::Lock { statuses } | Self::Vary { statuses, .. } => statuses.walk(visitor),
            Self::QueryLock { records } => match records {
                LockRecords::Volume(records) => records.walk(visitor),
                LockRecords::Drive(records) => records.walk(visitor),
            },
            Self::MountScratch {
                pool_id, drive_id, ..
            } => {
                pool_id.walk(visitor);
                drive_id.walk(visitor);
            }
            Self::Query(records) => records.walk(visitor),
            Self::SetCap { priority, caps, .. } => {
                visitor.visit_priority(priority);
                caps.walk(visitor);
            }
            Self::SetClean { volumes, .. } | Self::SetOwner { volumes, .. } => {
                volumes.walk(visitor)
            }
            Self::SetScratch { pool_id, volumes } => {
                pool_id.walk(visitor);
                volumes.walk(visitor);
            }
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => pools.walk(visitor),
        }
    }
    /// The CAP or drive a response is about owns its message status.
    fn status_owner(&self) -> Option<LsmId> {
        match self {
            Self::Audit { cap_id, .. } | Self::EjectEnter { cap_id, .. } => cap_id.status_owner(),
            Self::Dismount { drive_id, .. }
            | Self::Mount { drive_id, .. }
            | Self::MountScratch { drive_id, .. } => drive_id.status_owner(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LockRecord, LockRecords, ResponseBody};
    use crate::wire::codec::buffer::{PacketReader, PacketWriter};
    use crate::wire::codec::CodecError;
    use crate::wire::header::{message_options, MessageHeader};
    use crate::wire::ident::{CapId, DriveId, UserId, VolId};
    use crate::wire::record::{AuditScope, IdStatus, ResponseStatus, StatusList};
    use crate::wire::status::Status;
    use crate::wire::types::{Command, Type, Version};

    #[test]
    fn acknowledge_is_a_fixed_record_for_any_command() {
        let mut header = MessageHeader::new(Command::Audit, Version::V2);
        header.message_options = message_options::ACKNOWLEDGE;
        let body = ResponseBody::Acknowledge { message_id: 77 };
        body.validate(&header).expect("ack body under ACKNOWLEDGE");
        assert_eq!(body.encoded_len(Version::V2), 2);

        header.message_options = 0;
        let err = body.validate(&header).expect_err("ack body without the bit");
        assert!(matches!(err, CodecError::BodyMismatch { .. }));
    }

    #[test]
    fn intermediate_audit_may_omit_an_empty_count() {
        let mut header = MessageHeader::new(Command::Audit, Version::V3);
        header.message_options = message_options::INTERMEDIATE;
        let bytes = [0u8, 1, 0, Type::Lsm.code()];
        let mut reader = PacketReader::new(&bytes);
        let body = ResponseBody::decode(&header, &mut reader).expect("clamped body decodes");
        assert_eq!(
            body,
            ResponseBody::Audit {
                cap_id: CapId::new(0, 1, 0),
                scope: AuditScope::Listed(StatusList::Lsm(Vec::new())),
            }
        );

        header.message_options = 0;
        let mut reader = PacketReader::new(&bytes);
        assert!(ResponseBody::decode(&header, &mut reader).is_err());
    }

    #[test]
    fn query_lock_records_carry_the_holder() {
        let record = LockRecord {
            id: DriveId::new(0, 0, 1, 2),
            lock_id: 12,
            duration: 30,
            pending: 1,
            user_id: UserId::parse("operator").expect("valid user"),
            status: ResponseStatus::new(Status::SUCCESS),
        };
        let body = ResponseBody::QueryLock {
            records: LockRecords::Drive(vec![record]),
        };
        let header = MessageHeader::new(Command::QueryLock, Version::V2);
        body.validate(&header).expect("valid body");

        let mut writer = PacketWriter::default();
        body.encode(Version::V2, &mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 1 + 2 + 4 + 2 + 4 + 4 + 64 + 11);
        let decoded = ResponseBody::decode(&header, &mut PacketReader::new(&bytes))
            .expect("body decodes");
        assert_eq!(decoded, body);
    }

    #[test]
    fn truncation_rewrites_the_element_count() {
        let mut body = ResponseBody::EjectEnter {
            cap_id: CapId::default(),
            volumes: (0..60)
                .map(|_| IdStatus::new(VolId::default(), ResponseStatus::new(Status::SUCCESS)))
                .collect(),
        };
        assert_eq!(body.truncate(42, 128), vec![("statuses", 60, 42)]);
        assert_eq!(body.variable_count(), 42);
    }

    #[test]
    fn empty_bodies_satisfy_their_command() {
        for command in Command::ALL {
            let body = ResponseBody::empty_for(command);
            assert!(body.matches(command), "{command}");
            body.validate(&MessageHeader::new(command, Version::CANONICAL))
                .expect("empty body is valid");
        }
    }
}
