use serde::{Deserialize, Serialize};

use crate::wire::codec::buffer::{
    check_capacity, get_list, items_len, put_list, PacketReader, PacketWriter, WireFormat,
    COUNT_LEN,
};
use crate::wire::codec::CodecError;
use crate::wire::header::{extended_options, MessageHeader};
use crate::wire::ident::{CapId, DriveId, MessageId, PoolId, UserId, VolId, VolRange};
use crate::wire::query::{
    check_optional, check_pool, get_optional_i8, put_optional_i8, QueryCriteria,
};
use crate::wire::record::{decode_type, put_scope_ids, AuditScope, IdList};
use crate::wire::types::{
    CapMode, CapPriority, Command, MediaType, State, Type, Version, ALL_MEDIA_TYPE,
};
use crate::wire::visit::{VisitMut, Walk};

/// EJECT addressing: single volumes, or ranges when RANGE is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EjectTargets {
    Volumes(Vec<VolId>),
    Ranges(Vec<VolRange>),
}

impl EjectTargets {
    pub fn len(&self) -> usize {
        match self {
            Self::Volumes(items) => items.len(),
            Self::Ranges(items) => items.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestBody {
    Audit {
        cap_id: CapId,
        scope: AuditScope<IdList>,
    },
    Cancel {
        request: MessageId,
    },
    Dismount {
        vol_id: VolId,
        drive_id: DriveId,
    },
    Eject {
        cap_id: CapId,
        targets: EjectTargets,
    },
    Enter {
        cap_id: CapId,
        /// Present when VIRTUAL is set.
        virtual_volumes: Option<Vec<VolId>>,
    },
    Idle,
    Start,
    /// Shared by LOCK, UNLOCK, CLEAR_LOCK and QUERY_LOCK.
    Lock {
        ids: IdList,
    },
    Mount {
        vol_id: VolId,
        drives: Vec<DriveId>,
    },
    MountScratch {
        pool_id: PoolId,
        media_type: Option<MediaType>,
        drives: Vec<DriveId>,
    },
    Query {
        criteria: QueryCriteria,
    },
    SetCap {
        priority: CapPriority,
        mode: CapMode,
        caps: Vec<CapId>,
    },
    SetClean {
        max_use: u16,
        ranges: Vec<VolRange>,
    },
    SetScratch {
        pool_id: PoolId,
        ranges: Vec<VolRange>,
    },
    SetOwner {
        owner: UserId,
        ranges: Vec<VolRange>,
    },
    Vary {
        state: State,
        ids: IdList,
    },
    DefinePool {
        low_water_mark: u32,
        high_water_mark: u32,
        attributes: u32,
        pools: Vec<PoolId>,
    },
    DeletePool {
        pools: Vec<PoolId>,
    },
}

fn audit_kind_allowed(kind: Type) -> bool {
    matches!(kind, Type::Server | Type::Acs | Type::Lsm | Type::Panel | Type::Subpanel)
}

pub fn vary_kind_allowed(kind: Type, version: Version) -> bool {
    match kind {
        Type::Acs | Type::Lsm | Type::Drive | Type::Port => true,
        Type::Cap => version.has_cap_numbers(),
        _ => false,
    }
}

fn lock_kind_allowed(kind: Type) -> bool {
    matches!(kind, Type::Volume | Type::Drive)
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

fn get_cap_mode(reader: &mut PacketReader<'_>) -> Result<CapMode, CodecError> {
    let code = reader.get_u8()?;
    CapMode::from_code(code).ok_or(CodecError::UnknownCode {
        field: "cap_mode",
        code: i64::from(code),
    })
}

fn unavailable(kind: Type, version: Version) -> CodecError {
    CodecError::TypeUnavailable { kind, version }
}

impl RequestBody {
    pub fn matches(&self, command: Command) -> bool {
        match self {
            Self::Audit { .. } => command == Command::Audit,
            Self::Cancel { .. } => command == Command::Cancel,
            Self::Dismount { .. } => command == Command::Dismount,
            Self::Eject { .. } => command == Command::Eject,
            Self::Enter { .. } => command == Command::Enter,
            Self::Idle => command == Command::Idle,
            Self::Start => command == Command::Start,
            Self::Lock { .. } => matches!(
                command,
                Command::Lock | Command::Unlock | Command::ClearLock | Command::QueryLock
            ),
            Self::Mount { .. } => command == Command::Mount,
            Self::MountScratch { .. } => command == Command::MountScratch,
            Self::Query { .. } => command == Command::Query,
            Self::SetCap { .. } => command == Command::SetCap,
            Self::SetClean { .. } => command == Command::SetClean,
            Self::SetScratch { .. } => command == Command::SetScratch,
            Self::SetOwner { .. } => command == Command::SetOwner,
            Self::Vary { .. } => command == Command::Vary,
            Self::DefinePool { .. } => command == Command::DefinePool,
            Self::DeletePool { .. } => command == Command::DeletePool,
        }
    }

    /// Bytes up to and including the count of the variable portion, or the
    /// whole body when there is none.
    pub fn fixed_len(&self, version: Version) -> usize {
        match self {
            Self::Audit { .. } => 3 + 1 + COUNT_LEN,
            Self::Cancel { .. } => 2,
            Self::Dismount { .. } => 6 + 4,
            Self::Eject { .. } => 3 + COUNT_LEN,
            Self::Enter {
                virtual_volumes, ..
            } => 3 + if virtual_volumes.is_some() { COUNT_LEN } else { 0 },
            Self::Idle | Self::Start => 0,
            Self::Lock { .. } => 1 + COUNT_LEN,
            Self::Mount { .. } => 6 + COUNT_LEN,
            Self::MountScratch { pool_id, .. } => {
                pool_id.encoded_len(version) + usize::from(version.has_media_types()) + COUNT_LEN
            }
            Self::Query { criteria } => criteria.fixed_len(version),
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
            Self::Audit { scope, .. } => match scope {
                AuditScope::Server => 0,
                AuditScope::Listed(ids) => ids.items_len(version),
            },
            Self::Eject { targets, .. } => match targets {
                EjectTargets::Volumes(items) => items_len(items, version),
                EjectTargets::Ranges(items) => items_len(items, version),
            },
            Self::Enter {
                virtual_volumes, ..
            } => virtual_volumes
                .as_deref()
                .map_or(0, |items| items_len(items, version)),
            Self::Lock { ids } | Self::Vary { ids, .. } => ids.items_len(version),
            Self::Mount { drives, .. } | Self::MountScratch { drives, .. } => {
                items_len(drives, version)
            }
            Self::Query { criteria } => return criteria.encoded_len(version),
            Self::SetCap { caps, .. } => items_len(caps, version),
            Self::SetClean { ranges, .. }
            | Self::SetScratch { ranges, .. }
            | Self::SetOwner { ranges, .. } => items_len(ranges, version),
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => {
                items_len(pools, version)
            }
            Self::Cancel { .. } | Self::Dismount { .. } | Self::Idle | Self::Start => 0,
        };
        self.fixed_len(version) + variable
    }

    /// Checks that the body fits the header's command, version and
    /// option bits.
    pub fn validate(&self, header: &MessageHeader) -> Result<(), CodecError> {
        let version = header.version;
        if !self.matches(header.command) {
            return Err(CodecError::BodyMismatch {
                command: header.command,
            });
        }
        let max_ids = version.max_ids();
        match self {
            Self::Audit { scope, .. } => {
                let kind = scope.kind();
                if !audit_kind_allowed(kind) {
                    return Err(unavailable(kind, version));
                }
                if let AuditScope::Listed(ids) = scope {
                    ids.check_capacity(max_ids)?;
                }
            }
            Self::Eject { targets, .. } => {
                let ranged = matches!(targets, EjectTargets::Ranges(_));
                if ranged != header.has_extended_option(extended_options::RANGE) {
                    return Err(CodecError::OptionMismatch {
                        option: "RANGE",
                        command: header.command,
                    });
                }
                match targets {
                    EjectTargets::Volumes(items) => check_capacity(items, "volumes", max_ids)?,
                    EjectTargets::Ranges(items) => check_capacity(items, "ranges", max_ids)?,
                }
            }
            Self::Enter {
                virtual_volumes, ..
            } => {
                let flagged = header.has_extended_option(extended_options::VIRTUAL);
                if virtual_volumes.is_some() != flagged {
                    return Err(CodecError::OptionMismatch {
                        option: "VIRTUAL",
                        command: header.command,
                    });
                }
                if let Some(items) = virtual_volumes {
                    check_capacity(items, "volumes", max_ids)?;
                }
            }
            Self::Lock { ids } => {
                if !lock_kind_allowed(ids.kind()) {
                    return Err(unavailable(ids.kind(), version));
                }
                ids.check_capacity(max_ids)?;
            }
            Self::Vary { ids, .. } => {
                if !vary_kind_allowed(ids.kind(), version) {
                    return Err(unavailable(ids.kind(), version));
                }
                ids.check_capacity(max_ids)?;
            }
            Self::Mount { drives, .. } => check_capacity(drives, "drives", max_ids)?,
            Self::MountScratch {
                pool_id,
                media_type,
                drives,
            } => {
                check_pool(*pool_id, version)?;
                check_optional("media_type", media_type, version.has_media_types())?;
                check_capacity(drives, "drives", max_ids)?;
            }
            Self::Query { criteria } => {
                criteria.validate(version)?;
                if let QueryCriteria::Scratch(pools)
                | QueryCriteria::Pool(pools)
                | QueryCriteria::MountScratch { pools, .. } = criteria
                {
                    pools.iter().try_for_each(|pool| check_pool(*pool, version))?;
                }
            }
            Self::SetCap { caps, .. } => check_capacity(caps, "caps", max_ids)?,
            Self::SetClean { ranges, .. } | Self::SetOwner { ranges, .. } => {
                check_capacity(ranges, "ranges", max_ids)?
            }
            Self::SetScratch { pool_id, ranges } => {
                check_pool(*pool_id, version)?;
                check_capacity(ranges, "ranges", max_ids)?;
            }
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => {
                check_capacity(pools, "pools", max_ids)?;
                pools.iter().try_for_each(|pool| check_pool(*pool, version))?;
            }
            Self::Cancel { .. } | Self::Dismount { .. } | Self::Idle | Self::Start => {}
        }
        Ok(())
    }

    pub fn encode(&self, version: Version, writer: &mut PacketWriter) {
        match self {
            Self::Audit { cap_id, scope } => {
                cap_id.encode(version, writer);
                writer.put_u8(scope.kind().code());
                put_scope_ids(scope, version, writer);
            }
            Self::Cancel { request } => writer.put_u16(*request),
            Self::Dismount { vol_id, drive_id } => {
                vol_id.encode(version, writer);
                drive_id.encode(version, writer);
            }
            Self::Eject { cap_id, targets } => {
                cap_id.encode(version, writer);
                match targets {
                    EjectTargets::Volumes(items) => put_list(items, version, writer),
                    EjectTargets::Ranges(items) => put_list(items, version, writer),
                }
            }
            Self::Enter {
                cap_id,
                virtual_volumes,
            } => {
                cap_id.encode(version, writer);
                if let Some(items) = virtual_volumes {
                    put_list(items, version, writer);
                }
            }
            Self::Idle | Self::Start => {}
            Self::Lock { ids } => {
                writer.put_u8(ids.kind().code());
                ids.encode(version, writer);
            }
            Self::Mount { vol_id, drives } => {
                vol_id.encode(version, writer);
                put_list(drives, version, writer);
            }
            Self::MountScratch {
                pool_id,
                media_type,
                drives,
            } => {
                pool_id.encode(version, writer);
                put_optional_i8(*media_type, version.has_media_types(), ALL_MEDIA_TYPE, writer);
                put_list(drives, version, writer);
            }
            Self::Query { criteria } => criteria.encode(version, writer),
            Self::SetCap {
                priority,
                mode,
                caps,
            } => {
                writer.put_i8(*priority);
                writer.put_u8(mode.code());
                put_list(caps, version, writer);
            }
            Self::SetClean { max_use, ranges } => {
                writer.put_u16(*max_use);
                put_list(ranges, version, writer);
            }
            Self::SetScratch { pool_id, ranges } => {
                pool_id.encode(version, writer);
                put_list(ranges, version, writer);
            }
            Self::SetOwner { owner, ranges } => {
                owner.encode(version, writer);
                writer.put_u8(Type::Volume.code());
                put_list(ranges, version, writer);
            }
            Self::Vary { state, ids } => {
                writer.put_u8(state.code());
                writer.put_u8(ids.kind().code());
                ids.encode(version, writer);
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
        let body = match header.command {
            Command::Audit => {
                let cap_id = CapId::decode(version, reader)?;
                let kind = get_kind(reader, "audit_type")?;
                if !audit_kind_allowed(kind) {
                    return Err(unavailable(kind, version));
                }
                let count = usize::from(reader.get_u16()?);
                let scope = if kind == Type::Server {
                    AuditScope::Server
                } else {
                    AuditScope::Listed(IdList::decode_items(kind, version, reader, count)?)
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
            Command::Eject => {
                let cap_id = CapId::decode(version, reader)?;
                let targets = if header.has_extended_option(extended_options::RANGE) {
                    EjectTargets::Ranges(get_list(version, reader, "ranges", max_ids)?)
                } else {
                    EjectTargets::Volumes(get_list(version, reader, "volumes", max_ids)?)
                };
                Self::Eject { cap_id, targets }
            }
            Command::Enter => {
                let cap_id = CapId::decode(version, reader)?;
                let virtual_volumes = if header.has_extended_option(extended_options::VIRTUAL) {
                    Some(get_list(version, reader, "volumes", max_ids)?)
                } else {
                    None
                };
                Self::Enter {
                    cap_id,
                    virtual_volumes,
                }
            }
            Command::Idle => Self::Idle,
            Command::Start => Self::Start,
            Command::Lock | Command::Unlock | Command::ClearLock | Command::QueryLock => {
                let kind = get_kind(reader, "lock_type")?;
                if !lock_kind_allowed(kind) {
                    return Err(unavailable(kind, version));
                }
                let count = usize::from(reader.get_u16()?);
                Self::Lock {
                    ids: IdList::decode_items(kind, version, reader, count)?,
                }
            }
            Command::Mount => Self::Mount {
                vol_id: VolId::decode(version, reader)?,
                drives: get_list(version, reader, "drives", max_ids)?,
            },
            Command::MountScratch => Self::MountScratch {
                pool_id: PoolId::decode(version, reader)?,
                media_type: get_optional_i8(version.has_media_types(), reader)?,
                drives: get_list(version, reader, "drives", max_ids)?,
            },
            Command::Query => Self::Query {
                criteria: QueryCriteria::decode(version, reader)?,
            },
            Command::SetCap => Self::SetCap {
                priority: reader.get_i8()?,
                mode: get_cap_mode(reader)?,
                caps: get_list(version, reader, "caps", max_ids)?,
            },
            Command::SetClean => Self::SetClean {
                max_use: reader.get_u16()?,
                ranges: get_list(version, reader, "ranges", max_ids)?,
            },
            Command::SetScratch => Self::SetScratch {
                pool_id: PoolId::decode(version, reader)?,
                ranges: get_list(version, reader, "ranges", max_ids)?,
            },
            Command::SetOwner => {
                let owner = UserId::decode(version, reader)?;
                let kind = get_kind(reader, "owner_type")?;
                if kind != Type::Volume {
                    return Err(unavailable(kind, version));
                }
                Self::SetOwner {
                    owner,
                    ranges: get_list(version, reader, "ranges", max_ids)?,
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
                    ids: IdList::decode_items(kind, version, reader, count)?,
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

    /// Element count of the variable portion.
    pub fn variable_count(&self) -> usize {
        match self {
            Self::Audit { scope, .. } => match scope {
                AuditScope::Server => 0,
                AuditScope::Listed(ids) => ids.len(),
            },
            Self::Eject { targets, .. } => targets.len(),
            Self::Enter {
                virtual_volumes, ..
            } => virtual_volumes.as_ref().map_or(0, Vec::len),
            Self::Lock { ids } | Self::Vary { ids, .. } => ids.len(),
            Self::Mount { drives, .. } | Self::MountScratch { drives, .. } => drives.len(),
            Self::Query { criteria } => criteria.len(),
            Self::SetCap { caps, .. } => caps.len(),
            Self::SetClean { ranges, .. }
            | Self::SetScratch { ranges, .. }
            | Self::SetOwner { ranges, .. } => ranges.len(),
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => pools.len(),
            Self::Cancel { .. } | Self::Dismount { .. } | Self::Idle | Self::Start => 0,
        }
    }

    /// Keeps at most `max` elements in the variable portion. Returns the
    /// dropped counts as (field, from, to).
    pub fn truncate(&mut self, max: usize) -> Vec<(&'static str, usize, usize)> {
        let before = self.variable_count();
        if before <= max {
            return Vec::new();
        }
        match self {
            Self::Audit { scope, .. } => {
                if let AuditScope::Listed(ids) = scope {
                    ids.truncate(max);
                }
            }
            Self::Eject { targets, .. } => match targets {
                EjectTargets::Volumes(items) => items.truncate(max),
                EjectTargets::Ranges(items) => items.truncate(max),
            },
            Self::Enter {
                virtual_volumes, ..
            } => {
                if let Some(items) = virtual_volumes {
                    items.truncate(max);
                }
            }
            Self::Lock { ids } | Self::Vary { ids, .. } => {
                ids.truncate(max);
            }
            Self::Mount { drives, .. } | Self::MountScratch { drives, .. } => drives.truncate(max),
            Self::Query { criteria } => {
                criteria.truncate(max);
            }
            Self::SetCap { caps, .. } => caps.truncate(max),
            Self::SetClean { ranges, .. }
            | Self::SetScratch { ranges, .. }
            | Self::SetOwner { ranges, .. } => ranges.truncate(max),
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => pools.truncate(max),
            Self::Cancel { .. } | Self::Dismount { .. } | Self::Idle | Self::Start => {}
        }
        vec![("ids", before, max)]
    }
}

impl Walk for RequestBody {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        match self {
            Self::Audit { cap_id, scope } => {
                cap_id.walk(visitor);
                scope.walk(visitor);
            }
            Self::Cancel { .. } | Self::Idle | Self::Start => {}
            Self::Dismount { drive_id, .. } => drive_id.walk(visitor),
            Self::Eject { cap_id, .. } | Self::Enter { cap_id, .. } => cap_id.walk(visitor),
            Self::Lock { ids } | Self::Vary { ids, .. } => ids.walk(visitor),
            Self::Mount { drives, .. } => drives.walk(visitor),
            Self::MountScratch {
                pool_id,
                media_type,
                drives,
            } => {
                pool_id.walk(visitor);
                visitor.visit_media_type(media_type);
                drives.walk(visitor);
            }
            Self::Query { criteria } => criteria.walk(visitor),
            Self::SetCap { priority, caps, .. } => {
                visitor.visit_priority(priority);
                caps.walk(visitor);
            }
            Self::SetClean { .. } | Self::SetOwner { .. } => {}
            Self::SetScratch { pool_id, .. } => pool_id.walk(visitor),
            Self::DefinePool { pools, .. } | Self::DeletePool { pools } => pools.walk(visitor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EjectTargets, RequestBody};
    use crate::wire::codec::buffer::{PacketReader, PacketWriter};
    use crate::wire::codec::CodecError;
    use crate::wire::header::{extended_options, MessageHeader};
    use crate::wire::ident::{CapId, LsmId, PoolId, VolId, VolRange};
    use crate::wire::record::{AuditScope, IdList};
    use crate::wire::types::{Command, State, Type, Version};

    fn round_trip(body: &RequestBody, header: &MessageHeader) -> RequestBody {
        let mut writer = PacketWriter::default();
        body.encode(header.version, &mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), body.encoded_len(header.version));
        let mut reader = PacketReader::new(&bytes);
        let decoded = RequestBody::decode(header, &mut reader).expect("body decodes");
        assert_eq!(reader.remaining(), 0);
        decoded
    }

    #[test]
    fn audit_of_lsms_has_six_fixed_bytes() {
        let body = RequestBody::Audit {
            cap_id: CapId::new(0, 0, 0),
            scope: AuditScope::Listed(IdList::Lsm(vec![
                LsmId::new(0, 0),
                LsmId::new(0, 1),
                LsmId::new(0, 2),
            ])),
        };
        assert_eq!(body.fixed_len(Version::V1), 6);
        assert_eq!(body.encoded_len(Version::V1), 12);
        let header = MessageHeader::new(Command::Audit, Version::V1);
        assert_eq!(round_trip(&body, &header), body);
    }

    #[test]
    fn eject_ranges_require_the_range_option() {
        let start = VolId::parse("A00000").expect("valid label");
        let end = VolId::parse("A00099").expect("valid label");
        let body = RequestBody::Eject {
            cap_id: CapId::new(0, 0, 0),
            targets: EjectTargets::Ranges(vec![VolRange { start, end }]),
        };
        let mut header = MessageHeader::new(Command::Eject, Version::V2);
        let err = body.validate(&header).expect_err("RANGE bit missing");
        assert!(matches!(err, CodecError::OptionMismatch { option: "RANGE", .. }));

        header.extended_options = extended_options::RANGE;
        body.validate(&header).expect("RANGE set");
        assert_eq!(round_trip(&body, &header), body);
    }

    #[test]
    fn vary_of_caps_starts_at_version_two() {
        let body = RequestBody::Vary {
            state: State::Offline,
            ids: IdList::Cap(vec![CapId::new(0, 1, 1)]),
        };
        let err = body
            .validate(&MessageHeader::new(Command::Vary, Version::V1))
            .expect_err("CAP vary is v2+");
        assert!(matches!(err, CodecError::TypeUnavailable { kind: Type::Cap, .. }));
        body.validate(&MessageHeader::new(Command::Vary, Version::V2))
            .expect("CAP vary at v2");
    }

    #[test]
    fn pool_ids_must_fit_narrow_encodings() {
        let body = RequestBody::DeletePool {
            pools: vec![PoolId(70_000)],
        };
        assert!(body
            .validate(&MessageHeader::new(Command::DeletePool, Version::V2))
            .is_err());
        body.validate(&MessageHeader::new(Command::DeletePool, Version::V3))
            .expect("wide pools from v3");
    }

    #[test]
    fn body_must_match_command() {
        let err = RequestBody::Idle
            .validate(&MessageHeader::new(Command::Start, Version::V0))
            .expect_err("IDLE body under START");
        assert!(matches!(err, CodecError::BodyMismatch { command: Command::Start }));
    }

    #[test]
    fn truncate_reports_the_dropped_range() {
        let mut body = RequestBody::Mount {
            vol_id: VolId::default(),
            drives: vec![Default::default(); 50],
        };
        assert_eq!(body.truncate(42), vec![("ids", 50, 42)]);
        assert_eq!(body.variable_count(), 42);
        assert!(body.truncate(42).is_empty());
    }
}
