use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wire::codec::buffer::{PacketReader, PacketWriter, WireFormat};
use crate::wire::codec::CodecError;
use crate::wire::types::{Type, Version};

pub type Acs = i8;
pub type Lsm = i8;
pub type Cap = i8;
pub type Panel = i8;
pub type Drive = i8;
pub type Port = i8;
pub type Row = i8;
pub type Col = i8;
pub type MessageId = u16;
pub type LockId = i16;

pub const MAX_ACS: Acs = 31;
pub const MAX_LSM: Lsm = 126;
pub const MAX_CAP: Cap = 11;
pub const MAX_PANEL: Panel = 60;
pub const MAX_DRIVE: Drive = 31;
pub const MAX_ROW: Row = 51;
pub const MAX_COL: Col = 23;
pub const MAX_LOCK_ID: LockId = 32767;
pub const NO_LOCK_ID: LockId = 0;
pub const MAX_POOL: i32 = 65534;
pub const COMMON_POOL: i32 = 0;

pub const EXTERNAL_LABEL_SIZE: usize = 6;
pub const EXTERNAL_USERID_SIZE: usize = 64;

/// Wildcards as encoded from version 3 on.
pub mod sentinel {
    pub const ANY_ACS: i8 = -1;
    pub const ANY_LSM: i8 = -1;
    pub const ANY_CAP: i8 = -1;
    pub const ALL_CAP: i8 = -2;
    pub const SAME_POOL: i32 = -1;
    pub const SAME_PRIORITY: i8 = -1;
}

/// Wildcards as encoded by versions 0 through 2.
pub mod v2_sentinel {
    pub const ANY_ACS: i8 = 127;
    pub const ANY_LSM: i8 = 16;
    pub const ANY_CAP: i8 = 3;
    pub const ALL_CAP: i8 = 4;
    pub const SAME_POOL: i32 = 65535;
    pub const SAME_PRIORITY: i8 = 17;
}

/// Width of the identifier slot inside a response status.
pub const IDENTIFIER_SLOT_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LsmId {
    pub acs: Acs,
    pub lsm: Lsm,
}

impl LsmId {
    pub fn new(acs: Acs, lsm: Lsm) -> Self {
        Self { acs, lsm }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapId {
    pub lsm_id: LsmId,
    /// Always 0 before version 2.
    pub cap: Cap,
}

impl CapId {
    pub fn new(acs: Acs, lsm: Lsm, cap: Cap) -> Self {
        Self {
            lsm_id: LsmId::new(acs, lsm),
            cap,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelId {
    pub lsm_id: LsmId,
    pub panel: Panel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubpanelId {
    pub panel_id: PanelId,
    pub begin_row: Row,
    pub begin_col: Col,
    pub end_row: Row,
    pub end_col: Col,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriveId {
    pub panel_id: PanelId,
    pub drive: Drive,
}

impl DriveId {
    pub fn new(acs: Acs, lsm: Lsm, panel: Panel, drive: Drive) -> Self {
        Self {
            panel_id: PanelId {
                lsm_id: LsmId::new(acs, lsm),
                panel,
            },
            drive,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    pub panel_id: PanelId,
    pub row: Row,
    pub col: Col,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId {
    pub acs: Acs,
    pub port: Port,
}

/// Six-character external label, space padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolId([u8; EXTERNAL_LABEL_SIZE]);

impl VolId {
    pub fn parse(label: &str) -> Result<Self, CodecError> {
        if label.is_empty() || label.len() > EXTERNAL_LABEL_SIZE || !label.is_ascii() {
            return Err(CodecError::InvalidField {
                field: "vol_id",
                reason: format!("'{label}' is not a 1-6 character ASCII label"),
            });
        }
        let mut bytes = [b' '; EXTERNAL_LABEL_SIZE];
        bytes[..label.len()].copy_from_slice(label.as_bytes());
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; EXTERNAL_LABEL_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; EXTERNAL_LABEL_SIZE] {
        &self.0
    }

    pub fn label(&self) -> String {
        String::from_utf8_lossy(&self.0).trim_end().to_owned()
    }
}

impl Default for VolId {
    fn default() -> Self {
        Self([b' '; EXTERNAL_LABEL_SIZE])
    }
}

impl fmt::Debug for VolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VolId({:?})", self.label())
    }
}

impl fmt::Display for VolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolRange {
    pub start: VolId,
    pub end: VolId,
}

/// Scratch pool number. Encoded as u16 through version 2 and as i32 from
/// version 3, where the sentinel moved to -1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolId(pub i32);

impl PoolId {
    pub fn fits(self, version: Version) -> bool {
        version.has_wide_pool_ids() || (0..=i32::from(u16::MAX)).contains(&self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(#[serde(with = "user_label")] [u8; EXTERNAL_USERID_SIZE]);

impl UserId {
    pub fn parse(label: &str) -> Result<Self, CodecError> {
        if label.len() > EXTERNAL_USERID_SIZE || !label.is_ascii() {
            return Err(CodecError::InvalidField {
                field: "user_id",
                reason: format!("'{label}' exceeds {EXTERNAL_USERID_SIZE} ASCII characters"),
            });
        }
        let mut bytes = [0u8; EXTERNAL_USERID_SIZE];
        bytes[..label.len()].copy_from_slice(label.as_bytes());
        Ok(Self(bytes))
    }

    pub fn label(&self) -> String {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(EXTERNAL_USERID_SIZE);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self([0u8; EXTERNAL_USERID_SIZE])
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({:?})", self.label())
    }
}

mod user_label {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::EXTERNAL_USERID_SIZE;

    pub fn serialize<S: Serializer>(
        bytes: &[u8; EXTERNAL_USERID_SIZE],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; EXTERNAL_USERID_SIZE], D::Error> {
        let raw = Vec::<u8>::deserialize(deserializer)?;
        let mut out = [0u8; EXTERNAL_USERID_SIZE];
        let len = raw.len().min(EXTERNAL_USERID_SIZE);
        out[..len].copy_from_slice(&raw[..len]);
        Ok(out)
    }
}

/// Discriminated identifier as carried by a response status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    #[default]
    None,
    Acs(Acs),
    Lsm(LsmId),
    Cap(CapId),
    Drive(DriveId),
    Port(PortId),
    Volume(VolId),
    Pool(PoolId),
    Request(MessageId),
    Panel(PanelId),
    Subpanel(SubpanelId),
}

impl Identifier {
    pub fn kind(&self) -> Type {
        match self {
            Self::None => Type::None,
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

    /// LSM the identifier sits under, if it is hierarchical.
    pub fn lsm_id(&self) -> Option<LsmId> {
        match self {
            Self::Lsm(id) => Some(*id),
            Self::Cap(id) => Some(id.lsm_id),
            Self::Drive(id) => Some(id.panel_id.lsm_id),
            Self::Panel(id) => Some(id.lsm_id),
            Self::Subpanel(id) => Some(id.panel_id.lsm_id),
            _ => None,
        }
    }

    /// Writes the kind's bytes and pads the slot to its fixed width.
    pub fn encode_slot(&self, version: Version, writer: &mut PacketWriter) {
        let before = writer.len();
        match self {
            Self::None => {}
            Self::Acs(id) => id.encode(version, writer),
            Self::Lsm(id) => id.encode(version, writer),
            Self::Cap(id) => id.encode(version, writer),
            Self::Drive(id) => id.encode(version, writer),
            Self::Port(id) => id.encode(version, writer),
            Self::Volume(id) => id.encode(version, writer),
            Self::Pool(id) => id.encode(version, writer),
            Self::Request(id) => id.encode(version, writer),
            Self::Panel(id) => id.encode(version, writer),
            Self::Subpanel(id) => id.encode(version, writer),
        }
        let used = writer.len() - before;
        writer.put_zeros(IDENTIFIER_SLOT_LEN - used);
    }

    pub fn decode_slot(
        kind: Type,
        version: Version,
        reader: &mut PacketReader<'_>,
    ) -> Result<Self, CodecError> {
        let slot = reader.get_array::<IDENTIFIER_SLOT_LEN>()?;
        let mut inner = PacketReader::new(&slot);
        let identifier = match kind {
            Type::None => Self::None,
            Type::Acs => Self::Acs(Acs::decode(version, &mut inner)?),
            Type::Lsm => Self::Lsm(LsmId::decode(version, &mut inner)?),
            Type::Cap => Self::Cap(CapId::decode(version, &mut inner)?),
            Type::Drive => Self::Drive(DriveId::decode(version, &mut inner)?),
            Type::Port => Self::Port(PortId::decode(version, &mut inner)?),
            Type::Volume => Self::Volume(VolId::decode(version, &mut inner)?),
            Type::Pool => Self::Pool(PoolId::decode(version, &mut inner)?),
            Type::Request => Self::Request(MessageId::decode(version, &mut inner)?),
            Type::Panel => Self::Panel(PanelId::decode(version, &mut inner)?),
            Type::Subpanel => Self::Subpanel(SubpanelId::decode(version, &mut inner)?),
            other => {
                return Err(CodecError::UnknownCode {
                    field: "identifier_type",
                    code: i64::from(other.code()),
                })
            }
        };
        Ok(identifier)
    }
}

impl WireFormat for LsmId {
    fn encoded_len(&self, _version: Version) -> usize {
        2
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_i8(self.acs);
        writer.put_i8(self.lsm);
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            acs: reader.get_i8()?,
            lsm: reader.get_i8()?,
        })
    }
}

impl WireFormat for CapId {
    fn encoded_len(&self, _version: Version) -> usize {
        3
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.lsm_id.encode(version, writer);
        // Reserved byte before version 2.
        writer.put_i8(if version.has_cap_numbers() { self.cap } else { 0 });
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let lsm_id = LsmId::decode(version, reader)?;
        let raw = reader.get_i8()?;
        Ok(Self {
            lsm_id,
            cap: if version.has_cap_numbers() { raw } else { 0 },
        })
    }
}

impl WireFormat for PanelId {
    fn encoded_len(&self, _version: Version) -> usize {
        3
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.lsm_id.encode(version, writer);
        writer.put_i8(self.panel);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            lsm_id: LsmId::decode(version, reader)?,
            panel: reader.get_i8()?,
        })
    }
}

impl WireFormat for SubpanelId {
    fn encoded_len(&self, _version: Version) -> usize {
        7
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.panel_id.encode(version, writer);
        writer.put_i8(self.begin_row);
        writer.put_i8(self.begin_col);
        writer.put_i8(self.end_row);
        writer.put_i8(self.end_col);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            panel_id: PanelId::decode(version, reader)?,
            begin_row: reader.get_i8()?,
            begin_col: reader.get_i8()?,
            end_row: reader.get_i8()?,
            end_col: reader.get_i8()?,
        })
    }
}

impl WireFormat for DriveId {
    fn encoded_len(&self, _version: Version) -> usize {
        4
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.panel_id.encode(version, writer);
        writer.put_i8(self.drive);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            panel_id: PanelId::decode(version, reader)?,
            drive: reader.get_i8()?,
        })
    }
}

impl WireFormat for CellId {
    fn encoded_len(&self, _version: Version) -> usize {
        5
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.panel_id.encode(version, writer);
        writer.put_i8(self.row);
        writer.put_i8(self.col);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            panel_id: PanelId::decode(version, reader)?,
            row: reader.get_i8()?,
            col: reader.get_i8()?,
        })
    }
}

impl WireFormat for PortId {
    fn encoded_len(&self, _version: Version) -> usize {
        2
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_i8(self.acs);
        writer.put_i8(self.port);
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            acs: reader.get_i8()?,
            port: reader.get_i8()?,
        })
    }
}

impl WireFormat for VolId {
    fn encoded_len(&self, _version: Version) -> usize {
        EXTERNAL_LABEL_SIZE
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_bytes(&self.0);
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self(reader.get_array::<EXTERNAL_LABEL_SIZE>()?))
    }
}

impl WireFormat for VolRange {
    fn encoded_len(&self, _version: Version) -> usize {
        2 * EXTERNAL_LABEL_SIZE
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        self.start.encode(version, writer);
        self.end.encode(version, writer);
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            start: VolId::decode(version, reader)?,
            end: VolId::decode(version, reader)?,
        })
    }
}

impl WireFormat for PoolId {
    fn encoded_len(&self, version: Version) -> usize {
        if version.has_wide_pool_ids() {
            4
        } else {
            2
        }
    }

    fn encode(&self, version: Version, writer: &mut PacketWriter) {
        if version.has_wide_pool_ids() {
            writer.put_i32(self.0);
        } else {
            // Range is checked by packet validation before encoding.
            writer.put_u16(self.0 as u16);
        }
    }

    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        if version.has_wide_pool_ids() {
            Ok(Self(reader.get_i32()?))
        } else {
            Ok(Self(i32::from(reader.get_u16()?)))
        }
    }
}

impl WireFormat for UserId {
    fn encoded_len(&self, _version: Version) -> usize {
        EXTERNAL_USERID_SIZE
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_bytes(&self.0);
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self(reader.get_array::<EXTERNAL_USERID_SIZE>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::{CapId, Identifier, LsmId, PoolId, VolId, IDENTIFIER_SLOT_LEN};
    use crate::wire::codec::buffer::{PacketReader, PacketWriter, WireFormat};
    use crate::wire::types::{Type, Version};

    #[test]
    fn vol_id_is_space_padded_and_trimmed_back() {
        let vol = VolId::parse("AB12").expect("label is valid");
        assert_eq!(vol.as_bytes(), b"AB12  ");
        assert_eq!(vol.label(), "AB12");
        assert!(VolId::parse("TOOLONG").is_err());
        assert!(VolId::parse("").is_err());
    }

    #[test]
    fn cap_number_byte_is_reserved_before_version_two() {
        let cap = CapId::new(0, 1, 2);
        let mut writer = PacketWriter::default();
        cap.encode(Version::V1, &mut writer);
        assert_eq!(writer.into_bytes(), vec![0, 1, 0]);

        let mut writer = PacketWriter::default();
        cap.encode(Version::V2, &mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes, vec![0, 1, 2]);

        let decoded = CapId::decode(Version::V1, &mut PacketReader::new(&bytes))
            .expect("three bytes available");
        assert_eq!(decoded.cap, 0);
    }

    #[test]
    fn pool_ids_widen_at_version_three() {
        let pool = PoolId(7);
        assert_eq!(pool.encoded_len(Version::V2), 2);
        assert_eq!(pool.encoded_len(Version::V3), 4);
        assert!(!PoolId(70_000).fits(Version::V2));
        assert!(PoolId(70_000).fits(Version::V3));
        assert!(!PoolId(-1).fits(Version::V2));
    }

    #[test]
    fn identifier_slot_has_fixed_width() {
        for identifier in [
            Identifier::None,
            Identifier::Acs(3),
            Identifier::Lsm(LsmId::new(0, 1)),
            Identifier::Volume(VolId::parse("VOL001").expect("valid label")),
        ] {
            let mut writer = PacketWriter::default();
            identifier.encode_slot(Version::V4, &mut writer);
            let bytes = writer.into_bytes();
            assert_eq!(bytes.len(), IDENTIFIER_SLOT_LEN);

            let decoded = Identifier::decode_slot(
                identifier.kind(),
                Version::V4,
                &mut PacketReader::new(&bytes),
            )
            .expect("slot decodes");
            assert_eq!(decoded, identifier);
        }
    }

    #[test]
    fn identifier_exposes_owning_lsm() {
        let cap = Identifier::Cap(CapId::new(1, 17, 0));
        assert_eq!(cap.lsm_id(), Some(LsmId::new(1, 17)));
        assert_eq!(cap.kind(), Type::Cap);
        assert_eq!(Identifier::Acs(0).lsm_id(), None);
    }
}
