use serde::{Deserialize, Serialize};

use crate::wire::codec::buffer::{PacketReader, PacketWriter};
use crate::wire::codec::CodecError;
use crate::wire::ident::{LockId, NO_LOCK_ID};
use crate::wire::types::{Command, Type, Version};

pub const IPC_HEADER_LEN: usize = 18;
pub const MESSAGE_HEADER_V0_LEN: usize = 4;
pub const MESSAGE_HEADER_LEN: usize = 12;

pub mod message_options {
    pub const FORCE: u8 = 0x01;
    pub const INTERMEDIATE: u8 = 0x02;
    pub const ACKNOWLEDGE: u8 = 0x04;
    pub const READONLY: u8 = 0x08;
    pub const BYPASS: u8 = 0x10;
    /// Set on every packet using the version 1 message header.
    pub const EXTENDED: u8 = 0x20;
}

pub mod extended_options {
    pub const WAIT: u32 = 0x01;
    pub const RESET: u32 = 0x02;
    pub const VIRTUAL: u32 = 0x04;
    pub const CONTINUOUS: u32 = 0x08;
    pub const RANGE: u32 = 0x10;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcHeader {
    pub byte_count: u32,
    pub module_type: u8,
    pub options: u8,
    pub seq_num: u32,
    pub return_pid: u32,
    pub ipc_identifier: u32,
}

impl IpcHeader {
    pub fn from_module(module_type: Type, seq_num: u32) -> Self {
        Self {
            byte_count: 0,
            module_type: module_type.code(),
            options: 0,
            seq_num,
            return_pid: 0,
            ipc_identifier: 0,
        }
    }

    pub fn encode(&self, writer: &mut PacketWriter) {
        writer.put_u32(self.byte_count);
        writer.put_u8(self.module_type);
        writer.put_u8(self.options);
        writer.put_u32(self.seq_num);
        writer.put_u32(self.return_pid);
        writer.put_u32(self.ipc_identifier);
    }

    pub fn decode(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            byte_count: reader.get_u32()?,
            module_type: reader.get_u8()?,
            options: reader.get_u8()?,
            seq_num: reader.get_u32()?,
            return_pid: reader.get_u32()?,
            ipc_identifier: reader.get_u32()?,
        })
    }
}

/// Message header. The model always holds every field; which ones reach
/// the wire depends on `version`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub packet_id: u16,
    pub command: Command,
    /// Option bits without EXTENDED, which is derived from `version`.
    pub message_options: u8,
    pub version: Version,
    pub extended_options: u32,
    pub lock_id: LockId,
}

impl MessageHeader {
    pub fn new(command: Command, version: Version) -> Self {
        Self {
            packet_id: 0,
            command,
            message_options: 0,
            version,
            extended_options: 0,
            lock_id: NO_LOCK_ID,
        }
    }

    pub fn encoded_len(version: Version) -> usize {
        if version.has_extended_header() {
            MESSAGE_HEADER_LEN
        } else {
            MESSAGE_HEADER_V0_LEN
        }
    }

    pub fn has_option(&self, bit: u8) -> bool {
        self.message_options & bit != 0
    }

    pub fn has_extended_option(&self, bit: u32) -> bool {
        self.extended_options & bit != 0
    }

    pub fn is_acknowledge(&self) -> bool {
        self.has_option(message_options::ACKNOWLEDGE)
    }

    pub fn is_intermediate(&self) -> bool {
        self.has_option(message_options::INTERMEDIATE)
    }

    pub fn is_final(&self) -> bool {
        !self.is_acknowledge() && !self.is_intermediate()
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        if !self.command.is_available_in(self.version) {
            return Err(CodecError::CommandUnavailable {
                command: self.command,
                version: self.version,
            });
        }
        if !self.version.has_extended_header() && self.extended_options != 0 {
            return Err(CodecError::InvalidField {
                field: "extended_options",
                reason: format!("must be zero at {}", self.version),
            });
        }
        if !self.version.has_cap_numbers() && self.lock_id != NO_LOCK_ID {
            return Err(CodecError::InvalidField {
                field: "lock_id",
                reason: format!("must be NO_LOCK_ID at {}", self.version),
            });
        }
        Ok(())
    }

    pub fn encode(&self, writer: &mut PacketWriter) {
        let extended = self.version.has_extended_header();
        let options = if extended {
            self.message_options | message_options::EXTENDED
        } else {
            self.message_options & !message_options::EXTENDED
        };
        writer.put_u16(self.packet_id);
        writer.put_u8(self.command.code());
        writer.put_u8(options);
        if extended {
            writer.put_u16(self.version.code());
            writer.put_u32(self.extended_options);
            writer.put_i16(self.lock_id);
        }
    }

    pub fn decode(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let packet_id = reader.get_u16()?;
        let command_code = reader.get_u8()?;
        let raw_options = reader.get_u8()?;
        let (version, extended_options, lock_id) =
            if raw_options & message_options::EXTENDED == 0 {
                (Version::V0, 0, NO_LOCK_ID)
            } else {
                let code = reader.get_u16()?;
                let version = Version::from_code(code).ok_or(CodecError::UnknownVersion { code })?;
                if !version.has_extended_header() {
                    return Err(CodecError::VersionFlagMismatch { version });
                }
                (version, reader.get_u32()?, reader.get_i16()?)
            };
        let command = Command::from_code(command_code).ok_or(CodecError::UnknownCommand {
            code: command_code,
        })?;

        let header = Self {
            packet_id,
            command,
            message_options: raw_options & !message_options::EXTENDED,
            version,
            extended_options,
            lock_id,
        };
        header.validate()?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::{message_options, MessageHeader, MESSAGE_HEADER_LEN, MESSAGE_HEADER_V0_LEN};
    use crate::wire::codec::buffer::{PacketReader, PacketWriter};
    use crate::wire::codec::CodecError;
    use crate::wire::types::{Command, Version};

    fn encode(header: &MessageHeader) -> Vec<u8> {
        let mut writer = PacketWriter::default();
        header.encode(&mut writer);
        writer.into_bytes()
    }

    #[test]
    fn extended_bit_tracks_the_version() {
        let mut header = MessageHeader::new(Command::Mount, Version::V0);
        header.message_options = message_options::FORCE;
        let bytes = encode(&header);
        assert_eq!(bytes.len(), MESSAGE_HEADER_V0_LEN);
        assert_eq!(bytes[3], message_options::FORCE);

        header.version = Version::V3;
        let bytes = encode(&header);
        assert_eq!(bytes.len(), MESSAGE_HEADER_LEN);
        assert_eq!(bytes[3], message_options::FORCE | message_options::EXTENDED);

        let decoded = MessageHeader::decode(&mut PacketReader::new(&bytes)).expect("valid header");
        assert_eq!(decoded, header);
    }

    #[test]
    fn decode_rejects_version_zero_behind_extended_bit() {
        let bytes = [0, 1, Command::Mount.code(), message_options::EXTENDED, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = MessageHeader::decode(&mut PacketReader::new(&bytes))
            .expect_err("v0 cannot use the extended layout");
        assert!(matches!(err, CodecError::VersionFlagMismatch { version: Version::V0 }));
    }

    #[test]
    fn decode_rejects_commands_newer_than_the_packet() {
        let header = MessageHeader::new(Command::SetOwner, Version::V3);
        let mut bytes = encode(&header);
        bytes[5] = 2;
        let err = MessageHeader::decode(&mut PacketReader::new(&bytes))
            .expect_err("SET_OWNER does not exist at v2");
        assert!(matches!(
            err,
            CodecError::CommandUnavailable {
                command: Command::SetOwner,
                version: Version::V2
            }
        ));
    }

    #[test]
    fn lock_id_is_rejected_before_version_two() {
        let mut header = MessageHeader::new(Command::Mount, Version::V1);
        header.lock_id = 9;
        assert!(matches!(
            header.validate(),
            Err(CodecError::InvalidField { field: "lock_id", .. })
        ));
    }
}
