pub mod buffer;

use std::fmt;

use crate::wire::header::{IpcHeader, MessageHeader};
use crate::wire::packet::{Packet, Request, Response};
use crate::wire::record::ResponseStatus;
use crate::wire::request::RequestBody;
use crate::wire::response::ResponseBody;
use crate::wire::types::{Command, Type, Version};

use buffer::{PacketReader, PacketWriter, WireFormat};

pub const MAX_FRAME_SIZE_BYTES: usize = 1024 * 1024;
pub const FRAME_HEADER_SIZE_BYTES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    PayloadTooLarge {
        size: usize,
        limit: usize,
    },
    FrameTooShort {
        size: usize,
    },
    FrameLengthMismatch {
        declared: usize,
        actual_payload: usize,
    },
    ProtocolZeroLength,
    ProtocolLengthTooLarge {
        length: usize,
        limit: usize,
    },
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    TrailingBytes {
        count: usize,
    },
    ByteCountMismatch {
        declared: usize,
        actual: usize,
    },
    UnknownVersion {
        code: u16,
    },
    UnknownCommand {
        code: u8,
    },
    VersionFlagMismatch {
        version: Version,
    },
    UnknownCode {
        field: &'static str,
        code: i64,
    },
    CountExceedsCapacity {
        field: &'static str,
        count: usize,
        capacity: usize,
    },
    InvalidField {
        field: &'static str,
        reason: String,
    },
    BodyMismatch {
        command: Command,
    },
    CommandUnavailable {
        command: Command,
        version: Version,
    },
    TypeUnavailable {
        kind: Type,
        version: Version,
    },
    OptionMismatch {
        option: &'static str,
        command: Command,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { size, limit } => {
                write!(f, "payload size {size} exceeds limit {limit}")
            }
            Self::FrameTooShort { size } => {
                write!(f, "frame size {size} is smaller than 4-byte header")
            }
            Self::FrameLengthMismatch {
                declared,
                actual_payload,
            } => write!(
                f,
                "frame length mismatch: declared {declared} bytes, actual payload {actual_payload} bytes"
            ),
            Self::ProtocolZeroLength => {
                write!(f, "protocol error: frame length cannot be zero")
            }
            Self::ProtocolLengthTooLarge { length, limit } => write!(
                f,
                "protocol error: frame length {length} exceeds max {limit}"
            ),
            Self::Truncated {
                offset,
                needed,
                remaining,
            } => write!(
                f,
                "packet truncated at offset {offset}: needed {needed} bytes, {remaining} remaining"
            ),
            Self::TrailingBytes { count } => {
                write!(f, "packet has {count} trailing bytes")
            }
            Self::ByteCountMismatch { declared, actual } => write!(
                f,
                "ipc byte count {declared} does not match packet length {actual}"
            ),
            Self::UnknownVersion { code } => write!(f, "unknown protocol version {code}"),
            Self::UnknownCommand { code } => write!(f, "unknown command code {code}"),
            Self::VersionFlagMismatch { version } => write!(
                f,
                "EXTENDED flag disagrees with protocol version {version}"
            ),
            Self::UnknownCode { field, code } => write!(f, "unknown {field} code {code}"),
            Self::CountExceedsCapacity {
                field,
                count,
                capacity,
            } => write!(f, "{field} count {count} exceeds capacity {capacity}"),
            Self::InvalidField { field, reason } => write!(f, "invalid {field}: {reason}"),
            Self::BodyMismatch { command } => {
                write!(f, "packet body does not belong to command {command}")
            }
            Self::CommandUnavailable { command, version } => {
                write!(f, "command {command} does not exist at {version}")
            }
            Self::TypeUnavailable { kind, version } => {
                write!(f, "type {kind} is not valid here at {version}")
            }
            Self::OptionMismatch { option, command } => write!(
                f,
                "option {option} does not match the body of command {command}"
            ),
        }
    }
}

impl std::error::Error for CodecError {}

/// Prefixes a packet with its 4-byte big-endian length.
pub fn encode_frame(payload: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::ProtocolZeroLength);
    }
    if payload.len() > limit {
        return Err(CodecError::PayloadTooLarge {
            size: payload.len(),
            limit,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE_BYTES + payload.len());
    let len = payload.len() as u32;
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Reads the declared payload length from a frame prefix.
pub fn frame_payload_len(
    prefix: [u8; FRAME_HEADER_SIZE_BYTES],
    limit: usize,
) -> Result<usize, CodecError> {
    let declared_len = u32::from_be_bytes(prefix) as usize;
    if declared_len == 0 {
        return Err(CodecError::ProtocolZeroLength);
    }
    if declared_len > limit {
        return Err(CodecError::ProtocolLengthTooLarge {
            length: declared_len,
            limit,
        });
    }
    Ok(declared_len)
}

pub fn decode_frame(frame: &[u8], limit: usize) -> Result<&[u8], CodecError> {
    if frame.len() < FRAME_HEADER_SIZE_BYTES {
        return Err(CodecError::FrameTooShort { size: frame.len() });
    }

    let declared_len = frame_payload_len([frame[0], frame[1], frame[2], frame[3]], limit)?;
    let payload = &frame[FRAME_HEADER_SIZE_BYTES..];
    if payload.len() != declared_len {
        return Err(CodecError::FrameLengthMismatch {
            declared: declared_len,
            actual_payload: payload.len(),
        });
    }

    Ok(payload)
}

pub fn encode_request(request: &Request) -> Result<Vec<u8>, CodecError> {
    encode_packet(&Packet::Request(request.clone()))
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>, CodecError> {
    encode_packet(&Packet::Response(response.clone()))
}

/// Serializes a packet at its own version. The IPC byte count must
/// already match the layout.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    packet.validate()?;
    packet.check_byte_count()?;

    let mut writer = PacketWriter::with_capacity(packet.serialized_len());
    packet.ipc().encode(&mut writer);
    packet.header().encode(&mut writer);
    match packet {
        Packet::Request(request) => request.body.encode(request.header.version, &mut writer),
        Packet::Response(response) => {
            let version = response.header.version;
            response.message_status.encode(version, &mut writer);
            response.body.encode(version, &mut writer);
        }
    }
    Ok(writer.into_bytes())
}

fn check_declared(ipc: &IpcHeader, actual: usize) -> Result<(), CodecError> {
    let declared = ipc.byte_count as usize;
    if declared != actual {
        return Err(CodecError::ByteCountMismatch { declared, actual });
    }
    Ok(())
}

fn check_consumed(reader: &PacketReader<'_>) -> Result<(), CodecError> {
    match reader.remaining() {
        0 => Ok(()),
        count => Err(CodecError::TrailingBytes { count }),
    }
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, CodecError> {
    let mut reader = PacketReader::new(bytes);
    let ipc = IpcHeader::decode(&mut reader)?;
    check_declared(&ipc, bytes.len())?;
    let header = MessageHeader::decode(&mut reader)?;
    let body = RequestBody::decode(&header, &mut reader)?;
    check_consumed(&reader)?;

    let request = Request { ipc, header, body };
    request.validate()?;
    Ok(request)
}

/// Decodes a response. An intermediate response whose buffer ends at an
/// empty list's count field is accepted; its byte count then stops short
/// of the model's serialized length.
pub fn decode_response(bytes: &[u8]) -> Result<Response, CodecError> {
    let mut reader = PacketReader::new(bytes);
    let ipc = IpcHeader::decode(&mut reader)?;
    check_declared(&ipc, bytes.len())?;
    let header = MessageHeader::decode(&mut reader)?;
    let message_status = ResponseStatus::decode(header.version, &mut reader)?;
    let body = ResponseBody::decode(&header, &mut reader)?;
    check_consumed(&reader)?;

    let response = Response {
        ipc,
        header,
        message_status,
        body,
    };
    response.validate()?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::{
        decode_frame, decode_request, decode_response, encode_frame, encode_request,
        encode_response, CodecError, MAX_FRAME_SIZE_BYTES,
    };
    use crate::wire::header::{message_options, MessageHeader};
    use crate::wire::ident::{CapId, DriveId, LsmId, VolId};
    use crate::wire::packet::{Request, Response};
    use crate::wire::record::{AuditScope, IdList, ResponseStatus, StatusList};
    use crate::wire::request::RequestBody;
    use crate::wire::response::ResponseBody;
    use crate::wire::status::Status;
    use crate::wire::types::{Command, Version};

    fn mount(version: Version) -> Request {
        Request::new(
            MessageHeader::new(Command::Mount, version),
            RequestBody::Mount {
                vol_id: VolId::parse("A00001").expect("valid label"),
                drives: vec![DriveId::new(0, 1, 10, 2)],
            },
        )
    }

    #[test]
    fn v0_requests_have_a_short_header() {
        let bytes = encode_request(&mount(Version::V0)).expect("request encodes");
        assert_eq!(bytes.len(), 18 + 4 + 6 + 2 + 4);
        assert_eq!(bytes[18 + 3] & message_options::EXTENDED, 0);

        let decoded = decode_request(&bytes).expect("request decodes");
        assert_eq!(decoded, mount(Version::V0));
    }

    #[test]
    fn extended_requests_carry_their_version() {
        let bytes = encode_request(&mount(Version::V3)).expect("request encodes");
        assert_eq!(bytes.len(), 18 + 12 + 6 + 2 + 4);
        assert_ne!(bytes[18 + 3] & message_options::EXTENDED, 0);
        assert_eq!(&bytes[22..24], &[0, 3]);
        assert_eq!(decode_request(&bytes).expect("request decodes").header.version, Version::V3);
    }

    #[test]
    fn byte_count_must_match_the_buffer() {
        let mut bytes = encode_request(&mount(Version::V2)).expect("request encodes");
        bytes.push(0);
        let err = decode_request(&bytes).expect_err("extra byte rejected");
        assert!(matches!(err, CodecError::ByteCountMismatch { .. }));

        let last = bytes.len() as u32;
        bytes[..4].copy_from_slice(&last.to_be_bytes());
        let err = decode_request(&bytes).expect_err("trailing byte rejected");
        assert!(matches!(err, CodecError::TrailingBytes { count: 1 }));
    }

    #[test]
    fn encode_refuses_stale_byte_count() {
        let mut request = mount(Version::V1);
        request.body = RequestBody::Mount {
            vol_id: VolId::default(),
            drives: Vec::new(),
        };
        let err = encode_request(&request).expect_err("stale count rejected");
        assert!(matches!(err, CodecError::ByteCountMismatch { .. }));
    }

    #[test]
    fn clamped_intermediate_audit_response_decodes() {
        let mut header = MessageHeader::new(Command::Audit, Version::V2);
        header.message_options = message_options::INTERMEDIATE;
        let response = Response::new(
            header,
            ResponseStatus::new(Status::SUCCESS),
            ResponseBody::Audit {
                cap_id: CapId::new(0, 0, 0),
                scope: AuditScope::Listed(StatusList::Lsm(Vec::new())),
            },
        );
        let mut bytes = encode_response(&response).expect("response encodes");
        bytes.truncate(bytes.len() - 2);
        let short = bytes.len() as u32;
        bytes[..4].copy_from_slice(&short.to_be_bytes());

        let decoded = decode_response(&bytes).expect("clamped response decodes");
        assert_eq!(decoded.body, response.body);
        assert_eq!(decoded.ipc.byte_count as usize, response.serialized_len() - 2);
    }

    #[test]
    fn unknown_command_codes_are_rejected() {
        let mut bytes = encode_request(&Request::new(
            MessageHeader::new(Command::Audit, Version::V4),
            RequestBody::Audit {
                cap_id: CapId::new(0, 0, 0),
                scope: AuditScope::Listed(IdList::Lsm(vec![LsmId::new(0, 0)])),
            },
        ))
        .expect("request encodes");
        bytes[18 + 2] = 99;
        let err = decode_request(&bytes).expect_err("unknown command");
        assert!(matches!(err, CodecError::UnknownCommand { code: 99 }));
    }

    #[test]
    fn frames_round_trip_and_reject_bad_lengths() {
        let frame = encode_frame(&[1, 2, 3], MAX_FRAME_SIZE_BYTES).expect("frame encodes");
        assert_eq!(frame, vec![0, 0, 0, 3, 1, 2, 3]);
        assert_eq!(decode_frame(&frame, MAX_FRAME_SIZE_BYTES).expect("frame decodes"), &[1, 2, 3]);

        let err = decode_frame(&[0, 0, 0, 0], MAX_FRAME_SIZE_BYTES).expect_err("zero length");
        assert!(matches!(err, CodecError::ProtocolZeroLength));

        let err = decode_frame(&[0, 0, 0, 9, 1], 8).expect_err("oversized");
        assert!(matches!(err, CodecError::ProtocolLengthTooLarge { length: 9, limit: 8 }));

        let err = encode_frame(&[0; 9], 8).expect_err("payload over limit");
        assert!(matches!(err, CodecError::PayloadTooLarge { .. }));
    }
}
