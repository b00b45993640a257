//! Adjacent-version converters and the chain that walks them.
//!
//! Every step works on a clone of its input and returns either a fully
//! valid packet at the neighbouring version or an error; the input is
//! never touched. Multi-version conversions always go one step at a time.

pub mod sentinel;
pub mod span;
pub mod status;
mod v0_v1;
mod v1_v2;
mod v2_v3;
mod v3_v4;

use std::fmt;

use serde::Serialize;

use crate::wire::codec::CodecError;
use crate::wire::header::extended_options;
use crate::wire::ident::NO_LOCK_ID;
use crate::wire::packet::Packet;
use crate::wire::types::{Command, Version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    InvalidCommand {
        command: Command,
        version: Version,
    },
    InvalidType {
        what: &'static str,
        version: Version,
    },
    UnsupportedVersion {
        code: i32,
    },
    UnsupportedOption {
        option: &'static str,
    },
    UnrepresentableValue {
        field: &'static str,
        value: i64,
        version: Version,
    },
    IntegrityViolation {
        declared: usize,
        expected: usize,
    },
    BodyMismatch {
        command: Command,
    },
    /// The converted packet failed a layout check not covered above.
    Malformed(CodecError),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommand { command, version } => {
                write!(f, "invalid command: {command} does not exist at {version}")
            }
            Self::InvalidType { what, version } => {
                write!(f, "invalid type: {what} cannot be expressed at {version}")
            }
            Self::UnsupportedVersion { code } => {
                write!(f, "unsupported protocol version {code}")
            }
            Self::UnsupportedOption { option } => {
                write!(f, "option {option} cannot be carried by the target version")
            }
            Self::UnrepresentableValue {
                field,
                value,
                version,
            } => write!(f, "{field} value {value} cannot be represented at {version}"),
            Self::IntegrityViolation { declared, expected } => write!(
                f,
                "integrity violation: byte count {declared}, packet layout needs {expected}"
            ),
            Self::BodyMismatch { command } => {
                write!(f, "packet body does not belong to command {command}")
            }
            Self::Malformed(source) => write!(f, "malformed packet: {source}"),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(source) => Some(source),
            _ => None,
        }
    }
}

impl From<CodecError> for ConvertError {
    fn from(value: CodecError) -> Self {
        match value {
            CodecError::CommandUnavailable { command, version } => {
                Self::InvalidCommand { command, version }
            }
            CodecError::TypeUnavailable { kind, version } => Self::InvalidType {
                what: kind.as_str(),
                version,
            },
            CodecError::BodyMismatch { command } => Self::BodyMismatch { command },
            CodecError::OptionMismatch { option, .. } => Self::UnsupportedOption { option },
            CodecError::ByteCountMismatch { declared, actual } => Self::IntegrityViolation {
                declared,
                expected: actual,
            },
            other => Self::Malformed(other),
        }
    }
}

/// Non-fatal notes about lossy conversions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    Truncated {
        command: Command,
        field: &'static str,
        from: usize,
        to: usize,
        version: Version,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                command,
                field,
                from,
                to,
                version,
            } => write!(
                f,
                "{command} {field} truncated from {from} to {to} entries at {version}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub packet: Packet,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

type StepFn = fn(&mut Packet) -> Result<(), ConvertError>;

/// Maps a raw version code onto a supported protocol version.
pub fn target_version(code: u16) -> Result<Version, ConvertError> {
    Version::from_code(code).ok_or(ConvertError::UnsupportedVersion {
        code: i32::from(code),
    })
}

/// One step towards the canonical version.
pub fn upgrade(packet: &Packet) -> Result<Converted, ConvertError> {
    let from = packet.version();
    let to = from.next().ok_or(ConvertError::UnsupportedVersion {
        code: i32::from(from.code()) + 1,
    })?;
    let transform: StepFn = match from {
        Version::V0 => v0_v1::upgrade,
        Version::V1 => v1_v2::upgrade,
        Version::V2 => v2_v3::upgrade,
        Version::V3 => v3_v4::upgrade,
        Version::V4 => no_step,
    };
    step(packet, to, Direction::Up, transform)
}

/// One step away from the canonical version.
pub fn downgrade(packet: &Packet) -> Result<Converted, ConvertError> {
    let from = packet.version();
    let to = from
        .previous()
        .ok_or(ConvertError::UnsupportedVersion { code: -1 })?;
    let transform: StepFn = match from {
        Version::V1 => v0_v1::downgrade,
        Version::V2 => v1_v2::downgrade,
        Version::V3 => v2_v3::downgrade,
        Version::V4 => v3_v4::downgrade,
        Version::V0 => no_step,
    };
    step(packet, to, Direction::Down, transform)
}

fn no_step(_packet: &mut Packet) -> Result<(), ConvertError> {
    Ok(())
}

/// Converts `packet` to `target` through every intermediate version.
pub fn convert(packet: &Packet, target: Version) -> Result<Converted, ConvertError> {
    span::verify(packet)?;
    let mut current = Converted {
        packet: packet.clone(),
        diagnostics: Vec::new(),
    };
    while current.packet.version() != target {
        let next = if current.packet.version() < target {
            upgrade(&current.packet)?
        } else {
            downgrade(&current.packet)?
        };
        current.packet = next.packet;
        current.diagnostics.extend(next.diagnostics);
    }
    Ok(current)
}

pub fn to_canonical(packet: &Packet) -> Result<Converted, ConvertError> {
    convert(packet, Version::CANONICAL)
}

fn step(
    src: &Packet,
    to: Version,
    direction: Direction,
    transform: StepFn,
) -> Result<Converted, ConvertError> {
    span::verify(src)?;
    let mut dst = src.clone();

    if dst.is_acknowledge() {
        retarget_header(&mut dst, to, direction)?;
        if direction == Direction::Down {
            status::downgrade_message_status(&mut dst, to);
        }
        dst.validate()?;
        let byte_count = span::recount(src, &dst)?;
        dst.ipc_mut().byte_count = byte_count as u32;
        return Ok(Converted {
            packet: dst,
            diagnostics: Vec::new(),
        });
    }

    let command = src.command();
    if !command.is_available_in(to) {
        return Err(ConvertError::InvalidCommand {
            command,
            version: to,
        });
    }
    retarget_header(&mut dst, to, direction)?;
    transform(&mut dst)?;

    let diagnostics = dst
        .truncate_to(to)
        .into_iter()
        .map(|(field, from, kept)| Diagnostic::Truncated {
            command,
            field,
            from,
            to: kept,
            version: to,
        })
        .collect();

    dst.validate()?;
    let byte_count = span::recount(src, &dst)?;
    dst.ipc_mut().byte_count = byte_count as u32;
    dst.check_byte_count()?;
    Ok(Converted {
        packet: dst,
        diagnostics,
    })
}

fn retarget_header(
    packet: &mut Packet,
    to: Version,
    direction: Direction,
) -> Result<(), ConvertError> {
    let header = packet.header_mut();
    if direction == Direction::Down && !to.has_extended_header() {
        if header.has_extended_option(extended_options::RANGE) {
            return Err(ConvertError::InvalidType { what: "RANGE", version: to });
        }
        if header.has_extended_option(extended_options::VIRTUAL) {
            return Err(ConvertError::InvalidType { what: "VIRTUAL", version: to });
        }
        if header.extended_options != 0 {
            return Err(ConvertError::UnsupportedOption {
                option: extended_option_name(header.extended_options),
            });
        }
    }
    if direction == Direction::Down && !to.has_cap_numbers() {
        header.lock_id = NO_LOCK_ID;
    }
    header.version = to;
    Ok(())
}

fn extended_option_name(bits: u32) -> &'static str {
    if bits & extended_options::WAIT != 0 {
        "WAIT"
    } else if bits & extended_options::RESET != 0 {
        "RESET"
    } else if bits & extended_options::CONTINUOUS != 0 {
        "CONTINUOUS"
    } else {
        "EXTENDED"
    }
}
