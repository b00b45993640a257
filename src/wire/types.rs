use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Version {
    V0 = 0,
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
}

impl Version {
    /// Newest protocol version; all internal logic is expressed in it.
    pub const CANONICAL: Version = Version::V4;
    pub const ALL: [Version; 5] = [
        Version::V0,
        Version::V1,
        Version::V2,
        Version::V3,
        Version::V4,
    ];

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::V0),
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            4 => Some(Self::V4),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn next(self) -> Option<Self> {
        Self::from_code(self.code() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.code().checked_sub(1).and_then(Self::from_code)
    }

    /// Maximum element count of identifier arrays.
    pub fn max_ids(self) -> usize {
        match self {
            Self::V0 | Self::V1 | Self::V2 => 42,
            Self::V3 | Self::V4 => 64,
        }
    }

    /// Maximum element count of the drive-status arrays nested in
    /// mount and mount-scratch query records.
    pub fn max_drive_status(self) -> usize {
        match self {
            Self::V0 | Self::V1 => 128,
            Self::V2 => 175,
            Self::V3 | Self::V4 => 256,
        }
    }

    /// Wildcards switched to negative encodings at version 3.
    pub fn uses_negative_sentinels(self) -> bool {
        self >= Self::V3
    }

    pub fn has_extended_header(self) -> bool {
        self >= Self::V1
    }

    pub fn has_cap_numbers(self) -> bool {
        self >= Self::V2
    }

    pub fn has_wide_pool_ids(self) -> bool {
        self >= Self::V3
    }

    pub fn has_media_types(self) -> bool {
        self >= Self::V4
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Audit = 1,
    Cancel = 2,
    Dismount = 3,
    Eject = 4,
    Enter = 5,
    Idle = 6,
    Mount = 7,
    Query = 8,
    Start = 10,
    Vary = 11,
    DefinePool = 15,
    DeletePool = 16,
    SetClean = 17,
    SetScratch = 18,
    MountScratch = 19,
    Lock = 21,
    Unlock = 22,
    ClearLock = 23,
    QueryLock = 24,
    SetCap = 25,
    SetOwner = 26,
}

impl Command {
    pub const ALL: [Command; 21] = [
        Command::Audit,
        Command::Cancel,
        Command::Dismount,
        Command::Eject,
        Command::Enter,
        Command::Idle,
        Command::Mount,
        Command::Query,
        Command::Start,
        Command::Vary,
        Command::DefinePool,
        Command::DeletePool,
        Command::SetClean,
        Command::SetScratch,
        Command::MountScratch,
        Command::Lock,
        Command::Unlock,
        Command::ClearLock,
        Command::QueryLock,
        Command::SetCap,
        Command::SetOwner,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.code() == code)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn first_version(self) -> Version {
        match self {
            Self::Audit
            | Self::Cancel
            | Self::Dismount
            | Self::Eject
            | Self::Enter
            | Self::Idle
            | Self::Mount
            | Self::Query
            | Self::Start
            | Self::Vary => Version::V0,
            Self::DefinePool
            | Self::DeletePool
            | Self::SetClean
            | Self::SetScratch
            | Self::MountScratch => Version::V1,
            Self::Lock
            | Self::Unlock
            | Self::ClearLock
            | Self::QueryLock
            | Self::SetCap => Version::V2,
            Self::SetOwner => Version::V3,
        }
    }

    pub fn is_available_in(self, version: Version) -> bool {
        version >= self.first_version()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audit => "AUDIT",
            Self::Cancel => "CANCEL",
            Self::Dismount => "DISMOUNT",
            Self::Eject => "EJECT",
            Self::Enter => "ENTER",
            Self::Idle => "IDLE",
            Self::Mount => "MOUNT",
            Self::Query => "QUERY",
            Self::Start => "START",
            Self::Vary => "VARY",
            Self::DefinePool => "DEFINE_POOL",
            Self::DeletePool => "DELETE_POOL",
            Self::SetClean => "SET_CLEAN",
            Self::SetScratch => "SET_SCRATCH",
            Self::MountScratch => "MOUNT_SCRATCH",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::ClearLock => "CLEAR_LOCK",
            Self::QueryLock => "QUERY_LOCK",
            Self::SetCap => "SET_CAP",
            Self::SetOwner => "SET_OWNER",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TYPE codes. One vocabulary serves identifier kinds, query
/// selectors and sender module types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Acs = 1,
    Cap = 3,
    Cell = 4,
    Csi = 6,
    Drive = 11,
    Lh = 13,
    Lm = 14,
    Lsm = 15,
    Mount = 16,
    None = 17,
    Panel = 18,
    Port = 19,
    Request = 22,
    Server = 23,
    Subpanel = 24,
    Volume = 26,
    Ssi = 28,
    Pool = 30,
    Scratch = 31,
    Clean = 32,
    MountScratch = 33,
    MixedMediaInfo = 34,
}

impl Type {
    const ALL: [Type; 22] = [
        Type::Acs,
        Type::Cap,
        Type::Cell,
        Type::Csi,
        Type::Drive,
        Type::Lh,
        Type::Lm,
        Type::Lsm,
        Type::Mount,
        Type::None,
        Type::Panel,
        Type::Port,
        Type::Request,
        Type::Server,
        Type::Subpanel,
        Type::Volume,
        Type::Ssi,
        Type::Pool,
        Type::Scratch,
        Type::Clean,
        Type::MountScratch,
        Type::MixedMediaInfo,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acs => "ACS",
            Self::Cap => "CAP",
            Self::Cell => "CELL",
            Self::Csi => "CSI",
            Self::Drive => "DRIVE",
            Self::Lh => "LH",
            Self::Lm => "LM",
            Self::Lsm => "LSM",
            Self::Mount => "MOUNT",
            Self::None => "NONE",
            Self::Panel => "PANEL",
            Self::Port => "PORT",
            Self::Request => "REQUEST",
            Self::Server => "SERVER",
            Self::Subpanel => "SUBPANEL",
            Self::Volume => "VOLUME",
            Self::Ssi => "SSI",
            Self::Pool => "POOL",
            Self::Scratch => "SCRATCH",
            Self::Clean => "CLEAN",
            Self::MountScratch => "MOUNT_SCRATCH",
            Self::MixedMediaInfo => "MIXED_MEDIA_INFO",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Cancelled = 1,
    Diagnostic = 2,
    Idle = 3,
    IdlePending = 4,
    Offline = 5,
    OfflinePending = 6,
    Online = 7,
    Recovery = 8,
    Run = 9,
    Connect = 10,
    Disconnect = 11,
}

impl State {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Cancelled),
            2 => Some(Self::Diagnostic),
            3 => Some(Self::Idle),
            4 => Some(Self::IdlePending),
            5 => Some(Self::Offline),
            6 => Some(Self::OfflinePending),
            7 => Some(Self::Online),
            8 => Some(Self::Recovery),
            9 => Some(Self::Run),
            10 => Some(Self::Connect),
            11 => Some(Self::Disconnect),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapMode {
    Automatic = 1,
    Manual = 2,
    Same = 3,
}

impl CapMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Automatic),
            2 => Some(Self::Manual),
            3 => Some(Self::Same),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Cell = 1,
    Drive = 2,
}

impl Location {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Cell),
            2 => Some(Self::Drive),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

pub type CapPriority = i8;
pub type MediaType = i8;
pub type DriveType = i8;
pub type Freecells = i32;

pub const MIN_PRIORITY: CapPriority = 1;
pub const MAX_PRIORITY: CapPriority = 16;
pub const NO_PRIORITY: CapPriority = 0;

pub const ANY_MEDIA_TYPE: MediaType = -1;
pub const ALL_MEDIA_TYPE: MediaType = -2;
pub const UNKNOWN_MEDIA_TYPE: MediaType = -3;

pub const ANY_DRIVE_TYPE: DriveType = -1;
pub const UNKNOWN_DRIVE_TYPE: DriveType = -3;

#[cfg(test)]
mod tests {
    use super::{Command, Type, Version};

    #[test]
    fn version_steps_stay_within_known_range() {
        assert_eq!(Version::V0.previous(), None);
        assert_eq!(Version::V0.next(), Some(Version::V1));
        assert_eq!(Version::V4.next(), None);
        assert_eq!(Version::V3.previous(), Some(Version::V2));
        assert_eq!(Version::from_code(5), None);
    }

    #[test]
    fn command_availability_follows_first_version() {
        assert!(Command::Audit.is_available_in(Version::V0));
        assert!(!Command::MountScratch.is_available_in(Version::V0));
        assert!(!Command::Lock.is_available_in(Version::V1));
        assert!(Command::SetCap.is_available_in(Version::V2));
        assert!(!Command::SetOwner.is_available_in(Version::V2));
        assert!(Command::SetOwner.is_available_in(Version::CANONICAL));
    }

    #[test]
    fn codes_resolve_back_to_variants() {
        for command in Command::ALL {
            assert_eq!(Command::from_code(command.code()), Some(command));
        }
        assert_eq!(Command::from_code(9), None);
        assert_eq!(Type::from_code(15), Some(Type::Lsm));
        assert_eq!(Type::from_code(2), None);
    }

    #[test]
    fn drive_status_capacity_shrinks_towards_older_versions() {
        assert_eq!(Version::V1.max_drive_status(), 128);
        assert_eq!(Version::V2.max_drive_status(), 175);
        assert!(Version::V3.max_drive_status() >= 200);
    }
}
