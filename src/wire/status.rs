use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wire::types::Version;

/// Status code carried on the wire. Codes unknown to this build are kept
/// as-is so they can still be relayed and mapped.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Status(pub u16);

#[allow(dead_code)]
impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const ACS_FULL: Status = Status(1);
    pub const ACS_NOT_IN_LIBRARY: Status = Status(2);
    pub const ACS_OFFLINE: Status = Status(3);
    pub const ACSLM_IDLE: Status = Status(4);
    pub const ACTIVITY_END: Status = Status(5);
    pub const ACTIVITY_START: Status = Status(6);
    pub const AUDIT_ACTIVITY: Status = Status(7);
    pub const AUDIT_IN_PROGRESS: Status = Status(8);
    pub const CANCELLED: Status = Status(9);
    pub const CAP_AVAILABLE: Status = Status(10);
    pub const CAP_FULL: Status = Status(11);
    pub const CAP_IN_USE: Status = Status(12);
    pub const CELL_EMPTY: Status = Status(13);
    pub const CELL_FULL: Status = Status(14);
    pub const CELL_INACCESSIBLE: Status = Status(15);
    pub const CELL_RESERVED: Status = Status(16);
    pub const CLEAN_DRIVE: Status = Status(17);
    pub const COMMUNICATION_FAILED: Status = Status(18);
    pub const CONFIGURATION_ERROR: Status = Status(19);
    pub const COUNT_TOO_SMALL: Status = Status(20);
    pub const COUNT_TOO_LARGE: Status = Status(21);
    pub const CURRENT: Status = Status(22);
    pub const DATABASE_ERROR: Status = Status(23);
    pub const DEGRADED_MODE: Status = Status(24);
    pub const DONE: Status = Status(25);
    pub const DOOR_CLOSED: Status = Status(26);
    pub const DOOR_OPENED: Status = Status(27);
    pub const DRIVE_AVAILABLE: Status = Status(28);
    pub const DRIVE_IN_USE: Status = Status(29);
    pub const DRIVE_NOT_IN_LIBRARY: Status = Status(30);
    pub const DRIVE_OFFLINE: Status = Status(31);
    pub const DRIVE_RESERVED: Status = Status(32);
    pub const DUPLICATE_LABEL: Status = Status(33);
    pub const EJECT_ACTIVITY: Status = Status(34);
    pub const ENTER_ACTIVITY: Status = Status(35);
    pub const EVENT_LOG_FULL: Status = Status(36);
    pub const IDLE_PENDING: Status = Status(37);
    pub const INPUT_CARTRIDGES: Status = Status(38);
    pub const INVALID_ACS: Status = Status(39);
    pub const INVALID_COLUMN: Status = Status(40);
    pub const INVALID_COMMAND: Status = Status(41);
    pub const INVALID_DRIVE: Status = Status(42);
    pub const INVALID_LSM: Status = Status(43);
    pub const INVALID_MESSAGE: Status = Status(44);
    pub const INVALID_OPTION: Status = Status(45);
    pub const INVALID_PANEL: Status = Status(46);
    pub const INVALID_PORT: Status = Status(47);
    pub const INVALID_ROW: Status = Status(48);
    pub const INVALID_STATE: Status = Status(49);
    pub const INVALID_SUBPANEL: Status = Status(50);
    pub const INVALID_TYPE: Status = Status(51);
    pub const INVALID_VALUE: Status = Status(52);
    pub const INVALID_VOLUME: Status = Status(53);
    pub const IPC_FAILURE: Status = Status(54);
    pub const LIBRARY_BUSY: Status = Status(55);
    pub const LIBRARY_FAILURE: Status = Status(56);
    pub const LIBRARY_NOT_AVAILABLE: Status = Status(57);
    pub const LOCATION_OCCUPIED: Status = Status(58);
    pub const LSM_FULL: Status = Status(59);
    pub const LSM_NOT_IN_LIBRARY: Status = Status(60);
    pub const LSM_OFFLINE: Status = Status(61);
    pub const MESSAGE_NOT_FOUND: Status = Status(62);
    pub const MESSAGE_TOO_LARGE: Status = Status(63);
    pub const MESSAGE_TOO_SMALL: Status = Status(64);
    pub const MISPLACED_TAPE: Status = Status(65);
    pub const MULTI_ACS_AUDIT: Status = Status(66);
    pub const NORMAL: Status = Status(67);
    pub const NONE: Status = Status(68);
    pub const NOT_IN_SAME_ACS: Status = Status(69);
    pub const ONLINE: Status = Status(70);
    pub const OFFLINE: Status = Status(71);
    pub const PENDING: Status = Status(72);
    pub const PORT_NOT_IN_LIBRARY: Status = Status(73);
    pub const PROCESS_FAILURE: Status = Status(74);
    pub const RECOVERY_COMPLETE: Status = Status(75);
    pub const RECOVERY_FAILED: Status = Status(76);
    pub const RECOVERY_INCOMPLETE: Status = Status(77);
    pub const RECOVERY_STARTED: Status = Status(78);
    pub const REMOVE_CARTRIDGES: Status = Status(79);
    pub const RETRY: Status = Status(80);
    pub const STATE_UNCHANGED: Status = Status(81);
    pub const TERMINATED: Status = Status(82);
    pub const VALID: Status = Status(83);
    pub const VALUE_UNCHANGED: Status = Status(84);
    pub const VARY_DISALLOWED: Status = Status(85);
    pub const VOLUME_ADDED: Status = Status(86);
    pub const VOLUME_EJECTED: Status = Status(87);
    pub const VOLUME_ENTERED: Status = Status(88);
    pub const VOLUME_FOUND: Status = Status(89);
    pub const VOLUME_HOME: Status = Status(90);
    pub const VOLUME_IN_DRIVE: Status = Status(91);
    pub const VOLUME_IN_TRANSIT: Status = Status(92);
    pub const VOLUME_NOT_IN_DRIVE: Status = Status(93);
    pub const VOLUME_NOT_IN_LIBRARY: Status = Status(94);
    pub const UNREADABLE_LABEL: Status = Status(95);
    pub const UNSUPPORTED_OPTION: Status = Status(96);
    pub const UNSUPPORTED_STATE: Status = Status(97);
    pub const UNSUPPORTED_TYPE: Status = Status(98);
    pub const VOLUME_IN_USE: Status = Status(99);
    pub const PORT_FAILURE: Status = Status(100);
    pub const MAX_PORTS: Status = Status(101);
    pub const PORT_ALREADY_OPEN: Status = Status(102);
    pub const QUEUE_FAILURE: Status = Status(103);
    pub const NI_FAILURE: Status = Status(104);
    pub const NI_TIMEDOUT: Status = Status(105);
    pub const INVALID_COMM_SERVICE: Status = Status(106);
    pub const COMPLETE: Status = Status(107);
    pub const AUDIT_FAILED: Status = Status(108);
    pub const NO_PORTS_ONLINE: Status = Status(109);
    pub const CARTRIDGES_IN_CAP: Status = Status(110);
    pub const TRANSLATION_FAILURE: Status = Status(111);
    pub const DATABASE_DEADLOCK: Status = Status(112);
    pub const DIAGNOSTIC: Status = Status(113);
    pub const DUPLICATE_IDENTIFIER: Status = Status(114);
    pub const EVENT_LOG_FAILURE: Status = Status(115);
    pub const DISMOUNT_ACTIVITY: Status = Status(116);
    pub const MOUNT_ACTIVITY: Status = Status(117);
    pub const POOL_NOT_FOUND: Status = Status(118);
    pub const POOL_NOT_EMPTY: Status = Status(119);
    pub const INVALID_RANGE: Status = Status(120);
    pub const INVALID_POOL: Status = Status(121);
    pub const POOL_HIGH_WATER: Status = Status(122);
    pub const POOL_LOW_WATER: Status = Status(123);
    pub const INVALID_VERSION: Status = Status(124);
    pub const MISSING_OPTION: Status = Status(125);
    pub const INCORRECT_ATTRIBUTE: Status = Status(126);
    pub const INVALID_LOCKID: Status = Status(127);
    pub const VOLUME_AVAILABLE: Status = Status(128);
    pub const READABLE_LABEL: Status = Status(129);
    pub const NO_CAP_AVAILABLE: Status = Status(130);
    pub const LOCK_FAILED: Status = Status(131);
    pub const DEADLOCK: Status = Status(132);
    pub const LOCKID_NOT_FOUND: Status = Status(133);
    pub const INCORRECT_LOCKID: Status = Status(134);
    pub const SCRATCH_NOT_AVAILABLE: Status = Status(135);
    pub const CLEAN_DRIVE_COMPLETE: Status = Status(136);
    pub const VOLUME_NOT_FOUND: Status = Status(137);
    pub const CAP_DOOR_OPEN: Status = Status(138);
    pub const CAP_INOPERATIVE: Status = Status(139);
    pub const DISK_FULL: Status = Status(140);
    pub const CAP_NOT_IN_LIBRARY: Status = Status(141);
    pub const CAP_OFFLINE: Status = Status(142);
    pub const INVALID_CAP: Status = Status(143);
    pub const INCORRECT_CAP_MODE: Status = Status(144);
    pub const INCORRECT_STATE: Status = Status(145);
    pub const VARY_IN_PROGRESS: Status = Status(146);
    pub const ACS_ONLINE: Status = Status(147);
    pub const AUTOMATIC: Status = Status(148);
    pub const MANUAL: Status = Status(149);
    pub const VOLUME_DELETED: Status = Status(150);
    pub const INSERT_MAGAZINES: Status = Status(151);
    pub const UNSUPPORTED_COMMAND: Status = Status(152);
    pub const COMMAND_ACCESS_DENIED: Status = Status(153);
    pub const VOLUME_ACCESS_DENIED: Status = Status(154);
    pub const OWNER_NOT_FOUND: Status = Status(155);
    pub const INVALID_DRIVE_TYPE: Status = Status(156);
    pub const INVALID_MEDIA_TYPE: Status = Status(157);
    pub const INCOMPATIBLE_MEDIA_TYPE: Status = Status(158);
    pub const DRIVE_FOUND: Status = Status(159);
    pub const CAP_DONE: Status = Status(160);
    pub const INVALID_SUBSYSID: Status = Status(161);
    pub const LSM_OFFLINE_PENDING: Status = Status(162);
    pub const PORT_OFFLINE: Status = Status(163);
    pub const COMMUNICATING: Status = Status(164);
    pub const NOT_COMMUNICATING: Status = Status(165);
    pub const IDLE: Status = Status(166);
    pub const OFFLINE_PENDING: Status = Status(167);
    pub const SWITCHOVER_INITIATED: Status = Status(168);
    pub const SWITCHOVER_RECOVERY_COMPLETE: Status = Status(169);
    pub const LMU_STATUS_CHANGE_NEW_MASTER: Status = Status(170);
    pub const LMU_STATUS_CHANGE_STANDBY_COMM: Status = Status(171);
    pub const LMU_STATUS_CHANGE_STANDBY_NOT_COMM: Status = Status(172);
    pub const STANDBY_LMU_NO_PORTS: Status = Status(173);
    pub const SWITCHOVER_IN_PROGRESS: Status = Status(174);
    pub const NOT_CONFIGD_DUAL: Status = Status(175);
    pub const DISALLOWED_ON_MASTER: Status = Status(176);
    pub const LMU_TO_LMU_LINK_BAD: Status = Status(177);
    pub const TOO_MANY_NAKS: Status = Status(178);
    pub const MASTER_NOT_RESPONDING: Status = Status(179);
    pub const MOVE_ACTIVITY: Status = Status(180);
    pub const VOLUME_MISSING: Status = Status(181);
    pub const VOLUME_BEING_RECOVERED: Status = Status(182);
    pub const INVALID_CLIENT: Status = Status(183);
    pub const VOLUME_REACTIVATED: Status = Status(184);
    pub const VOLUME_ABSENT: Status = Status(185);
    pub const UNIT_ATTENTION: Status = Status(186);
    pub const READY: Status = Status(187);
    pub const NOT_READY: Status = Status(188);
    pub const SERIAL_NUM_CHG: Status = Status(189);
    pub const HARDWARE_ERROR: Status = Status(190);
    pub const MONITOR_COMPLETE: Status = Status(191);
    pub const PTP_NOT_FOUND: Status = Status(192);
    pub const INVALID_EVENT_CLASS: Status = Status(193);
    pub const HAND_NOT_FOUND: Status = Status(194);
    pub const LMU_NOT_FOUND: Status = Status(195);
    pub const OPERATIVE: Status = Status(196);
    pub const INOPERATIVE: Status = Status(197);
    pub const MAINT_REQUIRED: Status = Status(198);
    pub const CAP_DOOR_CLOSED: Status = Status(199);
    pub const LSM_TYPE_CHG: Status = Status(200);
    pub const CONFIGURATION_CHANGED: Status = Status(201);
    pub const DRIVE_TYPE_CHG: Status = Status(202);
    pub const NI_TIMEOUT: Status = Status(203);
    pub const VOLUME_OVER_MAX_CLEAN: Status = Status(204);
    pub const VOLUME_CLEAN_CART_SPENT: Status = Status(205);
    pub const DRIVE_ADDED: Status = Status(206);
    pub const DRIVE_REMOVED: Status = Status(207);
    pub const LMU_TYPE_CHG: Status = Status(208);
    pub const LMU_COMPAT_LVL_CHG: Status = Status(209);
    pub const LMU_NOW_STANDALONE: Status = Status(210);
    pub const LMU_NOW_MASTER: Status = Status(211);
    pub const LMU_NOW_STANDBY: Status = Status(212);
    pub const PANEL_NOT_IN_LIBRARY: Status = Status(213);
    pub const PANEL_NOT_FOUND: Status = Status(214);
    pub const STORAGE_CELL_MAP_CHANGED: Status = Status(215);
    pub const NOT_A_DRIVE_PANEL: Status = Status(216);
    pub const NO_DRIVES_FOUND: Status = Status(217);
    pub const LKEY_INVALID: Status = Status(218);
    pub const LKEY_EXPIRED: Status = Status(219);
    pub const LKEY_DUE_TO_EXPIRE: Status = Status(220);
    pub const LKEY_CAPACITY_EXCEEDED: Status = Status(221);
    pub const MALFORMED_XML: Status = Status(222);
    pub const TAG_NOT_FOUND: Status = Status(223);
    pub const CONTENT_NOT_FOUND: Status = Status(224);
    pub const INVALID_CONTENT: Status = Status(225);
    pub const INCOMPATIBLE_SERVER: Status = Status(226);
    pub const MAX_REQUESTS_EXCEEDED: Status = Status(227);
    pub const SHARED_MEMORY_ERROR: Status = Status(228);
    pub const MGMTCLAS_NOT_FOUND: Status = Status(229);
}

const STATUS_NAMES: [&str; 230] = [
    "SUCCESS",
    "ACS_FULL",
    "ACS_NOT_IN_LIBRARY",
    "ACS_OFFLINE",
    "ACSLM_IDLE",
    "ACTIVITY_END",
    "ACTIVITY_START",
    "AUDIT_ACTIVITY",
    "AUDIT_IN_PROGRESS",
    "CANCELLED",
    "CAP_AVAILABLE",
    "CAP_FULL",
    "CAP_IN_USE",
    "CELL_EMPTY",
    "CELL_FULL",
    "CELL_INACCESSIBLE",
    "CELL_RESERVED",
    "CLEAN_DRIVE",
    "COMMUNICATION_FAILED",
    "CONFIGURATION_ERROR",
    "COUNT_TOO_SMALL",
    "COUNT_TOO_LARGE",
    "CURRENT",
    "DATABASE_ERROR",
    "DEGRADED_MODE",
    "DONE",
    "DOOR_CLOSED",
    "DOOR_OPENED",
    "DRIVE_AVAILABLE",
    "DRIVE_IN_USE",
    "DRIVE_NOT_IN_LIBRARY",
    "DRIVE_OFFLINE",
    "DRIVE_RESERVED",
    "DUPLICATE_LABEL",
    "EJECT_ACTIVITY",
    "ENTER_ACTIVITY",
    "EVENT_LOG_FULL",
    "IDLE_PENDING",
    "INPUT_CARTRIDGES",
    "INVALID_ACS",
    "INVALID_COLUMN",
    "INVALID_COMMAND",
    "INVALID_DRIVE",
    "INVALID_LSM",
    "INVALID_MESSAGE",
    "INVALID_OPTION",
    "INVALID_PANEL",
    "INVALID_PORT",
    "INVALID_ROW",
    "INVALID_STATE",
    "INVALID_SUBPANEL",
    "INVALID_TYPE",
    "INVALID_VALUE",
    "INVALID_VOLUME",
    "IPC_FAILURE",
    "LIBRARY_BUSY",
    "LIBRARY_FAILURE",
    "LIBRARY_NOT_AVAILABLE",
    "LOCATION_OCCUPIED",
    "LSM_FULL",
    "LSM_NOT_IN_LIBRARY",
    "LSM_OFFLINE",
    "MESSAGE_NOT_FOUND",
    "MESSAGE_TOO_LARGE",
    "MESSAGE_TOO_SMALL",
    "MISPLACED_TAPE",
    "MULTI_ACS_AUDIT",
    "NORMAL",
    "NONE",
    "NOT_IN_SAME_ACS",
    "ONLINE",
    "OFFLINE",
    "PENDING",
    "PORT_NOT_IN_LIBRARY",
    "PROCESS_FAILURE",
    "RECOVERY_COMPLETE",
    "RECOVERY_FAILED",
    "RECOVERY_INCOMPLETE",
    "RECOVERY_STARTED",
    "REMOVE_CARTRIDGES",
    "RETRY",
    "STATE_UNCHANGED",
    "TERMINATED",
    "VALID",
    "VALUE_UNCHANGED",
    "VARY_DISALLOWED",
    "VOLUME_ADDED",
    "VOLUME_EJECTED",
    "VOLUME_ENTERED",
    "VOLUME_FOUND",
    "VOLUME_HOME",
    "VOLUME_IN_DRIVE",
    "VOLUME_IN_TRANSIT",
    "VOLUME_NOT_IN_DRIVE",
    "VOLUME_NOT_IN_LIBRARY",
    "UNREADABLE_LABEL",
    "UNSUPPORTED_OPTION",
    "UNSUPPORTED_STATE",
    "UNSUPPORTED_TYPE",
    "VOLUME_IN_USE",
    "PORT_FAILURE",
    "MAX_PORTS",
    "PORT_ALREADY_OPEN",
    "QUEUE_FAILURE",
    "NI_FAILURE",
    "NI_TIMEDOUT",
    "INVALID_COMM_SERVICE",
    "COMPLETE",
    "AUDIT_FAILED",
    "NO_PORTS_ONLINE",
    "CARTRIDGES_IN_CAP",
    "TRANSLATION_FAILURE",
    "DATABASE_DEADLOCK",
    "DIAGNOSTIC",
    "DUPLICATE_IDENTIFIER",
    "EVENT_LOG_FAILURE",
    "DISMOUNT_ACTIVITY",
    "MOUNT_ACTIVITY",
    "POOL_NOT_FOUND",
    "POOL_NOT_EMPTY",
    "INVALID_RANGE",
    "INVALID_POOL",
    "POOL_HIGH_WATER",
    "POOL_LOW_WATER",
    "INVALID_VERSION",
    "MISSING_OPTION",
    "INCORRECT_ATTRIBUTE",
    "INVALID_LOCKID",
    "VOLUME_AVAILABLE",
    "READABLE_LABEL",
    "NO_CAP_AVAILABLE",
    "LOCK_FAILED",
    "DEADLOCK",
    "LOCKID_NOT_FOUND",
    "INCORRECT_LOCKID",
    "SCRATCH_NOT_AVAILABLE",
    "CLEAN_DRIVE_COMPLETE",
    "VOLUME_NOT_FOUND",
    "CAP_DOOR_OPEN",
    "CAP_INOPERATIVE",
    "DISK_FULL",
    "CAP_NOT_IN_LIBRARY",
    "CAP_OFFLINE",
    "INVALID_CAP",
    "INCORRECT_CAP_MODE",
    "INCORRECT_STATE",
    "VARY_IN_PROGRESS",
    "ACS_ONLINE",
    "AUTOMATIC",
    "MANUAL",
    "VOLUME_DELETED",
    "INSERT_MAGAZINES",
    "UNSUPPORTED_COMMAND",
    "COMMAND_ACCESS_DENIED",
    "VOLUME_ACCESS_DENIED",
    "OWNER_NOT_FOUND",
    "INVALID_DRIVE_TYPE",
    "INVALID_MEDIA_TYPE",
    "INCOMPATIBLE_MEDIA_TYPE",
    "DRIVE_FOUND",
    "CAP_DONE",
    "INVALID_SUBSYSID",
    "LSM_OFFLINE_PENDING",
    "PORT_OFFLINE",
    "COMMUNICATING",
    "NOT_COMMUNICATING",
    "IDLE",
    "OFFLINE_PENDING",
    "SWITCHOVER_INITIATED",
    "SWITCHOVER_RECOVERY_COMPLETE",
    "LMU_STATUS_CHANGE_NEW_MASTER",
    "LMU_STATUS_CHANGE_STANDBY_COMM",
    "LMU_STATUS_CHANGE_STANDBY_NOT_COMM",
    "STANDBY_LMU_NO_PORTS",
    "SWITCHOVER_IN_PROGRESS",
    "NOT_CONFIGD_DUAL",
    "DISALLOWED_ON_MASTER",
    "LMU_TO_LMU_LINK_BAD",
    "TOO_MANY_NAKS",
    "MASTER_NOT_RESPONDING",
    "MOVE_ACTIVITY",
    "VOLUME_MISSING",
    "VOLUME_BEING_RECOVERED",
    "INVALID_CLIENT",
    "VOLUME_REACTIVATED",
    "VOLUME_ABSENT",
    "UNIT_ATTENTION",
    "READY",
    "NOT_READY",
    "SERIAL_NUM_CHG",
    "HARDWARE_ERROR",
    "MONITOR_COMPLETE",
    "PTP_NOT_FOUND",
    "INVALID_EVENT_CLASS",
    "HAND_NOT_FOUND",
    "LMU_NOT_FOUND",
    "OPERATIVE",
    "INOPERATIVE",
    "MAINT_REQUIRED",
    "CAP_DOOR_CLOSED",
    "LSM_TYPE_CHG",
    "CONFIGURATION_CHANGED",
    "DRIVE_TYPE_CHG",
    "NI_TIMEOUT",
    "VOLUME_OVER_MAX_CLEAN",
    "VOLUME_CLEAN_CART_SPENT",
    "DRIVE_ADDED",
    "DRIVE_REMOVED",
    "LMU_TYPE_CHG",
    "LMU_COMPAT_LVL_CHG",
    "LMU_NOW_STANDALONE",
    "LMU_NOW_MASTER",
    "LMU_NOW_STANDBY",
    "PANEL_NOT_IN_LIBRARY",
    "PANEL_NOT_FOUND",
    "STORAGE_CELL_MAP_CHANGED",
    "NOT_A_DRIVE_PANEL",
    "NO_DRIVES_FOUND",
    "LKEY_INVALID",
    "LKEY_EXPIRED",
    "LKEY_DUE_TO_EXPIRE",
    "LKEY_CAPACITY_EXCEEDED",
    "MALFORMED_XML",
    "TAG_NOT_FOUND",
    "CONTENT_NOT_FOUND",
    "INVALID_CONTENT",
    "INCOMPATIBLE_SERVER",
    "MAX_REQUESTS_EXCEEDED",
    "SHARED_MEMORY_ERROR",
    "MGMTCLAS_NOT_FOUND",
];

impl Status {
    pub fn code(self) -> u16 {
        self.0
    }

    pub fn name(self) -> Option<&'static str> {
        STATUS_NAMES.get(usize::from(self.0)).copied()
    }

    /// Highest status code each protocol version understands.
    pub fn last_known_in(version: Version) -> Status {
        match version {
            Version::V0 => Self::MOUNT_ACTIVITY,
            Version::V1 => Self::INCORRECT_ATTRIBUTE,
            Version::V2 => Self::UNSUPPORTED_COMMAND,
            Version::V3 => Self::OWNER_NOT_FOUND,
            Version::V4 => Self::MGMTCLAS_NOT_FOUND,
        }
    }

    pub fn is_known_in(self, version: Version) -> bool {
        self <= Self::last_known_in(version)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "STATUS_{name}"),
            None => write!(f, "STATUS_<{}>", self.0),
        }
    }
}
