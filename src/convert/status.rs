//! Many-to-one status mappings applied when a response loses a version.

use crate::wire::ident::{sentinel, v2_sentinel, LsmId};
use crate::wire::packet::Packet;
use crate::wire::status::Status;
use crate::wire::types::Version;
use crate::wire::visit::{VisitMut, Walk};

const V4_TO_V3: &[(Status, Status)] = &[
    (Status::INVALID_MEDIA_TYPE, Status::INVALID_VOLUME),
    (Status::INCOMPATIBLE_MEDIA_TYPE, Status::INVALID_DRIVE),
    (Status::INVALID_DRIVE_TYPE, Status::INVALID_DRIVE),
    (Status::DRIVE_FOUND, Status::SUCCESS),
    (Status::CAP_DONE, Status::SUCCESS),
    (Status::LSM_OFFLINE_PENDING, Status::LSM_OFFLINE),
    (Status::PORT_OFFLINE, Status::OFFLINE),
];

const V3_TO_V2: &[(Status, Status)] = &[
    (Status::VOLUME_ACCESS_DENIED, Status::VOLUME_NOT_IN_LIBRARY),
    (Status::COMMAND_ACCESS_DENIED, Status::INVALID_COMMAND),
    (Status::OWNER_NOT_FOUND, Status::INVALID_VALUE),
];

const V2_TO_V1: &[(Status, Status)] = &[
    (Status::CAP_OFFLINE, Status::CAP_IN_USE),
    (Status::INCORRECT_CAP_MODE, Status::CAP_IN_USE),
    (Status::NO_CAP_AVAILABLE, Status::CAP_IN_USE),
    (Status::CAP_DOOR_OPEN, Status::CAP_IN_USE),
    (Status::CAP_INOPERATIVE, Status::CAP_IN_USE),
    (Status::ACS_ONLINE, Status::VARY_DISALLOWED),
    (Status::INCORRECT_LOCKID, Status::VARY_DISALLOWED),
    (Status::INCORRECT_STATE, Status::VARY_DISALLOWED),
    (Status::VARY_IN_PROGRESS, Status::VARY_DISALLOWED),
    (Status::CAP_NOT_IN_LIBRARY, Status::LSM_NOT_IN_LIBRARY),
    (Status::INVALID_CAP, Status::INVALID_LSM),
    (Status::VOLUME_AVAILABLE, Status::SUCCESS),
    (Status::READABLE_LABEL, Status::SUCCESS),
    (Status::CLEAN_DRIVE_COMPLETE, Status::SUCCESS),
    (Status::VOLUME_NOT_FOUND, Status::VOLUME_NOT_IN_LIBRARY),
    (Status::AUTOMATIC, Status::SUCCESS),
    (Status::MANUAL, Status::SUCCESS),
    (Status::UNSUPPORTED_COMMAND, Status::INVALID_COMMAND),
];

const V1_TO_V0: &[(Status, Status)] = &[
    (Status::POOL_NOT_FOUND, Status::INVALID_VALUE),
    (Status::INVALID_POOL, Status::INVALID_VALUE),
    (Status::POOL_NOT_EMPTY, Status::INVALID_VALUE),
    (Status::INVALID_RANGE, Status::INVALID_VOLUME),
    (Status::POOL_HIGH_WATER, Status::SUCCESS),
    (Status::POOL_LOW_WATER, Status::SUCCESS),
    (Status::INVALID_VERSION, Status::INVALID_MESSAGE),
    (Status::MISSING_OPTION, Status::INVALID_OPTION),
    (Status::INCORRECT_ATTRIBUTE, Status::INVALID_VALUE),
];

fn table(to: Version) -> &'static [(Status, Status)] {
    match to {
        Version::V3 => V4_TO_V3,
        Version::V2 => V3_TO_V2,
        Version::V1 => V2_TO_V1,
        Version::V0 => V1_TO_V0,
        Version::V4 => &[],
    }
}

/// Maps `status`, reported against `owner`, one version down to `to`.
pub fn downgrade(status: Status, owner: Option<LsmId>, to: Version) -> Status {
    if to == Version::V2 && status == Status::LSM_NOT_IN_LIBRARY {
        if let Some(owner) = owner {
            if owner.lsm == sentinel::ANY_LSM || owner.lsm >= v2_sentinel::ANY_LSM {
                return Status::INVALID_LSM;
            }
        }
    }
    if status.is_known_in(to) {
        return status;
    }
    table(to)
        .iter()
        .find(|(from, _)| *from == status)
        .map_or(Status::PROCESS_FAILURE, |(_, mapped)| *mapped)
}

/// Maps a canonical status down to `target` one version at a time.
pub fn downgrade_to(status: Status, owner: Option<LsmId>, target: Version) -> Status {
    let mut current = Version::CANONICAL;
    let mut mapped = status;
    while current > target {
        let Some(next) = current.previous() else {
            break;
        };
        mapped = downgrade(mapped, owner, next);
        current = next;
    }
    mapped
}

/// Rewrites every status a packet carries.
pub struct StatusDowngrade {
    pub to: Version,
}

impl VisitMut for StatusDowngrade {
    fn visit_status(&mut self, status: &mut Status, owner: Option<LsmId>) {
        *status = downgrade(*status, owner, self.to);
    }
}

pub fn downgrade_all(packet: &mut Packet, to: Version) {
    packet.walk(&mut StatusDowngrade { to });
}

/// Acknowledge packets carry no body statuses.
pub fn downgrade_message_status(packet: &mut Packet, to: Version) {
    if let Packet::Response(response) = packet {
        let owner = response.body.status_owner();
        response
            .message_status
            .walk_for(owner, &mut StatusDowngrade { to });
    }
}

#[cfg(test)]
mod tests {
    use super::{downgrade, downgrade_to};
    use crate::wire::ident::{sentinel, LsmId};
    use crate::wire::status::Status;
    use crate::wire::types::Version;

    #[test]
    fn known_statuses_pass_through() {
        assert_eq!(downgrade(Status::LIBRARY_BUSY, None, Version::V0), Status::LIBRARY_BUSY);
        assert_eq!(
            downgrade(Status::UNSUPPORTED_COMMAND, None, Version::V2),
            Status::UNSUPPORTED_COMMAND
        );
    }

    #[test]
    fn listed_statuses_take_their_mapping() {
        assert_eq!(
            downgrade(Status::INCORRECT_LOCKID, None, Version::V1),
            Status::VARY_DISALLOWED
        );
        assert_eq!(downgrade(Status::CAP_DONE, None, Version::V3), Status::SUCCESS);
        assert_eq!(
            downgrade(Status::OWNER_NOT_FOUND, None, Version::V2),
            Status::INVALID_VALUE
        );
        assert_eq!(
            downgrade(Status::MISSING_OPTION, None, Version::V0),
            Status::INVALID_OPTION
        );
    }

    #[test]
    fn unlisted_unknown_statuses_become_process_failure() {
        assert_eq!(
            downgrade(Status::MGMTCLAS_NOT_FOUND, None, Version::V3),
            Status::PROCESS_FAILURE
        );
        assert_eq!(downgrade(Status::DEADLOCK, None, Version::V1), Status::PROCESS_FAILURE);
    }

    #[test]
    fn lsm_not_in_library_depends_on_the_lsm_number() {
        let high = Some(LsmId::new(0, 20));
        let low = Some(LsmId::new(0, 3));
        assert_eq!(
            downgrade(Status::LSM_NOT_IN_LIBRARY, high, Version::V2),
            Status::INVALID_LSM
        );
        assert_eq!(
            downgrade(Status::LSM_NOT_IN_LIBRARY, low, Version::V2),
            Status::LSM_NOT_IN_LIBRARY
        );
        assert_eq!(
            downgrade(Status::LSM_NOT_IN_LIBRARY, high, Version::V3),
            Status::LSM_NOT_IN_LIBRARY
        );
    }

    #[test]
    fn any_lsm_owner_counts_as_out_of_range() {
        let any = Some(LsmId::new(0, sentinel::ANY_LSM));
        assert_eq!(
            downgrade(Status::LSM_NOT_IN_LIBRARY, any, Version::V2),
            Status::INVALID_LSM
        );
        assert_eq!(
            downgrade(Status::LSM_NOT_IN_LIBRARY, None, Version::V2),
            Status::LSM_NOT_IN_LIBRARY
        );
    }

    #[test]
    fn mapping_is_a_pure_function() {
        for code in 0..=229u16 {
            let status = Status(code);
            for to in [Version::V0, Version::V1, Version::V2, Version::V3] {
                let first = downgrade(status, None, to);
                assert_eq!(first, downgrade(status, None, to));
                assert!(first.is_known_in(to), "{status} at {to}");
            }
        }
    }

    #[test]
    fn multi_step_mapping_chains_the_tables() {
        assert_eq!(
            downgrade_to(Status::INVALID_VERSION, None, Version::V1),
            Status::INVALID_VERSION
        );
        assert_eq!(
            downgrade_to(Status::INVALID_VERSION, None, Version::V0),
            Status::INVALID_MESSAGE
        );
        assert_eq!(
            downgrade_to(Status::COMMAND_ACCESS_DENIED, None, Version::V1),
            Status::INVALID_COMMAND
        );
        assert_eq!(
            downgrade_to(Status::LIBRARY_BUSY, None, Version::V4),
            Status::LIBRARY_BUSY
        );
    }
}
