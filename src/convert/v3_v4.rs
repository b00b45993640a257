//! Version 4 added media and drive types.

use crate::convert::{status, ConvertError};
use crate::wire::packet::Packet;
use crate::wire::types::{DriveType, MediaType, Version, ALL_MEDIA_TYPE, ANY_DRIVE_TYPE};
use crate::wire::visit::{VisitMut, Walk};

/// Fills absent media and drive types with the wildcards that match
/// everything the older client could have meant.
struct AddTypes;

impl VisitMut for AddTypes {
    fn visit_media_type(&mut self, media_type: &mut Option<MediaType>) {
        media_type.get_or_insert(ALL_MEDIA_TYPE);
    }

    fn visit_drive_type(&mut self, drive_type: &mut Option<DriveType>) {
        drive_type.get_or_insert(ANY_DRIVE_TYPE);
    }
}

struct StripTypes;

impl VisitMut for StripTypes {
    fn visit_media_type(&mut self, media_type: &mut Option<MediaType>) {
        *media_type = None;
    }

    fn visit_drive_type(&mut self, drive_type: &mut Option<DriveType>) {
        *drive_type = None;
    }
}

pub(super) fn upgrade(packet: &mut Packet) -> Result<(), ConvertError> {
    packet.walk(&mut AddTypes);
    Ok(())
}

pub(super) fn downgrade(packet: &mut Packet) -> Result<(), ConvertError> {
    status::downgrade_all(packet, Version::V3);
    packet.walk(&mut StripTypes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::convert::{downgrade, upgrade, ConvertError};
    use crate::wire::header::MessageHeader;
    use crate::wire::ident::{DriveId, PoolId, VolId};
    use crate::wire::packet::{Packet, Request, Response};
    use crate::wire::query::{DriveStatus, QueryCriteria, QueryStatus};
    use crate::wire::record::ResponseStatus;
    use crate::wire::request::RequestBody;
    use crate::wire::response::ResponseBody;
    use crate::wire::status::Status;
    use crate::wire::types::{Command, State, Version, ALL_MEDIA_TYPE};

    fn drive(drive: i8, drive_type: Option<i8>, status: Status) -> DriveStatus {
        DriveStatus {
            drive_id: DriveId::new(0, 0, 1, drive),
            vol_id: VolId::parse("EMPTY").expect("label"),
            drive_type,
            state: State::Online,
            status,
        }
    }

    #[test]
    fn mount_scratch_gains_the_all_media_wildcard() {
        let src: Packet = Request::new(
            MessageHeader::new(Command::MountScratch, Version::V3),
            RequestBody::MountScratch {
                pool_id: PoolId(5),
                media_type: None,
                drives: vec![DriveId::new(0, 0, 1, 2)],
            },
        )
        .into();
        let converted = upgrade(&src).expect("mount scratch upgrades");
        let Packet::Request(out) = &converted.packet else {
            panic!("request stays a request");
        };
        let RequestBody::MountScratch { media_type, .. } = &out.body else {
            panic!("body preserved");
        };
        assert_eq!(*media_type, Some(ALL_MEDIA_TYPE));
        assert_eq!(converted.packet.byte_count(), src.byte_count() + 1);
    }

    #[test]
    fn drive_types_and_v4_statuses_are_dropped() {
        let src: Packet = Response::new(
            MessageHeader::new(Command::Query, Version::V4),
            ResponseStatus::new(Status::SUCCESS),
            ResponseBody::Query(QueryStatus::Drive(vec![
                drive(1, Some(7), Status::DRIVE_AVAILABLE),
                drive(2, Some(9), Status::INVALID_DRIVE_TYPE),
            ])),
        )
        .into();
        let converted = downgrade(&src).expect("drive query downgrades");
        let Packet::Response(out) = &converted.packet else {
            panic!("response stays a response");
        };
        assert_eq!(
            out.body,
            ResponseBody::Query(QueryStatus::Drive(vec![
                drive(1, None, Status::DRIVE_AVAILABLE),
                drive(2, None, Status::INVALID_DRIVE),
            ]))
        );
        assert_eq!(converted.packet.byte_count(), src.byte_count() - 2);
    }

    #[test]
    fn mixed_media_info_has_no_v3_form() {
        let src: Packet = Request::new(
            MessageHeader::new(Command::Query, Version::V4),
            RequestBody::Query {
                criteria: QueryCriteria::MixedMediaInfo,
            },
        )
        .into();
        let err = downgrade(&src).expect_err("v4 only query type");
        assert!(matches!(
            err,
            ConvertError::InvalidType {
                what: "MIXED_MEDIA_INFO",
                ..
            }
        ));
    }
}
