//! Version 0 and version 1 differ only in the message header and in the
//! commands, query types and statuses version 1 introduced.

use crate::convert::{status, ConvertError};
use crate::wire::packet::Packet;
use crate::wire::types::Version;

pub(super) fn upgrade(_packet: &mut Packet) -> Result<(), ConvertError> {
    Ok(())
}

pub(super) fn downgrade(packet: &mut Packet) -> Result<(), ConvertError> {
    status::downgrade_all(packet, Version::V0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::convert::{downgrade, upgrade, ConvertError};
    use crate::wire::header::{extended_options, MessageHeader};
    use crate::wire::ident::{LsmId, PoolId};
    use crate::wire::packet::{Packet, Request, Response};
    use crate::wire::query::{QueryCriteria, QueryStatus};
    use crate::wire::record::{ResponseStatus, StatusList};
    use crate::wire::request::RequestBody;
    use crate::wire::response::ResponseBody;
    use crate::wire::status::Status;
    use crate::wire::types::{Command, State, Version};

    #[test]
    fn upgrade_widens_only_the_header() {
        let request: Packet = Request::new(
            MessageHeader::new(Command::Vary, Version::V0),
            RequestBody::Vary {
                state: State::Offline,
                ids: crate::wire::record::IdList::Lsm(vec![LsmId::new(0, 1)]),
            },
        )
        .into();
        let converted = upgrade(&request).expect("vary upgrades");
        assert_eq!(converted.packet.version(), Version::V1);
        assert_eq!(converted.packet.byte_count(), request.byte_count() + 8);
        assert_eq!(converted.packet.variable_len(), request.variable_len());
    }

    #[test]
    fn pool_statuses_collapse_to_invalid_value() {
        let response: Packet = Response::new(
            MessageHeader::new(Command::Vary, Version::V1),
            ResponseStatus::new(Status::POOL_NOT_FOUND),
            ResponseBody::Vary {
                state: State::Online,
                statuses: StatusList::Lsm(Vec::new()),
            },
        )
        .into();
        let converted = downgrade(&response).expect("vary downgrades");
        let Packet::Response(out) = converted.packet else {
            panic!("response stays a response");
        };
        assert_eq!(out.message_status.status, Status::INVALID_VALUE);
    }

    #[test]
    fn scratch_queries_do_not_exist_at_v0() {
        let request: Packet = Request::new(
            MessageHeader::new(Command::Query, Version::V1),
            RequestBody::Query {
                criteria: QueryCriteria::Scratch(vec![PoolId(3)]),
            },
        )
        .into();
        let err = downgrade(&request).expect_err("SCRATCH is a v1 query");
        assert!(matches!(err, ConvertError::InvalidType { what: "SCRATCH", .. }));

        let response: Packet = Response::new(
            MessageHeader::new(Command::Query, Version::V1),
            ResponseStatus::new(Status::SUCCESS),
            ResponseBody::Query(QueryStatus::Pool(Vec::new())),
        )
        .into();
        assert!(downgrade(&response).is_err());
    }

    #[test]
    fn wait_option_cannot_reach_v0() {
        let mut header = MessageHeader::new(Command::Idle, Version::V1);
        header.extended_options = extended_options::WAIT;
        let request: Packet = Request::new(header, RequestBody::Idle).into();
        let err = downgrade(&request).expect_err("WAIT needs the extended header");
        assert!(matches!(err, ConvertError::UnsupportedOption { option: "WAIT" }));
    }
}
