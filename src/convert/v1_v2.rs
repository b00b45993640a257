//! Version 2 introduced CAP numbers, lock ids and the CAP priority and
//! mode fields of CAP query records.

use crate::convert::{status, ConvertError};
use crate::wire::ident::{Cap, CapId};
use crate::wire::packet::Packet;
use crate::wire::query::{QueryCriteria, QueryStatus};
use crate::wire::request::RequestBody;
use crate::wire::response::ResponseBody;
use crate::wire::types::{CapMode, CapPriority, Version, NO_PRIORITY};
use crate::wire::visit::{VisitMut, Walk};

/// Gives CAP records the fields version 2 added.
struct AddCapExtras;

impl VisitMut for AddCapExtras {
    fn visit_cap_extras(
        &mut self,
        priority: &mut Option<CapPriority>,
        mode: &mut Option<CapMode>,
    ) {
        priority.get_or_insert(NO_PRIORITY);
        mode.get_or_insert(CapMode::Manual);
    }
}

/// Drops CAP numbers and the CAP record fields version 1 lacks.
struct StripCaps;

impl VisitMut for StripCaps {
    fn visit_cap(&mut self, cap: &mut Cap) {
        *cap = 0;
    }

    fn visit_cap_extras(
        &mut self,
        priority: &mut Option<CapPriority>,
        mode: &mut Option<CapMode>,
    ) {
        *priority = None;
        *mode = None;
    }
}

fn first_cap(id: &CapId) -> bool {
    id.cap == 0
}

/// Keeps only the entries of CAP arrays that version 1 can address.
fn filter_cap_arrays(packet: &mut Packet) {
    match packet {
        Packet::Request(request) => {
            if let RequestBody::Query {
                criteria: QueryCriteria::Cap(ids),
            } = &mut request.body
            {
                ids.retain(first_cap);
            }
        }
        Packet::Response(response) => {
            if let ResponseBody::Query(QueryStatus::Cap(records)) = &mut response.body {
                records.retain(|record| first_cap(&record.cap_id));
            }
        }
    }
}

pub(super) fn upgrade(packet: &mut Packet) -> Result<(), ConvertError> {
    packet.walk(&mut AddCapExtras);
    Ok(())
}

pub(super) fn downgrade(packet: &mut Packet) -> Result<(), ConvertError> {
    status::downgrade_all(packet, Version::V1);
    filter_cap_arrays(packet);
    packet.walk(&mut StripCaps);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::convert::{downgrade, upgrade, ConvertError};
    use crate::wire::header::MessageHeader;
    use crate::wire::ident::{CapId, LsmId};
    use crate::wire::packet::{Packet, Request, Response};
    use crate::wire::query::{CapStatus, QueryCriteria, QueryStatus};
    use crate::wire::record::{IdList, ResponseStatus};
    use crate::wire::request::RequestBody;
    use crate::wire::response::ResponseBody;
    use crate::wire::status::Status;
    use crate::wire::types::{CapMode, Command, State, Version, NO_PRIORITY};

    fn cap_record(cap: i8, extras: bool) -> CapStatus {
        CapStatus {
            cap_id: CapId::new(0, 1, cap),
            status: Status::CAP_AVAILABLE,
            priority: extras.then_some(5),
            cap_size: 21,
            state: State::Online,
            mode: extras.then_some(CapMode::Automatic),
        }
    }

    fn cap_query_response(version: Version, records: Vec<CapStatus>) -> Packet {
        Response::new(
            MessageHeader::new(Command::Query, version),
            ResponseStatus::new(Status::SUCCESS),
            ResponseBody::Query(QueryStatus::Cap(records)),
        )
        .into()
    }

    #[test]
    fn cap_records_gain_default_priority_and_mode() {
        let src = cap_query_response(Version::V1, vec![cap_record(0, false)]);
        let converted = upgrade(&src).expect("cap query upgrades");
        let Packet::Response(out) = &converted.packet else {
            panic!("response stays a response");
        };
        let ResponseBody::Query(QueryStatus::Cap(records)) = &out.body else {
            panic!("cap records preserved");
        };
        assert_eq!(records[0].priority, Some(NO_PRIORITY));
        assert_eq!(records[0].mode, Some(CapMode::Manual));
        assert_eq!(converted.packet.byte_count(), converted.packet.serialized_len());
        assert_eq!(converted.packet.byte_count(), src.byte_count() + 2);
    }

    #[test]
    fn cap_records_beyond_the_first_cap_are_dropped() {
        let src = cap_query_response(
            Version::V2,
            vec![cap_record(0, true), cap_record(1, true), cap_record(2, true)],
        );
        let converted = downgrade(&src).expect("cap query downgrades");
        let Packet::Response(out) = &converted.packet else {
            panic!("response stays a response");
        };
        assert_eq!(
            out.body,
            ResponseBody::Query(QueryStatus::Cap(vec![cap_record(0, false)]))
        );
        assert_eq!(converted.packet.byte_count(), converted.packet.serialized_len());
    }

    #[test]
    fn scalar_cap_numbers_are_truncated() {
        let request: Packet = Request::new(
            MessageHeader::new(Command::Query, Version::V2),
            RequestBody::Query {
                criteria: QueryCriteria::Cap(vec![CapId::new(0, 0, 0), CapId::new(0, 0, 2)]),
            },
        )
        .into();
        let converted = downgrade(&request).expect("cap query downgrades");
        let Packet::Request(out) = converted.packet else {
            panic!("request stays a request");
        };
        assert_eq!(
            out.body,
            RequestBody::Query {
                criteria: QueryCriteria::Cap(vec![CapId::new(0, 0, 0)])
            }
        );
    }

    #[test]
    fn lock_ids_are_cleared_and_lock_commands_refused() {
        let mut header = MessageHeader::new(Command::Vary, Version::V2);
        header.lock_id = 42;
        let vary: Packet = Request::new(
            header,
            RequestBody::Vary {
                state: State::Online,
                ids: IdList::Lsm(vec![LsmId::new(0, 0)]),
            },
        )
        .into();
        let converted = downgrade(&vary).expect("vary downgrades");
        assert_eq!(converted.packet.header().lock_id, 0);

        let lock: Packet = Request::new(
            MessageHeader::new(Command::Lock, Version::V2),
            RequestBody::Lock {
                ids: IdList::Drive(Vec::new()),
            },
        )
        .into();
        let err = downgrade(&lock).expect_err("LOCK is a v2 command");
        assert!(matches!(err, ConvertError::InvalidCommand { .. }));
    }

    #[test]
    fn vary_of_caps_is_refused_at_v1() {
        let vary: Packet = Request::new(
            MessageHeader::new(Command::Vary, Version::V2),
            RequestBody::Vary {
                state: State::Offline,
                ids: IdList::Cap(vec![CapId::new(0, 0, 1)]),
            },
        )
        .into();
        let err = downgrade(&vary).expect_err("CAP vary needs v2");
        assert!(matches!(err, ConvertError::InvalidType { what: "CAP", .. }));
    }
}
