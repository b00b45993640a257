//! Version 3 moved every wildcard to a negative value and widened pool ids
//! to 32 bits.

use crate::convert::sentinel::{Narrow, Widen};
use crate::convert::{status, ConvertError};
use crate::wire::packet::Packet;
use crate::wire::types::Version;
use crate::wire::visit::Walk;

pub(super) fn upgrade(packet: &mut Packet) -> Result<(), ConvertError> {
    packet.walk(&mut Widen);
    Ok(())
}

pub(super) fn downgrade(packet: &mut Packet) -> Result<(), ConvertError> {
    status::downgrade_all(packet, Version::V2);
    let mut narrow = Narrow::default();
    packet.walk(&mut narrow);
    narrow.finish()
}

#[cfg(test)]
mod tests {
    use crate::convert::{downgrade, upgrade, ConvertError};
    use crate::wire::header::MessageHeader;
    use crate::wire::ident::{sentinel, v2_sentinel, PoolId};
    use crate::wire::packet::{Packet, Request};
    use crate::wire::query::QueryCriteria;
    use crate::wire::request::RequestBody;
    use crate::wire::types::{Command, Version};

    fn delete_pools(version: Version, pools: Vec<PoolId>) -> Packet {
        Request::new(
            MessageHeader::new(Command::DeletePool, version),
            RequestBody::DeletePool { pools },
        )
        .into()
    }

    #[test]
    fn pool_ids_widen_and_same_pool_moves() {
        let src = delete_pools(
            Version::V2,
            vec![PoolId(3), PoolId(v2_sentinel::SAME_POOL)],
        );
        let converted = upgrade(&src).expect("delete pool upgrades");
        let Packet::Request(out) = &converted.packet else {
            panic!("request stays a request");
        };
        assert_eq!(
            out.body,
            RequestBody::DeletePool {
                pools: vec![PoolId(3), PoolId(sentinel::SAME_POOL)]
            }
        );
        assert_eq!(converted.packet.byte_count(), src.byte_count() + 4);
        assert!(converted.diagnostics.is_empty());
    }

    #[test]
    fn wide_pool_ids_are_refused_below_v3() {
        let src = delete_pools(Version::V3, vec![PoolId(12), PoolId(70_000)]);
        let err = downgrade(&src).expect_err("70000 does not fit 16 bits");
        assert!(matches!(
            err,
            ConvertError::UnrepresentableValue {
                field: "pool_id",
                value: 70_000,
                version: Version::V2,
            }
        ));
    }

    #[test]
    fn any_acs_round_trips() {
        let src: Packet = Request::new(
            MessageHeader::new(Command::Query, Version::V3),
            RequestBody::Query {
                criteria: QueryCriteria::Acs(vec![sentinel::ANY_ACS, 0]),
            },
        )
        .into();
        let down = downgrade(&src).expect("query downgrades");
        let Packet::Request(narrowed) = &down.packet else {
            panic!("request stays a request");
        };
        assert_eq!(
            narrowed.body,
            RequestBody::Query {
                criteria: QueryCriteria::Acs(vec![v2_sentinel::ANY_ACS, 0])
            }
        );
        let up = upgrade(&down.packet).expect("query upgrades");
        assert_eq!(up.packet, src);
    }
}
