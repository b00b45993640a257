//! Byte-count bookkeeping shared by every conversion step.

use crate::convert::ConvertError;
use crate::wire::codec::buffer::COUNT_LEN;
use crate::wire::packet::Packet;
use crate::wire::response::ResponseBody;

/// Bytes of the variable portion implied by an IPC byte count.
pub fn copy_size(old_byte_count: usize, old_offset: usize) -> usize {
    old_byte_count.saturating_sub(old_offset)
}

/// Byte count after moving the variable portion from `old_offset` to
/// `new_offset` unchanged.
pub fn carry_over(old_byte_count: usize, old_offset: usize, new_offset: usize) -> usize {
    copy_size(old_byte_count, old_offset) + new_offset
}

/// Intermediate AUDIT and EJECT/ENTER responses may end before the count
/// of an empty list.
fn may_clamp(packet: &Packet) -> bool {
    match packet {
        Packet::Response(response) => {
            response.header.is_intermediate()
                && matches!(
                    response.body,
                    ResponseBody::Audit { .. } | ResponseBody::EjectEnter { .. }
                )
        }
        Packet::Request(_) => false,
    }
}

/// Checks the IPC byte count of a conversion input against its layout.
pub fn verify(packet: &Packet) -> Result<(), ConvertError> {
    let declared = packet.byte_count();
    let expected = packet.serialized_len();
    if declared == expected {
        return Ok(());
    }
    let offset = packet.variable_offset();
    let clamped = may_clamp(packet)
        && packet.variable_len() == 0
        && declared < offset
        && declared + COUNT_LEN >= offset;
    if clamped {
        Ok(())
    } else {
        Err(ConvertError::IntegrityViolation { declared, expected })
    }
}

/// Byte count for `dst`, converted from `src`. An unchanged variable
/// portion is carried over from the source count; anything else is
/// rebuilt from the destination layout.
pub fn recount(src: &Packet, dst: &Packet) -> Result<usize, ConvertError> {
    let rebuilt = dst.serialized_len();
    if src.variable_len() != dst.variable_len() {
        return Ok(rebuilt);
    }
    let carried = carry_over(src.byte_count(), src.variable_offset(), dst.variable_offset());
    if carried != rebuilt {
        return Err(ConvertError::IntegrityViolation {
            declared: carried,
            expected: rebuilt,
        });
    }
    Ok(carried)
}

#[cfg(test)]
mod tests {
    use super::{carry_over, recount, verify};
    use crate::convert::ConvertError;
    use crate::wire::header::{message_options, MessageHeader};
    use crate::wire::ident::CapId;
    use crate::wire::packet::{Packet, Response};
    use crate::wire::record::{AuditScope, ResponseStatus, StatusList};
    use crate::wire::response::ResponseBody;
    use crate::wire::status::Status;
    use crate::wire::types::{Command, Version};

    fn intermediate_audit(version: Version) -> Packet {
        let mut header = MessageHeader::new(Command::Audit, version);
        header.message_options = message_options::INTERMEDIATE;
        Response::new(
            header,
            ResponseStatus::new(Status::SUCCESS),
            ResponseBody::Audit {
                cap_id: CapId::new(0, 0, 0),
                scope: AuditScope::Listed(StatusList::Lsm(Vec::new())),
            },
        )
        .into()
    }

    #[test]
    fn carry_over_never_goes_negative() {
        assert_eq!(carry_over(40, 36, 44), 48);
        assert_eq!(carry_over(30, 36, 44), 44);
    }

    #[test]
    fn clamped_audit_is_tolerated_and_normalized() {
        let mut src = intermediate_audit(Version::V0);
        src.ipc_mut().byte_count -= 2;
        verify(&src).expect("clamp case accepted");

        let mut dst = src.clone();
        dst.header_mut().version = Version::V1;
        let count = recount(&src, &dst).expect("recount");
        assert_eq!(count, dst.serialized_len());
    }

    #[test]
    fn clamp_is_limited_to_the_count_field() {
        let mut src = intermediate_audit(Version::V2);
        src.ipc_mut().byte_count -= 3;
        let err = verify(&src).expect_err("short by more than the count");
        assert!(matches!(err, ConvertError::IntegrityViolation { .. }));

        let mut final_audit = intermediate_audit(Version::V2);
        final_audit.header_mut().message_options = 0;
        final_audit.ipc_mut().byte_count -= 2;
        assert!(verify(&final_audit).is_err());
    }
}
