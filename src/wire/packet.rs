use serde::{Deserialize, Serialize};

use crate::wire::codec::CodecError;
use crate::wire::header::{message_options, IpcHeader, MessageHeader, IPC_HEADER_LEN};
use crate::wire::ident::MessageId;
use crate::wire::record::{ResponseStatus, RESPONSE_STATUS_LEN};
use crate::wire::request::RequestBody;
use crate::wire::response::ResponseBody;
use crate::wire::status::Status;
use crate::wire::types::{Command, Type, Version};
use crate::wire::visit::{VisitMut, Walk};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub ipc: IpcHeader,
    pub header: MessageHeader,
    pub body: RequestBody,
}

impl Request {
    /// A client request with its byte count already set.
    pub fn new(header: MessageHeader, body: RequestBody) -> Self {
        let mut request = Self {
            ipc: IpcHeader::from_module(Type::Ssi, 0),
            header,
            body,
        };
        request.finalize();
        request
    }

    pub fn serialized_len(&self) -> usize {
        IPC_HEADER_LEN
            + MessageHeader::encoded_len(self.header.version)
            + self.body.encoded_len(self.header.version)
    }

    pub fn variable_offset(&self) -> usize {
        IPC_HEADER_LEN
            + MessageHeader::encoded_len(self.header.version)
            + self.body.fixed_len(self.header.version)
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        self.header.validate()?;
        self.body.validate(&self.header)
    }

    pub fn finalize(&mut self) {
        self.ipc.byte_count = self.serialized_len() as u32;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ipc: IpcHeader,
    pub header: MessageHeader,
    pub message_status: ResponseStatus,
    pub body: ResponseBody,
}

impl Response {
    /// A server response with its byte count already set.
    pub fn new(header: MessageHeader, message_status: ResponseStatus, body: ResponseBody) -> Self {
        let mut response = Self {
            ipc: IpcHeader::from_module(Type::Csi, 0),
            header,
            message_status,
            body,
        };
        response.finalize();
        response
    }

    /// The immediate receipt for `request`, at the request's own version.
    pub fn acknowledge(request: &Request, message_id: MessageId) -> Self {
        let mut header = request.header;
        header.message_options = (header.message_options
            & !(message_options::INTERMEDIATE | message_options::ACKNOWLEDGE))
            | message_options::ACKNOWLEDGE;
        let mut response = Self::new(
            header,
            ResponseStatus::new(Status::SUCCESS),
            ResponseBody::Acknowledge { message_id },
        );
        response.ipc.seq_num = request.ipc.seq_num;
        response
    }

    /// A response answering `request` with the given flavour bits.
    pub fn answer(
        request: &MessageHeader,
        options: u8,
        message_status: ResponseStatus,
        body: ResponseBody,
    ) -> Self {
        let mut header = *request;
        header.message_options = (header.message_options
            & !(message_options::INTERMEDIATE | message_options::ACKNOWLEDGE))
            | options;
        Self::new(header, message_status, body)
    }

    pub fn serialized_len(&self) -> usize {
        IPC_HEADER_LEN
            + MessageHeader::encoded_len(self.header.version)
            + RESPONSE_STATUS_LEN
            + self.body.encoded_len(self.header.version)
    }

    pub fn variable_offset(&self) -> usize {
        IPC_HEADER_LEN
            + MessageHeader::encoded_len(self.header.version)
            + RESPONSE_STATUS_LEN
            + self.body.fixed_len(self.header.version)
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        self.header.validate()?;
        self.body.validate(&self.header)
    }

    pub fn finalize(&mut self) {
        self.ipc.byte_count = self.serialized_len() as u32;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    Request(Request),
    Response(Response),
}

impl Packet {
    pub fn ipc(&self) -> &IpcHeader {
        match self {
            Self::Request(request) => &request.ipc,
            Self::Response(response) => &response.ipc,
        }
    }

    pub fn ipc_mut(&mut self) -> &mut IpcHeader {
        match self {
            Self::Request(request) => &mut request.ipc,
            Self::Response(response) => &mut response.ipc,
        }
    }

    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Request(request) => &request.header,
            Self::Response(response) => &response.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut MessageHeader {
        match self {
            Self::Request(request) => &mut request.header,
            Self::Response(response) => &mut response.header,
        }
    }

    pub fn version(&self) -> Version {
        self.header().version
    }

    pub fn command(&self) -> Command {
        self.header().command
    }

    pub fn is_acknowledge(&self) -> bool {
        matches!(
            self,
            Self::Response(Response {
                body: ResponseBody::Acknowledge { .. },
                ..
            })
        )
    }

    pub fn byte_count(&self) -> usize {
        self.ipc().byte_count as usize
    }

    pub fn serialized_len(&self) -> usize {
        match self {
            Self::Request(request) => request.serialized_len(),
            Self::Response(response) => response.serialized_len(),
        }
    }

    /// Byte offset of the first element of the variable portion.
    pub fn variable_offset(&self) -> usize {
        match self {
            Self::Request(request) => request.variable_offset(),
            Self::Response(response) => response.variable_offset(),
        }
    }

    pub fn variable_len(&self) -> usize {
        self.serialized_len().saturating_sub(self.variable_offset())
    }

    pub fn variable_count(&self) -> usize {
        match self {
            Self::Request(request) => request.body.variable_count(),
            Self::Response(response) => response.body.variable_count(),
        }
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        match self {
            Self::Request(request) => request.validate(),
            Self::Response(response) => response.validate(),
        }
    }

    /// Rejects a packet whose IPC byte count disagrees with its layout.
    pub fn check_byte_count(&self) -> Result<(), CodecError> {
        let actual = self.serialized_len();
        if self.byte_count() != actual {
            return Err(CodecError::ByteCountMismatch {
                declared: self.byte_count(),
                actual,
            });
        }
        Ok(())
    }

    pub fn finalize(&mut self) {
        match self {
            Self::Request(request) => request.finalize(),
            Self::Response(response) => response.finalize(),
        }
    }

    /// Truncates every array to the capacities of `version`. Returns the
    /// dropped counts as (field, from, to).
    pub fn truncate_to(&mut self, version: Version) -> Vec<(&'static str, usize, usize)> {
        match self {
            Self::Request(request) => request.body.truncate(version.max_ids()),
            Self::Response(response) => response
                .body
                .truncate(version.max_ids(), version.max_drive_status()),
        }
    }
}

impl Walk for Packet {
    fn walk<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        match self {
            Self::Request(request) => request.body.walk(visitor),
            Self::Response(response) => {
                let owner = response.body.status_owner();
                response.message_status.walk_for(owner, visitor);
                response.body.walk(visitor);
            }
        }
    }
}

impl From<Request> for Packet {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Response> for Packet {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::{Packet, Request, Response};
    use crate::wire::header::{message_options, MessageHeader};
    use crate::wire::ident::{CapId, LsmId};
    use crate::wire::record::{AuditScope, IdList};
    use crate::wire::request::RequestBody;
    use crate::wire::response::ResponseBody;
    use crate::wire::types::{Command, Version};

    fn audit(version: Version) -> Request {
        Request::new(
            MessageHeader::new(Command::Audit, version),
            RequestBody::Audit {
                cap_id: CapId::new(0, 0, 0),
                scope: AuditScope::Listed(IdList::Lsm(vec![
                    LsmId::new(0, 0),
                    LsmId::new(0, 1),
                    LsmId::new(0, 2),
                ])),
            },
        )
    }

    #[test]
    fn offsets_follow_the_header_shape() {
        let v0 = Packet::from(audit(Version::V0));
        let v1 = Packet::from(audit(Version::V1));
        assert_eq!(v0.variable_offset(), 18 + 4 + 6);
        assert_eq!(v1.variable_offset(), 18 + 12 + 6);
        assert_eq!(v1.variable_len(), 6);
        assert_eq!(v1.byte_count(), v1.serialized_len());
        v1.check_byte_count().expect("finalized packet");
    }

    #[test]
    fn acknowledge_keeps_the_request_version() {
        let request = audit(Version::V2);
        let ack = Response::acknowledge(&request, 9);
        assert!(ack.header.has_option(message_options::ACKNOWLEDGE));
        assert_eq!(ack.header.version, Version::V2);
        assert_eq!(ack.serialized_len(), 18 + 12 + 11 + 2);
        assert!(matches!(ack.body, ResponseBody::Acknowledge { message_id: 9 }));
        Packet::from(ack).validate().expect("valid acknowledge");
    }

    #[test]
    fn stale_byte_count_is_reported() {
        let mut packet = Packet::from(audit(Version::V3));
        packet.ipc_mut().byte_count += 1;
        assert!(packet.check_byte_count().is_err());
        packet.finalize();
        packet.check_byte_count().expect("byte count restored");
    }
}
