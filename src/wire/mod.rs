//! Version-tagged request and response packets and their byte-exact codec.

pub mod codec;
pub mod header;
pub mod ident;
pub mod packet;
pub mod query;
pub mod record;
pub mod request;
pub mod response;
pub mod status;
pub mod types;
pub mod visit;

pub use packet::{Packet, Request, Response};
pub use status::Status;
pub use types::{Command, Type, Version};
