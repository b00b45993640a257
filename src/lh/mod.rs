//! Messages exchanged with the library handler, the process that drives
//! the robotics.

use std::collections::VecDeque;

use serde::Serialize;

use crate::task::TaskId;
use crate::wire::packet::Request;
use crate::wire::response::ResponseBody;
use crate::wire::status::Status;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LhRequest {
    pub seq: u32,
    pub task: TaskId,
    pub request: Request,
    /// Set when a vary offline is retried with force.
    pub force: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LhReply {
    Final { status: Status, body: ResponseBody },
    Progress { body: ResponseBody },
    CapOpen { body: ResponseBody },
    CapClosed,
    Busy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LhResponse {
    pub seq: u32,
    pub reply: LhReply,
}

pub trait LibraryHandler: Send {
    fn submit(&mut self, request: LhRequest);

    /// Replies that arrived since the last poll.
    fn poll(&mut self) -> Vec<LhResponse>;
}

/// Answers everything with LIBRARY_NOT_AVAILABLE.
#[derive(Debug, Default)]
pub struct OfflineLibraryHandler {
    pending: VecDeque<LhResponse>,
}

impl LibraryHandler for OfflineLibraryHandler {
    fn submit(&mut self, request: LhRequest) {
        self.pending.push_back(LhResponse {
            seq: request.seq,
            reply: LhReply::Final {
                status: Status::LIBRARY_NOT_AVAILABLE,
                body: ResponseBody::empty_for(request.request.header.command),
            },
        });
    }

    fn poll(&mut self) -> Vec<LhResponse> {
        self.pending.drain(..).collect()
    }
}

/// Records submissions and replays whatever replies a test queues.
#[derive(Debug, Default)]
pub struct ScriptedLibraryHandler {
    pub submitted: Vec<LhRequest>,
    pending: VecDeque<LhResponse>,
}

impl ScriptedLibraryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&mut self, seq: u32, reply: LhReply) {
        self.pending.push_back(LhResponse { seq, reply });
    }

    /// Replies to the most recent submission.
    pub fn reply_last(&mut self, reply: LhReply) -> Option<u32> {
        let seq = self.submitted.last()?.seq;
        self.reply(seq, reply);
        Some(seq)
    }
}

impl LibraryHandler for ScriptedLibraryHandler {
    fn submit(&mut self, request: LhRequest) {
        self.submitted.push(request);
    }

    fn poll(&mut self) -> Vec<LhResponse> {
        self.pending.drain(..).collect()
    }
}
