//! Client sessions on one side, the task scheduler and library handler on
//! the other. Requests are upgraded to the canonical version before they
//! become tasks and every response goes back at the version its request
//! arrived with.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::convert::{self, status, ConvertError};
use crate::lh::LibraryHandler;
use crate::logging::{LogLevel, Logger};
use crate::task::{Effect, Scheduler, TaskError, TaskId};
use crate::wire::codec::{self, CodecError};
use crate::wire::header::MessageHeader;
use crate::wire::packet::{Packet, Request, Response};
use crate::wire::record::ResponseStatus;
use crate::wire::response::ResponseBody;
use crate::wire::status::Status;
use crate::wire::types::Version;

pub type SessionId = Uuid;

#[derive(Debug)]
pub enum GatewayError {
    UnknownSession { session: SessionId },
    Decode(CodecError),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSession { session } => write!(f, "unknown session {session}"),
            Self::Decode(source) => write!(f, "undecodable client packet: {source}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(source) => Some(source),
            Self::UnknownSession { .. } => None,
        }
    }
}

impl From<CodecError> for GatewayError {
    fn from(value: CodecError) -> Self {
        Self::Decode(value)
    }
}

/// Status reported when a client request cannot reach the canonical
/// version.
fn rejection_status(err: &ConvertError) -> Status {
    match err {
        ConvertError::InvalidCommand { .. } => Status::INVALID_COMMAND,
        ConvertError::InvalidType { .. } => Status::INVALID_TYPE,
        ConvertError::UnsupportedVersion { .. } => Status::INVALID_VERSION,
        ConvertError::UnsupportedOption { .. } => Status::UNSUPPORTED_OPTION,
        ConvertError::UnrepresentableValue { .. } => Status::INVALID_VALUE,
        ConvertError::IntegrityViolation { .. }
        | ConvertError::BodyMismatch { .. }
        | ConvertError::Malformed(_) => Status::INVALID_MESSAGE,
    }
}

struct Session {
    peer: String,
    opened_at: DateTime<Utc>,
    tasks: HashSet<TaskId>,
    outbox: VecDeque<Vec<u8>>,
}

/// Where a task's responses go and at which version.
struct Owner {
    session: SessionId,
    header: MessageHeader,
    seq_num: u32,
}

pub struct Gateway<L: LibraryHandler> {
    scheduler: Arc<Mutex<Scheduler>>,
    library: L,
    logger: Arc<Logger>,
    min_version: Version,
    sessions: HashMap<SessionId, Session>,
    owners: HashMap<TaskId, Owner>,
}

impl<L: LibraryHandler> Gateway<L> {
    pub fn new(
        scheduler: Arc<Mutex<Scheduler>>,
        library: L,
        logger: Arc<Logger>,
        min_version: Version,
    ) -> Self {
        Self {
            scheduler,
            library,
            logger,
            min_version,
            sessions: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    pub fn library_mut(&mut self) -> &mut L {
        &mut self.library
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn pending_tasks(&self, session: SessionId) -> usize {
        self.sessions
            .get(&session)
            .map_or(0, |session| session.tasks.len())
    }

    pub fn open_session(&mut self, peer: impl Into<String>) -> SessionId {
        let id = Uuid::new_v4();
        let peer = peer.into();
        self.logger.log(
            LogLevel::Info,
            Some("gateway::session"),
            "client session opened",
            Some(json!({ "session": id.to_string(), "peer": peer })),
        );
        self.sessions.insert(
            id,
            Session {
                peer,
                opened_at: Utc::now(),
                tasks: HashSet::new(),
                outbox: VecDeque::new(),
            },
        );
        id
    }

    /// Drops a session and aborts whatever it still has in flight.
    pub fn close_session(&mut self, id: SessionId) {
        let Some(session) = self.sessions.remove(&id) else {
            return;
        };
        {
            let mut scheduler = self.lock_scheduler();
            for task in &session.tasks {
                if let Err(err) = scheduler.abort(*task) {
                    self.logger.warn(
                        Some("gateway::session"),
                        &format!("abort of task {task} failed: {err}"),
                    );
                }
            }
        }
        self.owners.retain(|_, owner| owner.session != id);
        self.logger.log(
            LogLevel::Info,
            Some("gateway::session"),
            "client session closed",
            Some(json!({
                "session": id.to_string(),
                "peer": session.peer,
                "aborted_tasks": session.tasks.len(),
                "open_ms": (Utc::now() - session.opened_at).num_milliseconds(),
            })),
        );
        self.pump();
    }

    /// Encoded packets waiting to go out on a session.
    pub fn take_outbound(&mut self, id: SessionId) -> Vec<Vec<u8>> {
        self.sessions
            .get_mut(&id)
            .map(|session| session.outbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Accepts one client packet. Only an undecodable packet is an error;
    /// every other rejection is answered on the session.
    pub fn handle_packet(&mut self, id: SessionId, bytes: &[u8]) -> Result<(), GatewayError> {
        if !self.sessions.contains_key(&id) {
            return Err(GatewayError::UnknownSession { session: id });
        }
        let request = codec::decode_request(bytes)?;
        self.logger
            .packet_trace("in", &Packet::Request(request.clone()), bytes);

        let version = request.header.version;
        if version < self.min_version {
            self.logger.warn(
                Some("gateway::request"),
                &format!(
                    "{} rejected: client version {version} is below {}",
                    request.header.command, self.min_version
                ),
            );
            self.reject(id, &request, Status::INVALID_VERSION);
            return Ok(());
        }

        let canonical = match convert::to_canonical(&Packet::Request(request.clone())) {
            Ok(converted) => {
                self.log_diagnostics(&converted.diagnostics);
                converted.packet
            }
            Err(err) => {
                self.logger.warn(
                    Some("gateway::request"),
                    &format!("{} from {version} rejected: {err}", request.header.command),
                );
                self.reject(id, &request, rejection_status(&err));
                return Ok(());
            }
        };
        let Packet::Request(canonical) = canonical else {
            self.reject(id, &request, Status::INVALID_MESSAGE);
            return Ok(());
        };

        let submitted = self.lock_scheduler().submit(canonical);
        match submitted {
            Ok(task) => {
                self.owners.insert(
                    task,
                    Owner {
                        session: id,
                        header: request.header,
                        seq_num: request.ipc.seq_num,
                    },
                );
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.tasks.insert(task);
                }
                self.send(id, Response::acknowledge(&request, task).into());
            }
            Err(err) => {
                let status = if matches!(err, TaskError::Exhausted(_)) {
                    Status::LIBRARY_BUSY
                } else {
                    Status::PROCESS_FAILURE
                };
                self.logger.warn(
                    Some("gateway::request"),
                    &format!("{} not queued: {err}", request.header.command),
                );
                self.reject(id, &request, status);
            }
        }

        self.pump();
        Ok(())
    }

    /// Moves scheduler effects and library handler replies until neither
    /// side has anything left. Returns how many items were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let effects = self.lock_scheduler().take_effects();
            let replies = self.library.poll();
            if effects.is_empty() && replies.is_empty() {
                return handled;
            }
            handled += effects.len() + replies.len();

            for effect in effects {
                self.apply(effect);
            }
            for reply in replies {
                let seq = reply.seq;
                if let Err(err) = self.lock_scheduler().deliver(reply) {
                    self.logger.warn(
                        Some("gateway::library"),
                        &format!("library reply {seq} not delivered: {err}"),
                    );
                }
            }
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Lh(request) => {
                self.logger.log(
                    LogLevel::Debug,
                    Some("gateway::library"),
                    "request sent to library handler",
                    Some(json!({
                        "seq": request.seq,
                        "task": request.task,
                        "command": request.request.header.command.as_str(),
                        "force": request.force,
                    })),
                );
                self.library.submit(request);
            }
            Effect::Respond { task, response } => self.deliver_response(task, response),
            Effect::Finished { task } => {
                if let Some(owner) = self.owners.remove(&task) {
                    if let Some(session) = self.sessions.get_mut(&owner.session) {
                        session.tasks.remove(&task);
                    }
                }
            }
        }
    }

    fn deliver_response(&mut self, task: TaskId, response: Response) {
        let Some(owner) = self.owners.get(&task) else {
            self.logger.debug(
                Some("gateway::response"),
                &format!("response for task {task} has no session"),
            );
            return;
        };
        let session = owner.session;
        let target = owner.header.version;
        let is_final = !response.header.is_intermediate();

        match convert::convert(&Packet::Response(response), target) {
            Ok(converted) => {
                self.log_diagnostics(&converted.diagnostics);
                self.send(session, converted.packet);
            }
            Err(err) => {
                self.logger.error(
                    Some("gateway::response"),
                    &format!("response for task {task} cannot reach {target}: {err}"),
                );
                if is_final {
                    let fallback = self.failure_for(task, Status::PROCESS_FAILURE);
                    if let Some(packet) = fallback {
                        self.send(session, packet);
                    }
                }
            }
        }
    }

    fn failure_for(&self, task: TaskId, status: Status) -> Option<Packet> {
        let owner = self.owners.get(&task)?;
        Some(final_at(&owner.header, owner.seq_num, status).into())
    }

    fn reject(&mut self, id: SessionId, request: &Request, status: Status) {
        let response = final_at(&request.header, request.ipc.seq_num, status);
        self.send(id, response.into());
    }

    fn send(&mut self, id: SessionId, packet: Packet) {
        let bytes = match codec::encode_packet(&packet) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.logger.error(
                    Some("gateway::response"),
                    &format!("{} response could not be encoded: {err}", packet.command()),
                );
                return;
            }
        };
        self.logger.packet_trace("out", &packet, &bytes);
        if let Some(session) = self.sessions.get_mut(&id) {
            session.outbox.push_back(bytes);
        }
    }

    fn log_diagnostics(&self, diagnostics: &[convert::Diagnostic]) {
        for diagnostic in diagnostics {
            self.logger.log(
                LogLevel::Warn,
                Some("gateway::convert"),
                &diagnostic.to_string(),
                serde_json::to_value(diagnostic).ok(),
            );
        }
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock().expect("scheduler mutex poisoned")
    }
}

/// A final response with an empty body at the request's own version.
fn final_at(header: &MessageHeader, seq_num: u32, status: Status) -> Response {
    let mapped = status::downgrade_to(status, None, header.version);
    let mut response = Response::answer(
        header,
        0,
        ResponseStatus::new(mapped),
        ResponseBody::empty_for(header.command),
    );
    response.ipc.seq_num = seq_num;
    response
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};

    use super::{Gateway, GatewayError};
    use crate::lh::{LhReply, OfflineLibraryHandler, ScriptedLibraryHandler};
    use crate::logging::{LogLevel, Logger};
    use crate::task::tables::install;
    use crate::task::{ManualClock, Scheduler, TaskConfig};
    use crate::wire::codec::{decode_response, encode_request};
    use crate::wire::header::MessageHeader;
    use crate::wire::ident::{DriveId, VolId};
    use crate::wire::packet::{Request, Response};
    use crate::wire::request::RequestBody;
    use crate::wire::response::ResponseBody;
    use crate::wire::status::Status;
    use crate::wire::types::{Command, Version};

    fn gateway_with<L: crate::lh::LibraryHandler>(
        library: L,
        config: TaskConfig,
        min_version: Version,
    ) -> (Gateway<L>, Arc<Mutex<Scheduler>>) {
        let start = Utc
            .with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
            .single()
            .expect("date");
        let logger = Arc::new(Logger::in_memory(LogLevel::Debug).0);
        let scheduler = Scheduler::isolated(
            config,
            install().expect("tables"),
            Box::new(ManualClock::new(start)),
            Arc::clone(&logger),
        )
        .expect("scheduler");
        let scheduler = Arc::new(Mutex::new(scheduler));
        (
            Gateway::new(Arc::clone(&scheduler), library, logger, min_version),
            scheduler,
        )
    }

    fn mount_at(version: Version) -> Vec<u8> {
        let mut request = Request::new(
            MessageHeader::new(Command::Mount, version),
            RequestBody::Mount {
                vol_id: VolId::parse("A00001").expect("label"),
                drives: vec![DriveId::new(0, 0, 1, 0)],
            },
        );
        request.ipc.seq_num = 77;
        encode_request(&request).expect("encode")
    }

    fn decoded(outbound: &[Vec<u8>]) -> Vec<Response> {
        outbound
            .iter()
            .map(|bytes| decode_response(bytes).expect("outbound decodes"))
            .collect()
    }

    #[test]
    fn old_client_gets_ack_and_final_at_its_own_version() {
        let (mut gateway, _) =
            gateway_with(ScriptedLibraryHandler::new(), TaskConfig::default(), Version::V0);
        let session = gateway.open_session("127.0.0.1:4000");

        gateway
            .handle_packet(session, &mount_at(Version::V2))
            .expect("packet accepted");
        let acks = decoded(&gateway.take_outbound(session));
        assert_eq!(acks.len(), 1);
        assert!(acks[0].header.is_acknowledge());
        assert_eq!(acks[0].header.version, Version::V2);
        assert_eq!(acks[0].ipc.seq_num, 77);
        let ResponseBody::Acknowledge { message_id } = acks[0].body else {
            panic!("acknowledge body expected");
        };

        let library = gateway.library_mut();
        assert_eq!(library.submitted.len(), 1);
        assert_eq!(library.submitted[0].task, message_id);
        assert_eq!(library.submitted[0].request.header.version, Version::V4);
        library
            .reply_last(LhReply::Final {
                status: Status::SUCCESS,
                body: ResponseBody::empty_for(Command::Mount),
            })
            .expect("submission to answer");
        gateway.pump();

        let finals = decoded(&gateway.take_outbound(session));
        assert_eq!(finals.len(), 1);
        assert!(finals[0].header.is_final());
        assert_eq!(finals[0].header.version, Version::V2);
        assert_eq!(finals[0].message_status.status, Status::SUCCESS);
        assert_eq!(gateway.pending_tasks(session), 0);
    }

    #[test]
    fn offline_library_answers_library_not_available() {
        let (mut gateway, scheduler) = gateway_with(
            OfflineLibraryHandler::default(),
            TaskConfig::default(),
            Version::V0,
        );
        let session = gateway.open_session("peer");
        gateway
            .handle_packet(session, &mount_at(Version::V4))
            .expect("packet accepted");

        let responses = decoded(&gateway.take_outbound(session));
        assert_eq!(responses.len(), 2);
        assert!(responses[0].header.is_acknowledge());
        assert_eq!(
            responses[1].message_status.status,
            Status::LIBRARY_NOT_AVAILABLE
        );
        assert_eq!(scheduler.lock().expect("scheduler").active_tasks(), 0);
    }

    #[test]
    fn versions_below_the_minimum_are_refused_without_a_task() {
        let (mut gateway, scheduler) =
            gateway_with(ScriptedLibraryHandler::new(), TaskConfig::default(), Version::V2);
        let session = gateway.open_session("peer");
        gateway
            .handle_packet(session, &mount_at(Version::V1))
            .expect("refusal is not an error");

        let responses = decoded(&gateway.take_outbound(session));
        assert_eq!(responses.len(), 1);
        assert!(responses[0].header.is_final());
        assert_eq!(responses[0].header.version, Version::V1);
        assert_eq!(responses[0].message_status.status, Status::INVALID_VERSION);
        assert!(gateway.library_mut().submitted.is_empty());
        assert_eq!(scheduler.lock().expect("scheduler").active_tasks(), 0);
    }

    #[test]
    fn exhausted_task_slots_answer_library_busy() {
        let (mut gateway, _) = gateway_with(
            ScriptedLibraryHandler::new(),
            TaskConfig {
                task_slots: 1,
                ..TaskConfig::default()
            },
            Version::V0,
        );
        let session = gateway.open_session("peer");
        gateway
            .handle_packet(session, &mount_at(Version::V3))
            .expect("first accepted");
        gateway.take_outbound(session);

        gateway
            .handle_packet(session, &mount_at(Version::V3))
            .expect("second answered");
        let responses = decoded(&gateway.take_outbound(session));
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].message_status.status, Status::LIBRARY_BUSY);
        assert_eq!(responses[0].header.version, Version::V3);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let (mut gateway, _) =
            gateway_with(ScriptedLibraryHandler::new(), TaskConfig::default(), Version::V0);
        let session = gateway.open_session("peer");
        let err = gateway
            .handle_packet(session, &[0, 0, 0, 1, 2])
            .expect_err("not a packet");
        assert!(matches!(err, GatewayError::Decode(_)));
        assert!(gateway.take_outbound(session).is_empty());
    }

    #[test]
    fn unknown_session_is_rejected() {
        let (mut gateway, _) =
            gateway_with(ScriptedLibraryHandler::new(), TaskConfig::default(), Version::V0);
        let err = gateway
            .handle_packet(uuid::Uuid::new_v4(), &mount_at(Version::V4))
            .expect_err("no such session");
        assert!(matches!(err, GatewayError::UnknownSession { .. }));
    }

    #[test]
    fn closing_a_session_aborts_its_tasks() {
        let (mut gateway, scheduler) =
            gateway_with(ScriptedLibraryHandler::new(), TaskConfig::default(), Version::V0);
        let session = gateway.open_session("peer");
        gateway
            .handle_packet(session, &mount_at(Version::V4))
            .expect("accepted");
        assert_eq!(gateway.pending_tasks(session), 1);

        gateway.close_session(session);
        assert_eq!(gateway.session_count(), 0);
        assert_eq!(scheduler.lock().expect("scheduler").active_tasks(), 0);

        // A late library reply finds nobody waiting.
        gateway
            .library_mut()
            .reply_last(LhReply::Busy)
            .expect("submission recorded");
        gateway.pump();
        assert!(gateway.take_outbound(session).is_empty());
    }
}
