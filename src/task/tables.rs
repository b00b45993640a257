//! The command families and the actions their rows run.

use std::sync::OnceLock;

use crate::lh::LhReply;
use crate::task::machine::Context;
use crate::task::table::{Row, StateTable, TableError, TableId};
use crate::task::Event as E;
use crate::task::TaskState as S;
use crate::task::{Event, Outcome, Task, FOREVER};
use crate::wire::header::message_options;
use crate::wire::query::{QueryCriteria, QueryStatus, RequestSummary, ServerStatus};
use crate::wire::request::RequestBody;
use crate::wire::response::ResponseBody;
use crate::wire::status::Status;
use crate::wire::types::State;

fn request_lh(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    ctx.send_lh(task);
    Outcome::Suspend {
        timeout: ctx.config.lh_timeout,
        wake: E::Timeout,
    }
}

fn send_final(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    task.lh_seq = None;
    let reply = ctx.reply;
    match reply {
        Some(LhReply::Final { status, body }) => {
            task.last_status = *status;
            ctx.respond(task, 0, *status, body.clone());
        }
        _ => {
            task.last_status = Status::PROCESS_FAILURE;
            let body = ResponseBody::empty_for(task.request.header.command);
            ctx.respond(task, 0, Status::PROCESS_FAILURE, body);
        }
    }
    Outcome::Terminate
}

fn send_failure(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    let body = ResponseBody::empty_for(task.request.header.command);
    ctx.respond(task, 0, task.last_status, body);
    Outcome::Terminate
}

fn fail_process(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    task.last_status = Status::PROCESS_FAILURE;
    send_failure(task, ctx)
}

fn send_cancelled(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    task.last_status = Status::CANCELLED;
    send_failure(task, ctx)
}

fn abandon(_task: &mut Task, _ctx: &mut Context<'_>) -> Outcome {
    Outcome::Exit
}

fn hold(_task: &mut Task, _ctx: &mut Context<'_>) -> Outcome {
    Outcome::Continue
}

/// Leaves `lh_seq` set: the busy request may still be answered before the
/// retry resends it.
fn busy_backoff(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    if task.retries < ctx.config.max_retries {
        task.retries += 1;
        Outcome::Suspend {
            timeout: ctx.config.busy_retry,
            wake: E::Retry,
        }
    } else {
        task.last_status = Status::LIBRARY_BUSY;
        Outcome::Event(E::GiveUp)
    }
}

fn lh_timed_out(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    if task.retries < ctx.config.max_retries {
        task.retries += 1;
        Outcome::Event(E::Retry)
    } else {
        task.last_status = Status::PROCESS_FAILURE;
        Outcome::Event(E::GiveUp)
    }
}

fn intermediate_body(task: &Task, ctx: &Context<'_>) -> ResponseBody {
    match ctx.reply {
        Some(LhReply::Progress { body } | LhReply::CapOpen { body }) => body.clone(),
        _ => ResponseBody::empty_for(task.request.header.command),
    }
}

fn send_progress(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    let body = intermediate_body(task, ctx);
    ctx.respond(task, message_options::INTERMEDIATE, Status::SUCCESS, body);
    Outcome::Suspend {
        timeout: ctx.config.lh_timeout,
        wake: E::Timeout,
    }
}

fn cap_opened(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    let body = intermediate_body(task, ctx);
    ctx.respond(task, message_options::INTERMEDIATE, Status::SUCCESS, body);
    Outcome::Suspend {
        timeout: FOREVER,
        wake: E::Timeout,
    }
}

fn await_final(_task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    Outcome::Suspend {
        timeout: ctx.config.lh_timeout,
        wake: E::Timeout,
    }
}

fn route_query(task: &mut Task, _ctx: &mut Context<'_>) -> Outcome {
    match &task.request.body {
        RequestBody::Query {
            criteria: QueryCriteria::Server,
        } => Outcome::Event(E::Local),
        _ => Outcome::Event(E::Remote),
    }
}

fn answer_server(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    let body = ResponseBody::Query(QueryStatus::Server(vec![ServerStatus {
        state: State::Run,
        freecells: 0,
        requests: RequestSummary::default(),
    }]));
    ctx.respond(task, 0, Status::SUCCESS, body);
    Outcome::Terminate
}

fn vary_busy(task: &mut Task, ctx: &mut Context<'_>) -> Outcome {
    let offline = matches!(
        task.request.body,
        RequestBody::Vary {
            state: State::Offline,
            ..
        }
    );
    if offline && !task.forced {
        task.forced = true;
        task.lh_seq = None;
        return Outcome::Switch {
            table: TableId::Vary,
            state: S::ForcedOffline,
            event: E::Start,
        };
    }
    busy_backoff(task, ctx)
}

const SIMPLE_STIMULI: &[Event] = &[E::LhResponse, E::LibraryBusy, E::Cancel, E::Abort];
const AUDIT_STIMULI: &[Event] = &[
    E::LhResponse,
    E::LhProgress,
    E::LibraryBusy,
    E::Cancel,
    E::Abort,
];
const EJECT_ENTER_STIMULI: &[Event] = &[
    E::LhResponse,
    E::CapOpen,
    E::CapClosed,
    E::LibraryBusy,
    E::Cancel,
    E::Abort,
];

/// Rows shared by every family once the library handler has been asked.
fn waiting_rows() -> Vec<Row> {
    vec![
        Row::new(S::WaitLh, E::LhResponse, send_final, S::End),
        Row::new(S::WaitLh, E::LibraryBusy, busy_backoff, S::WaitBusy),
        Row::new(S::WaitLh, E::Timeout, lh_timed_out, S::WaitBusy),
        Row::new(S::WaitLh, E::Cancel, send_cancelled, S::End),
        Row::new(S::WaitBusy, E::Retry, request_lh, S::WaitLh),
        Row::new(S::WaitBusy, E::GiveUp, send_failure, S::End),
        Row::new(S::WaitBusy, E::LhResponse, send_final, S::End),
        Row::new(S::WaitBusy, E::LibraryBusy, busy_backoff, S::WaitBusy),
        Row::new(S::WaitBusy, E::Cancel, send_cancelled, S::End),
    ]
}

fn closing_rows() -> Vec<Row> {
    vec![
        Row::new(S::WaitBusy, E::Abort, abandon, S::End),
        Row::new(S::WaitLh, E::Abort, abandon, S::End),
    ]
}

fn build(
    id: TableId,
    stimuli: &'static [Event],
    parts: [Vec<Row>; 3],
) -> Result<StateTable, TableError> {
    StateTable::new(id, stimuli, parts.into_iter().flatten().collect())
}

fn simple() -> Result<StateTable, TableError> {
    build(
        TableId::Simple,
        SIMPLE_STIMULI,
        [
            vec![Row::new(S::Start, E::Start, request_lh, S::WaitLh)],
            waiting_rows(),
            closing_rows(),
        ],
    )
}

fn query() -> Result<StateTable, TableError> {
    build(
        TableId::Query,
        SIMPLE_STIMULI,
        [
            vec![
                Row::new(S::Start, E::Start, route_query, S::Start),
                Row::new(S::Start, E::Local, answer_server, S::End),
                Row::new(S::Start, E::Remote, request_lh, S::WaitLh),
            ],
            waiting_rows(),
            closing_rows(),
        ],
    )
}

fn audit() -> Result<StateTable, TableError> {
    build(
        TableId::Audit,
        AUDIT_STIMULI,
        [
            vec![Row::new(S::Start, E::Start, request_lh, S::WaitLh)],
            waiting_rows(),
            vec![
                Row::new(S::WaitLh, E::LhProgress, send_progress, S::WaitLh),
                Row::new(S::WaitBusy, E::LhProgress, send_progress, S::WaitLh),
                Row::new(S::WaitBusy, E::Abort, abandon, S::End),
                Row::new(S::WaitLh, E::Abort, abandon, S::End),
            ],
        ],
    )
}

fn eject_enter() -> Result<StateTable, TableError> {
    build(
        TableId::EjectEnter,
        EJECT_ENTER_STIMULI,
        [
            vec![Row::new(S::Start, E::Start, request_lh, S::WaitLh)],
            waiting_rows(),
            vec![
                Row::new(S::WaitLh, E::CapOpen, cap_opened, S::WaitCapClosed),
                Row::new(S::WaitLh, E::CapClosed, hold, S::WaitLh),
                Row::new(S::WaitLh, E::Abort, abandon, S::End),
                Row::new(S::WaitBusy, E::CapOpen, cap_opened, S::WaitCapClosed),
                Row::new(S::WaitBusy, E::CapClosed, hold, S::WaitBusy),
                Row::new(S::WaitBusy, E::Abort, abandon, S::End),
                Row::new(S::WaitCapClosed, E::CapClosed, await_final, S::WaitFinal),
                Row::new(S::WaitCapClosed, E::CapOpen, hold, S::WaitCapClosed),
                Row::new(S::WaitCapClosed, E::LibraryBusy, hold, S::WaitCapClosed),
                Row::new(S::WaitCapClosed, E::LhResponse, send_final, S::End),
                Row::new(S::WaitCapClosed, E::Timeout, fail_process, S::End),
                Row::new(S::WaitCapClosed, E::Cancel, send_cancelled, S::End),
                Row::new(S::WaitCapClosed, E::Abort, abandon, S::End),
                Row::new(S::WaitFinal, E::CapOpen, cap_opened, S::WaitCapClosed),
                Row::new(S::WaitFinal, E::CapClosed, hold, S::WaitFinal),
                Row::new(S::WaitFinal, E::LibraryBusy, hold, S::WaitFinal),
                Row::new(S::WaitFinal, E::LhResponse, send_final, S::End),
                Row::new(S::WaitFinal, E::Timeout, fail_process, S::End),
                Row::new(S::WaitFinal, E::Cancel, send_cancelled, S::End),
                Row::new(S::WaitFinal, E::Abort, abandon, S::End),
            ],
        ],
    )
}

fn vary() -> Result<StateTable, TableError> {
    let mut waiting = waiting_rows();
    for row in &mut waiting {
        if row.state == S::WaitLh && row.event == E::LibraryBusy {
            row.action = vary_busy;
        }
    }
    build(
        TableId::Vary,
        SIMPLE_STIMULI,
        [
            vec![
                Row::new(S::Start, E::Start, request_lh, S::WaitLh),
                Row::new(S::ForcedOffline, E::Start, request_lh, S::WaitLh),
            ],
            waiting,
            closing_rows(),
        ],
    )
}

/// Every state table, loaded once per process.
#[derive(Debug)]
pub struct Tables {
    simple: StateTable,
    query: StateTable,
    audit: StateTable,
    eject_enter: StateTable,
    vary: StateTable,
}

impl Tables {
    pub fn load() -> Result<Self, TableError> {
        Ok(Self {
            simple: simple()?,
            query: query()?,
            audit: audit()?,
            eject_enter: eject_enter()?,
            vary: vary()?,
        })
    }

    pub fn get(&self, id: TableId) -> &StateTable {
        match id {
            TableId::Simple => &self.simple,
            TableId::Query => &self.query,
            TableId::Audit => &self.audit,
            TableId::EjectEnter => &self.eject_enter,
            TableId::Vary => &self.vary,
        }
    }

    pub fn all(&self) -> [&StateTable; 5] {
        [
            &self.simple,
            &self.query,
            &self.audit,
            &self.eject_enter,
            &self.vary,
        ]
    }

    #[cfg(test)]
    pub fn with_simple(simple: StateTable) -> Result<Self, TableError> {
        Ok(Self {
            simple,
            ..Self::load()?
        })
    }
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Loads the process-wide tables on first use.
pub fn install() -> Result<&'static Tables, TableError> {
    if let Some(tables) = TABLES.get() {
        return Ok(tables);
    }
    let loaded = Tables::load()?;
    Ok(TABLES.get_or_init(|| loaded))
}
