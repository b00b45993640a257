//! Table-driven execution of accepted requests.

pub mod clock;
pub mod machine;
pub mod scheduler;
pub mod table;
pub mod tables;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::qm::{MemberId, QmError};
use crate::wire::ident::MessageId;
use crate::wire::packet::Request;
use crate::wire::status::Status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{Effect, Scheduler, TaskConfig};
pub use table::TableId;

pub type TaskId = MessageId;

/// Longest follow-up chain a single stimulus may cause.
pub const MAX_CHAIN: usize = 64;

/// Upper bound on any wait, about 68 years.
pub const FOREVER: Duration = Duration::from_secs(i32::MAX as u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Start,
    WaitLh,
    WaitBusy,
    WaitCapClosed,
    WaitFinal,
    ForcedOffline,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Start,
    LhResponse,
    LhProgress,
    CapOpen,
    CapClosed,
    LibraryBusy,
    Timeout,
    Cancel,
    Abort,
    Retry,
    GiveUp,
    Local,
    Remote,
}

/// What an action asks the machine to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Look the event up again after moving to the row's next state.
    Event(Event),
    /// Wait in the row's next state; `wake` is delivered if nothing else
    /// arrives within `timeout`.
    Suspend { timeout: Duration, wake: Event },
    Switch {
        table: TableId,
        state: TaskState,
        event: Event,
    },
    Terminate,
    Exit,
    /// Resume the wait interrupted by the current stimulus.
    Continue,
}

/// A wait that a stimulus interrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavedWait {
    pub event: Event,
    pub wake_at: Option<DateTime<Utc>>,
}

/// One accepted request on its way through a state table.
#[derive(Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub table: TableId,
    pub state: TaskState,
    pub event: Event,
    pub wake_at: Option<DateTime<Utc>>,
    pub request: Request,
    pub last_status: Status,
    pub saved: Option<SavedWait>,
    /// Sequence number of the outstanding library handler request.
    pub lh_seq: Option<u32>,
    pub retries: u32,
    pub forced: bool,
    pub slot: MemberId,
}

impl Task {
    pub fn new(id: TaskId, slot: MemberId, request: Request) -> Self {
        Self {
            id,
            table: TableId::for_command(request.header.command),
            state: TaskState::Start,
            event: Event::Start,
            wake_at: None,
            request,
            last_status: Status::SUCCESS,
            saved: None,
            lh_seq: None,
            retries: 0,
            forced: false,
            slot,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.wake_at.is_some_and(|wake_at| wake_at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    TableGap {
        table: TableId,
        state: TaskState,
        event: Event,
    },
    IllegalEvent {
        table: TableId,
        event: Event,
    },
    RunawayChain {
        table: TableId,
        state: TaskState,
    },
    NothingToContinue {
        task: TaskId,
    },
    Exhausted(QmError),
    Slots(QmError),
    UnknownTask {
        task: TaskId,
    },
    UnknownSequence {
        seq: u32,
    },
    SequenceMismatch {
        task: TaskId,
        expected: Option<u32>,
        actual: u32,
    },
}

impl TaskError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Errors that end the task they occurred in.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TableGap { .. }
                | Self::RunawayChain { .. }
                | Self::NothingToContinue { .. }
                | Self::SequenceMismatch { .. }
        )
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableGap {
                table,
                state,
                event,
            } => write!(f, "table {table:?} has no row for {state:?}/{event:?}"),
            Self::IllegalEvent { table, event } => {
                write!(f, "event {event:?} is not accepted by table {table:?}")
            }
            Self::RunawayChain { table, state } => write!(
                f,
                "table {table:?} chained more than {MAX_CHAIN} events from {state:?}"
            ),
            Self::NothingToContinue { task } => {
                write!(f, "task {task} continued without an interrupted wait")
            }
            Self::Exhausted(source) => write!(f, "no task slot available: {source}"),
            Self::Slots(source) => write!(f, "task slot bookkeeping failed: {source}"),
            Self::UnknownTask { task } => write!(f, "task {task} not found"),
            Self::UnknownSequence { seq } => {
                write!(f, "no task is waiting on library handler sequence {seq}")
            }
            Self::SequenceMismatch {
                task,
                expected,
                actual,
            } => match expected {
                Some(expected) => write!(
                    f,
                    "task {task} expected library handler sequence {expected}, got {actual}"
                ),
                None => write!(
                    f,
                    "task {task} has no outstanding library handler request, got sequence {actual}"
                ),
            },
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Exhausted(source) | Self::Slots(source) => Some(source),
            _ => None,
        }
    }
}

impl From<QmError> for TaskError {
    fn from(value: QmError) -> Self {
        if value.is_retryable() {
            Self::Exhausted(value)
        } else {
            Self::Slots(value)
        }
    }
}
