use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::task::machine::Context;
use crate::task::{Event, Outcome, Task, TaskState};
use crate::wire::types::Command;

/// Identifies one of the process-wide state tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableId {
    Simple,
    Query,
    Audit,
    EjectEnter,
    Vary,
}

impl TableId {
    pub fn for_command(command: Command) -> Self {
        match command {
            Command::Query => Self::Query,
            Command::Audit => Self::Audit,
            Command::Eject | Command::Enter => Self::EjectEnter,
            Command::Vary => Self::Vary,
            _ => Self::Simple,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Query => "query",
            Self::Audit => "audit",
            Self::EjectEnter => "eject_enter",
            Self::Vary => "vary",
        }
    }
}

pub type Action = fn(&mut Task, &mut Context<'_>) -> Outcome;

#[derive(Clone, Copy)]
pub struct Row {
    pub state: TaskState,
    pub event: Event,
    pub action: Action,
    pub next: TaskState,
}

impl Row {
    pub const fn new(state: TaskState, event: Event, action: Action, next: TaskState) -> Self {
        Self {
            state,
            event,
            action,
            next,
        }
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("state", &self.state)
            .field("event", &self.event)
            .field("next", &self.next)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    Empty { table: TableId },
    BadFirstRow { table: TableId },
    NoTerminalRow { table: TableId },
    DuplicateRow {
        table: TableId,
        state: TaskState,
        event: Event,
    },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { table } => write!(f, "table {} has no rows", table.as_str()),
            Self::BadFirstRow { table } => {
                write!(f, "table {} does not open with START/START", table.as_str())
            }
            Self::NoTerminalRow { table } => {
                write!(f, "table {} never reaches END", table.as_str())
            }
            Self::DuplicateRow {
                table,
                state,
                event,
            } => write!(
                f,
                "table {} lists {state:?}/{event:?} more than once",
                table.as_str()
            ),
        }
    }
}

impl std::error::Error for TableError {}

/// Ordered rows for one command family. The first row starts the task;
/// the last row ends it.
#[derive(Debug)]
pub struct StateTable {
    id: TableId,
    rows: Vec<Row>,
    /// Events that may arrive from outside the table's own actions.
    stimuli: &'static [Event],
}

impl StateTable {
    pub fn new(
        id: TableId,
        stimuli: &'static [Event],
        rows: Vec<Row>,
    ) -> Result<Self, TableError> {
        let first = rows.first().ok_or(TableError::Empty { table: id })?;
        if first.state != TaskState::Start || first.event != Event::Start {
            return Err(TableError::BadFirstRow { table: id });
        }
        if rows.last().map(|row| row.next) != Some(TaskState::End) {
            return Err(TableError::NoTerminalRow { table: id });
        }
        let mut seen = HashSet::with_capacity(rows.len());
        if let Some(row) = rows.iter().find(|row| !seen.insert((row.state, row.event))) {
            return Err(TableError::DuplicateRow {
                table: id,
                state: row.state,
                event: row.event,
            });
        }
        Ok(Self { id, rows, stimuli })
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn lookup(&self, state: TaskState, event: Event) -> Option<&Row> {
        self.rows
            .iter()
            .find(|row| row.state == state && row.event == event)
    }

    pub fn accepts(&self, event: Event) -> bool {
        self.stimuli.contains(&event)
    }

    pub fn stimuli(&self) -> &'static [Event] {
        self.stimuli
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}
