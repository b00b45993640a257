//! Row lookup and outcome dispatch for a single task.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::lh::{LhReply, LhRequest};
use crate::task::scheduler::{Effect, TaskConfig};
use crate::task::tables::Tables;
use crate::task::{Event, Outcome, Task, TaskError, FOREVER, MAX_CHAIN};
use crate::wire::packet::Response;
use crate::wire::record::ResponseStatus;
use crate::wire::response::ResponseBody;
use crate::wire::status::Status;

/// Library handler sequence numbers. Zero is never issued.
#[derive(Debug)]
pub struct Sequencer {
    next: u32,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl Sequencer {
    pub fn next(&mut self) -> u32 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        seq
    }
}

/// Everything an action may read or produce.
pub struct Context<'a> {
    pub now: DateTime<Utc>,
    pub config: &'a TaskConfig,
    /// The library handler reply that caused this dispatch, if any.
    pub reply: Option<&'a LhReply>,
    pub sequencer: &'a mut Sequencer,
    pub effects: &'a mut Vec<Effect>,
}

impl Context<'_> {
    pub fn send_lh(&mut self, task: &mut Task) {
        let seq = self.sequencer.next();
        task.lh_seq = Some(seq);
        self.effects.push(Effect::Lh(LhRequest {
            seq,
            task: task.id,
            request: task.request.clone(),
            force: task.forced,
        }));
    }

    pub fn respond(&mut self, task: &Task, options: u8, status: Status, body: ResponseBody) {
        let mut response = Response::answer(
            &task.request.header,
            options,
            ResponseStatus::new(status),
            body,
        );
        response.ipc.seq_num = task.request.ipc.seq_num;
        self.effects.push(Effect::Respond {
            task: task.id,
            response,
        });
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Waiting,
    Terminated,
    Exited,
}

fn wake_time(now: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    let bounded = chrono::Duration::from_std(timeout.min(FOREVER)).unwrap_or_default();
    now + bounded
}

/// Feeds `event` to `task` and follows the resulting chain until the task
/// waits or ends.
pub fn dispatch(
    tables: &Tables,
    task: &mut Task,
    event: Event,
    ctx: &mut Context<'_>,
) -> Result<Disposition, TaskError> {
    let mut event = event;
    for _ in 0..MAX_CHAIN {
        let table = tables.get(task.table);
        let row = *table
            .lookup(task.state, event)
            .ok_or(TaskError::TableGap {
                table: task.table,
                state: task.state,
                event,
            })?;
        task.event = event;
        match (row.action)(task, ctx) {
            Outcome::Event(next) => {
                task.state = row.next;
                event = next;
            }
            Outcome::Suspend { timeout, wake } => {
                task.state = row.next;
                task.event = wake;
                task.wake_at = Some(wake_time(ctx.now, timeout));
                task.saved = None;
                return Ok(Disposition::Waiting);
            }
            Outcome::Switch {
                table,
                state,
                event: next,
            } => {
                task.table = table;
                task.state = state;
                event = next;
            }
            Outcome::Terminate => {
                task.state = row.next;
                task.wake_at = None;
                return Ok(Disposition::Terminated);
            }
            Outcome::Exit => {
                task.wake_at = None;
                return Ok(Disposition::Exited);
            }
            Outcome::Continue => {
                let saved = task
                    .saved
                    .take()
                    .ok_or(TaskError::NothingToContinue { task: task.id })?;
                task.event = saved.event;
                task.wake_at = saved.wake_at;
                return Ok(Disposition::Waiting);
            }
        }
    }
    Err(TaskError::RunawayChain {
        table: task.table,
        state: task.state,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::{dispatch, wake_time, Context, Disposition, Sequencer};
    use crate::task::scheduler::{Effect, TaskConfig};
    use crate::task::table::{Row, StateTable, TableId};
    use crate::task::tables::Tables;
    use crate::task::{Event, Outcome, SavedWait, Task, TaskError, TaskState, FOREVER};
    use crate::wire::header::MessageHeader;
    use crate::wire::packet::Request;
    use crate::wire::request::RequestBody;
    use crate::wire::types::{Command, Version};

    fn idle_task() -> Task {
        Task::new(
            1,
            1,
            Request::new(MessageHeader::new(Command::Idle, Version::V4), RequestBody::Idle),
        )
    }

    fn ping(_task: &mut Task, _ctx: &mut Context<'_>) -> Outcome {
        Outcome::Event(Event::Retry)
    }

    fn resume(_task: &mut Task, _ctx: &mut Context<'_>) -> Outcome {
        Outcome::Continue
    }

    fn looping_tables() -> Tables {
        let table = StateTable::new(
            TableId::Simple,
            &[Event::Cancel],
            vec![
                Row::new(TaskState::Start, Event::Start, ping, TaskState::WaitLh),
                Row::new(TaskState::WaitLh, Event::Retry, ping, TaskState::WaitLh),
                Row::new(TaskState::WaitLh, Event::Cancel, resume, TaskState::End),
            ],
        )
        .expect("valid table");
        Tables::with_simple(table).expect("tables")
    }

    fn run(tables: &Tables, task: &mut Task, event: Event) -> Result<Disposition, TaskError> {
        let config = TaskConfig::default();
        let mut sequencer = Sequencer::default();
        let mut effects: Vec<Effect> = Vec::new();
        let mut ctx = Context {
            now: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("date"),
            config: &config,
            reply: None,
            sequencer: &mut sequencer,
            effects: &mut effects,
        };
        dispatch(tables, task, event, &mut ctx)
    }

    #[test]
    fn sequencer_skips_zero_on_wrap() {
        let mut sequencer = Sequencer { next: u32::MAX };
        assert_eq!(sequencer.next(), u32::MAX);
        assert_eq!(sequencer.next(), 1);
    }

    #[test]
    fn forever_is_about_sixty_eight_years() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("date");
        let years = (wake_time(now, FOREVER) - now).num_days() / 365;
        assert_eq!(years, 68);
        assert_eq!(wake_time(now, Duration::MAX), wake_time(now, FOREVER));
    }

    #[test]
    fn looping_tables_hit_the_chain_bound() {
        let tables = looping_tables();
        let mut task = idle_task();
        let err = run(&tables, &mut task, Event::Start).expect_err("chain never settles");
        assert!(matches!(err, TaskError::RunawayChain { .. }));
    }

    #[test]
    fn missing_rows_are_table_gaps() {
        let tables = looping_tables();
        let mut task = idle_task();
        task.state = TaskState::WaitLh;
        let err = run(&tables, &mut task, Event::Timeout).expect_err("no row");
        assert_eq!(
            err,
            TaskError::TableGap {
                table: TableId::Simple,
                state: TaskState::WaitLh,
                event: Event::Timeout,
            }
        );
    }

    #[test]
    fn continue_restores_the_interrupted_wait() {
        let tables = looping_tables();
        let mut task = idle_task();
        task.state = TaskState::WaitLh;
        let wake_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 15).single();
        task.saved = Some(SavedWait {
            event: Event::Timeout,
            wake_at,
        });
        let disposition = run(&tables, &mut task, Event::Cancel).expect("continue");
        assert_eq!(disposition, Disposition::Waiting);
        assert_eq!(task.event, Event::Timeout);
        assert_eq!(task.wake_at, wake_at);
        assert_eq!(task.state, TaskState::WaitLh);

        let err = run(&tables, &mut task, Event::Cancel).expect_err("nothing saved");
        assert!(matches!(err, TaskError::NothingToContinue { .. }));
    }
}
