//! Owns live tasks, hands out library handler sequence numbers and feeds
//! stimuli, timeouts and cancellations through the tables.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::lh::{LhReply, LhRequest, LhResponse};
use crate::logging::{LogLevel, Logger};
use crate::qm::{self, MemberId, Position, QmError, QueueId, QueueManager};
use crate::task::clock::Clock;
use crate::task::machine::{dispatch, Context, Disposition, Sequencer};
use crate::task::tables::Tables;
use crate::task::{Event, SavedWait, Task, TaskError, TaskId};
use crate::wire::packet::{Request, Response};
use crate::wire::record::ResponseStatus;
use crate::wire::request::RequestBody;
use crate::wire::response::ResponseBody;
use crate::wire::status::Status;

const SLOT_SIZE: usize = std::mem::size_of::<TaskId>();

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    pub busy_retry: Duration,
    pub lh_timeout: Duration,
    pub max_retries: u32,
    /// Zero means unbounded.
    pub task_slots: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            busy_retry: Duration::from_secs(15),
            lh_timeout: Duration::from_secs(300),
            max_retries: 3,
            task_slots: 256,
        }
    }
}

/// Work a dispatch produced for the caller to carry out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Lh(LhRequest),
    Respond { task: TaskId, response: Response },
    Finished { task: TaskId },
}

enum SlotStore {
    Shared(QueueId),
    Owned(QueueManager, QueueId),
}

impl SlotStore {
    fn with<R>(
        &mut self,
        f: impl FnOnce(&mut QueueManager, QueueId) -> Result<R, QmError>,
    ) -> Result<R, QmError> {
        match self {
            Self::Shared(queue) => {
                let queue = *queue;
                qm::with_manager(|manager| f(manager, queue))
            }
            Self::Owned(manager, queue) => f(manager, *queue),
        }
    }
}

fn lh_event(reply: &LhReply) -> Event {
    match reply {
        LhReply::Final { .. } => Event::LhResponse,
        LhReply::Progress { .. } => Event::LhProgress,
        LhReply::CapOpen { .. } => Event::CapOpen,
        LhReply::CapClosed => Event::CapClosed,
        LhReply::Busy => Event::LibraryBusy,
    }
}

pub struct Scheduler {
    config: TaskConfig,
    tables: &'static Tables,
    clock: Box<dyn Clock>,
    slots: SlotStore,
    logger: Arc<Logger>,
    tasks: HashMap<TaskId, Task>,
    by_seq: HashMap<u32, TaskId>,
    sequencer: Sequencer,
    next_task: TaskId,
    outbox: Vec<Effect>,
}

impl Scheduler {
    /// Keeps task slots in the process-wide queue manager.
    pub fn shared(
        config: TaskConfig,
        tables: &'static Tables,
        clock: Box<dyn Clock>,
        logger: Arc<Logger>,
    ) -> Result<Self, TaskError> {
        let queue =
            qm::with_manager(|manager| manager.create_queue(config.task_slots, "task slots"))
                .map_err(TaskError::Slots)?;
        Ok(Self::with_slots(config, tables, clock, logger, SlotStore::Shared(queue)))
    }

    /// Keeps task slots in a private queue manager.
    pub fn isolated(
        config: TaskConfig,
        tables: &'static Tables,
        clock: Box<dyn Clock>,
        logger: Arc<Logger>,
    ) -> Result<Self, TaskError> {
        let mut manager = QueueManager::new(1);
        let queue = manager
            .create_queue(config.task_slots, "task slots")
            .map_err(TaskError::Slots)?;
        Ok(Self::with_slots(
            config,
            tables,
            clock,
            logger,
            SlotStore::Owned(manager, queue),
        ))
    }

    fn with_slots(
        config: TaskConfig,
        tables: &'static Tables,
        clock: Box<dyn Clock>,
        logger: Arc<Logger>,
        slots: SlotStore,
    ) -> Self {
        Self {
            config,
            tables,
            clock,
            slots,
            logger,
            tasks: HashMap::new(),
            by_seq: HashMap::new(),
            sequencer: Sequencer::default(),
            next_task: 1,
            outbox: Vec::new(),
        }
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn task(&self, task: TaskId) -> Option<&Task> {
        self.tasks.get(&task)
    }

    pub fn next_wake(&self) -> Option<DateTime<Utc>> {
        self.tasks.values().filter_map(|task| task.wake_at).min()
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }

    fn allocate_id(&mut self) -> TaskId {
        loop {
            let id = self.next_task;
            self.next_task = self.next_task.wrapping_add(1).max(1);
            if !self.tasks.contains_key(&id) {
                return id;
            }
        }
    }

    /// Accepts a canonical request and starts its table.
    pub fn submit(&mut self, request: Request) -> Result<TaskId, TaskError> {
        let slot = self
            .slots
            .with(|manager, queue| manager.create_member(queue, Position::Last, SLOT_SIZE))?;
        let id = self.allocate_id();
        if let Err(err) = self.slots.with(|manager, queue| {
            manager.access_member(queue, slot, |data| data.copy_from_slice(&id.to_be_bytes()))
        }) {
            if let Err(cleanup) = self
                .slots
                .with(|manager, queue| manager.delete_member(queue, slot))
            {
                self.logger.warn(
                    Some("task::scheduler"),
                    &format!("slot {slot} left behind after a failed submit: {cleanup}"),
                );
            }
            return Err(err.into());
        }
        self.logger.debug(
            Some("task::scheduler"),
            &format!("task {id} accepted for {}", request.header.command),
        );
        if let RequestBody::Cancel { request: target } = request.body {
            if let Err(err) = self.cancel(target) {
                self.logger.debug(
                    Some("task::scheduler"),
                    &format!("cancel of task {target} by task {id} found nothing: {err}"),
                );
            }
        }
        self.tasks.insert(id, Task::new(id, slot, request));
        // A failed start has already answered the client through `fail`.
        let _ = self.run(id, Event::Start, None);
        Ok(id)
    }

    /// Routes a library handler reply to the task waiting on its sequence.
    pub fn deliver(&mut self, response: LhResponse) -> Result<(), TaskError> {
        let id = *self
            .by_seq
            .get(&response.seq)
            .ok_or(TaskError::UnknownSequence { seq: response.seq })?;
        let task = self.tasks.get(&id).ok_or(TaskError::UnknownTask { task: id })?;
        if task.lh_seq != Some(response.seq) {
            let err = TaskError::SequenceMismatch {
                task: id,
                expected: task.lh_seq,
                actual: response.seq,
            };
            self.fail(id, &err);
            return Err(err);
        }
        self.stimulate(id, lh_event(&response.reply), Some(&response.reply))
    }

    pub fn cancel(&mut self, task: TaskId) -> Result<(), TaskError> {
        self.stimulate(task, Event::Cancel, None)
    }

    /// Ends a task without answering its client.
    pub fn abort(&mut self, task: TaskId) -> Result<(), TaskError> {
        self.stimulate(task, Event::Abort, None)
    }

    /// Wakes every task whose wait has elapsed. Returns how many woke.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let mut due = self
            .tasks
            .values()
            .filter(|task| task.is_due(now))
            .map(|task| (task.wake_at, task.id))
            .collect::<Vec<_>>();
        due.sort();
        for (_, id) in &due {
            let event = match self.tasks.get_mut(id) {
                Some(task) => {
                    task.saved = None;
                    task.event
                }
                None => continue,
            };
            // Failures are logged and the task released inside `run`.
            let _ = self.run(*id, event, None);
        }
        due.len()
    }

    fn stimulate(
        &mut self,
        id: TaskId,
        event: Event,
        reply: Option<&LhReply>,
    ) -> Result<(), TaskError> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or(TaskError::UnknownTask { task: id })?;
        let table = self.tables.get(task.table);
        if !table.accepts(event) {
            return Err(TaskError::IllegalEvent {
                table: task.table,
                event,
            });
        }
        task.saved = Some(SavedWait {
            event: task.event,
            wake_at: task.wake_at,
        });
        self.run(id, event, reply).map(|_| ())
    }

    fn run(
        &mut self,
        id: TaskId,
        event: Event,
        reply: Option<&LhReply>,
    ) -> Result<Disposition, TaskError> {
        let mut task = self
            .tasks
            .remove(&id)
            .ok_or(TaskError::UnknownTask { task: id })?;
        let first_effect = self.outbox.len();
        let mut ctx = Context {
            now: self.clock.now(),
            config: &self.config,
            reply,
            sequencer: &mut self.sequencer,
            effects: &mut self.outbox,
        };
        let result = dispatch(self.tables, &mut task, event, &mut ctx);
        for effect in &self.outbox[first_effect..] {
            if let Effect::Lh(request) = effect {
                self.by_seq.insert(request.seq, id);
            }
        }
        match result {
            Ok(Disposition::Waiting) => {
                self.tasks.insert(id, task);
            }
            Ok(Disposition::Terminated) => {
                self.logger.log(
                    LogLevel::Debug,
                    Some("task::scheduler"),
                    "task finished",
                    Some(json!({
                        "task": id,
                        "table": task.table.as_str(),
                        "status": task.last_status.to_string(),
                    })),
                );
                self.release(&task);
            }
            Ok(Disposition::Exited) => {
                self.logger.warn(
                    Some("task::scheduler"),
                    &format!("task {id} exited without a final response"),
                );
                self.release(&task);
            }
            Err(ref err) => {
                self.tasks.insert(id, task);
                self.fail(id, err);
            }
        }
        result
    }

    /// Ends a task after a fatal error with a PROCESS_FAILURE final.
    fn fail(&mut self, id: TaskId, err: &TaskError) {
        let Some(task) = self.tasks.remove(&id) else {
            return;
        };
        self.logger.log(
            LogLevel::Error,
            Some("task::scheduler"),
            &format!("task {id} failed: {err}"),
            Some(json!({
                "task": id,
                "table": task.table.as_str(),
                "state": task.state,
                "event": task.event,
            })),
        );
        let mut response = Response::answer(
            &task.request.header,
            0,
            ResponseStatus::new(Status::PROCESS_FAILURE),
            ResponseBody::empty_for(task.request.header.command),
        );
        response.ipc.seq_num = task.request.ipc.seq_num;
        self.outbox.push(Effect::Respond { task: id, response });
        self.release(&task);
    }

    fn release(&mut self, task: &Task) {
        let slot: MemberId = task.slot;
        if let Err(err) = self
            .slots
            .with(|manager, queue| manager.delete_member(queue, slot))
        {
            self.logger.warn(
                Some("task::scheduler"),
                &format!("task {} slot release failed: {err}", task.id),
            );
        }
        self.by_seq.retain(|_, owner| *owner != task.id);
        self.outbox.push(Effect::Finished { task: task.id });
    }
}
