//! Process-wide store of numbered queues holding fixed-size records.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub type QueueId = u32;
pub type MemberId = u32;

/// Where a member is placed on creation, or which member to locate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
    /// Relative to the queue's last accessed member; locate only.
    Next,
    /// Relative to the queue's last accessed member; locate only.
    Previous,
    Before(MemberId),
    After(MemberId),
    /// Zero-based index.
    At(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QmError {
    QueueLimitReached { limit: usize },
    QueueNotFound { queue: QueueId },
    QueueFull { queue: QueueId, max_members: usize },
    MemberNotFound { queue: QueueId, member: MemberId },
    InvalidPosition { queue: QueueId, position: Position },
    NotInitialized,
    AlreadyInitialized,
    AuditFailed { queue: QueueId, reason: String },
}

impl QmError {
    /// Exhaustion clears once other work releases queues or members.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueLimitReached { .. } | Self::QueueFull { .. })
    }
}

impl fmt::Display for QmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueLimitReached { limit } => {
                write!(f, "queue limit of {limit} reached")
            }
            Self::QueueNotFound { queue } => write!(f, "queue {queue} not found"),
            Self::QueueFull { queue, max_members } => {
                write!(f, "queue {queue} is full ({max_members} members)")
            }
            Self::MemberNotFound { queue, member } => {
                write!(f, "member {member} not found in queue {queue}")
            }
            Self::InvalidPosition { queue, position } => {
                write!(f, "position {position:?} is not valid for queue {queue}")
            }
            Self::NotInitialized => write!(f, "queue manager is not initialized"),
            Self::AlreadyInitialized => write!(f, "queue manager is already initialized"),
            Self::AuditFailed { queue, reason } => {
                write!(f, "audit of queue {queue} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for QmError {}

#[derive(Clone, Debug)]
struct Member {
    id: MemberId,
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct Queue {
    id: QueueId,
    /// Zero means unbounded.
    max_members: usize,
    member_count: usize,
    members: Vec<Member>,
    next_member_id: MemberId,
    last_accessed: Option<MemberId>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    audited_at: Option<DateTime<Utc>>,
    remarks: String,
}

impl Queue {
    fn index_of(&self, member: MemberId) -> Result<usize, QmError> {
        self.members
            .iter()
            .position(|m| m.id == member)
            .ok_or(QmError::MemberNotFound {
                queue: self.id,
                member,
            })
    }

    /// Next free member id; wraps past `MemberId::MAX` and skips live ids.
    fn allocate_member_id(&mut self) -> MemberId {
        loop {
            let id = self.next_member_id;
            self.next_member_id = self.next_member_id.wrapping_add(1).max(1);
            if self.members.iter().all(|member| member.id != id) {
                return id;
            }
        }
    }

    fn is_full(&self) -> bool {
        self.max_members != 0 && self.member_count >= self.max_members
    }

    fn insertion_index(&self, position: Position) -> Result<usize, QmError> {
        match position {
            Position::First => Ok(0),
            Position::Last => Ok(self.members.len()),
            Position::Before(member) => self.index_of(member),
            Position::After(member) => self.index_of(member).map(|index| index + 1),
            Position::At(index) => Ok(index.min(self.members.len())),
            Position::Next | Position::Previous => Err(QmError::InvalidPosition {
                queue: self.id,
                position,
            }),
        }
    }

    /// `None` when the position names no member.
    fn located_index(&self, position: Position) -> Result<Option<usize>, QmError> {
        let len = self.members.len();
        let after = |index: usize| (index + 1 < len).then_some(index + 1);
        Ok(match position {
            Position::First => (len > 0).then_some(0),
            Position::Last => len.checked_sub(1),
            Position::At(index) => (index < len).then_some(index),
            Position::Before(member) => self.index_of(member)?.checked_sub(1),
            Position::After(member) => after(self.index_of(member)?),
            Position::Next => match self.last_accessed {
                Some(member) => after(self.index_of(member)?),
                None => (len > 0).then_some(0),
            },
            Position::Previous => match self.last_accessed {
                Some(member) => self.index_of(member)?.checked_sub(1),
                None => len.checked_sub(1),
            },
        })
    }

    fn status(&self) -> QueueStatus {
        QueueStatus {
            id: self.id,
            max_members: self.max_members,
            members: self.member_count,
            last_accessed: self.last_accessed,
            created_at: self.created_at,
            modified_at: self.modified_at,
            audited_at: self.audited_at,
            remarks: self.remarks.clone(),
        }
    }

    fn audit(&mut self, now: DateTime<Utc>) -> Result<(), QmError> {
        let fail = |reason: String| QmError::AuditFailed {
            queue: self.id,
            reason,
        };
        if self.member_count != self.members.len() {
            return Err(fail(format!(
                "member count {} differs from {} live members",
                self.member_count,
                self.members.len()
            )));
        }
        let mut seen = HashSet::with_capacity(self.members.len());
        if let Some(duplicate) = self.members.iter().find(|m| !seen.insert(m.id)) {
            return Err(fail(format!("member id {} appears twice", duplicate.id)));
        }
        if self.max_members != 0 && self.member_count > self.max_members {
            return Err(fail(format!(
                "{} members exceed the limit of {}",
                self.member_count, self.max_members
            )));
        }
        self.audited_at = Some(now);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberStatus {
    pub id: MemberId,
    pub size: usize,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub id: QueueId,
    pub max_members: usize,
    pub members: usize,
    pub last_accessed: Option<MemberId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub audited_at: Option<DateTime<Utc>>,
    pub remarks: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManagerStatus {
    pub max_queues: usize,
    pub queues: Vec<QueueId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct QueueManager {
    max_queues: usize,
    queues: BTreeMap<QueueId, Queue>,
    next_queue_id: QueueId,
    created_at: DateTime<Utc>,
}

impl QueueManager {
    pub fn new(max_queues: usize) -> Self {
        Self {
            max_queues,
            queues: BTreeMap::new(),
            next_queue_id: 1,
            created_at: Utc::now(),
        }
    }

    fn queue(&self, queue: QueueId) -> Result<&Queue, QmError> {
        self.queues.get(&queue).ok_or(QmError::QueueNotFound { queue })
    }

    fn queue_mut(&mut self, queue: QueueId) -> Result<&mut Queue, QmError> {
        self.queues
            .get_mut(&queue)
            .ok_or(QmError::QueueNotFound { queue })
    }

    fn allocate_queue_id(&mut self) -> QueueId {
        loop {
            let id = self.next_queue_id;
            self.next_queue_id = self.next_queue_id.wrapping_add(1).max(1);
            if !self.queues.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn create_queue(
        &mut self,
        max_members: usize,
        remarks: impl Into<String>,
    ) -> Result<QueueId, QmError> {
        if self.queues.len() >= self.max_queues {
            return Err(QmError::QueueLimitReached {
                limit: self.max_queues,
            });
        }
        let id = self.allocate_queue_id();
        let now = Utc::now();
        self.queues.insert(
            id,
            Queue {
                id,
                max_members,
                member_count: 0,
                members: Vec::new(),
                next_member_id: 1,
                last_accessed: None,
                created_at: now,
                modified_at: now,
                audited_at: None,
                remarks: remarks.into(),
            },
        );
        Ok(id)
    }

    pub fn delete_queue(&mut self, queue: QueueId) -> Result<(), QmError> {
        self.queues
            .remove(&queue)
            .map(|_| ())
            .ok_or(QmError::QueueNotFound { queue })
    }

    /// Adds a member of `size` zero bytes.
    pub fn create_member(
        &mut self,
        queue: QueueId,
        position: Position,
        size: usize,
    ) -> Result<MemberId, QmError> {
        let target = self.queue_mut(queue)?;
        if target.is_full() {
            return Err(QmError::QueueFull {
                queue,
                max_members: target.max_members,
            });
        }
        let index = target.insertion_index(position)?;
        let id = target.allocate_member_id();
        let now = Utc::now();
        target.members.insert(
            index,
            Member {
                id,
                data: vec![0; size],
                created_at: now,
                modified_at: now,
            },
        );
        target.member_count += 1;
        target.modified_at = now;
        Ok(id)
    }

    pub fn delete_member(&mut self, queue: QueueId, member: MemberId) -> Result<(), QmError> {
        let target = self.queue_mut(queue)?;
        let index = target.index_of(member)?;
        target.members.remove(index);
        target.member_count -= 1;
        if target.last_accessed == Some(member) {
            target.last_accessed = None;
        }
        target.modified_at = Utc::now();
        Ok(())
    }

    /// Runs `f` over the member's data.
    pub fn access_member<R>(
        &mut self,
        queue: QueueId,
        member: MemberId,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, QmError> {
        let target = self.queue_mut(queue)?;
        let index = target.index_of(member)?;
        target.last_accessed = Some(member);
        let entry = &mut target.members[index];
        entry.modified_at = Utc::now();
        Ok(f(&mut entry.data))
    }

    pub fn locate_member(
        &mut self,
        queue: QueueId,
        position: Position,
    ) -> Result<MemberId, QmError> {
        let target = self.queue_mut(queue)?;
        let index = target
            .located_index(position)?
            .ok_or(QmError::InvalidPosition { queue, position })?;
        let id = target.members[index].id;
        target.last_accessed = Some(id);
        Ok(id)
    }

    pub fn find_member(&self, queue: QueueId, data: &[u8]) -> Result<Option<MemberId>, QmError> {
        Ok(self
            .queue(queue)?
            .members
            .iter()
            .find(|member| member.data == data)
            .map(|member| member.id))
    }

    pub fn member_ids(&self, queue: QueueId) -> Result<Vec<MemberId>, QmError> {
        Ok(self.queue(queue)?.members.iter().map(|m| m.id).collect())
    }

    pub fn member_status(
        &self,
        queue: QueueId,
        member: MemberId,
    ) -> Result<MemberStatus, QmError> {
        let target = self.queue(queue)?;
        let entry = &target.members[target.index_of(member)?];
        Ok(MemberStatus {
            id: entry.id,
            size: entry.data.len(),
            created_at: entry.created_at,
            modified_at: entry.modified_at,
        })
    }

    pub fn queue_status(&self, queue: QueueId) -> Result<QueueStatus, QmError> {
        Ok(self.queue(queue)?.status())
    }

    pub fn manager_status(&self) -> ManagerStatus {
        ManagerStatus {
            max_queues: self.max_queues,
            queues: self.queues.keys().copied().collect(),
            created_at: self.created_at,
        }
    }

    /// Checks one queue, or every queue when `queue` is `None`.
    pub fn audit(&mut self, queue: Option<QueueId>) -> Result<(), QmError> {
        let now = Utc::now();
        match queue {
            Some(queue) => self.queue_mut(queue)?.audit(now),
            None => self.queues.values_mut().try_for_each(|queue| queue.audit(now)),
        }
    }

    /// Purges members last modified more than `max_age` ago.
    pub fn clean(&mut self, queue: QueueId, max_age: Duration) -> Result<Vec<MemberId>, QmError> {
        self.clean_before(queue, Utc::now() - max_age)
    }

    pub fn clean_before(
        &mut self,
        queue: QueueId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<MemberId>, QmError> {
        let target = self.queue_mut(queue)?;
        let mut purged = Vec::new();
        target.members.retain(|member| {
            let stale = member.modified_at < cutoff;
            if stale {
                purged.push(member.id);
            }
            !stale
        });
        if !purged.is_empty() {
            target.member_count -= purged.len();
            if target
                .last_accessed
                .is_some_and(|member| purged.contains(&member))
            {
                target.last_accessed = None;
            }
            target.modified_at = Utc::now();
        }
        Ok(purged)
    }
}

static MANAGER: Mutex<Option<QueueManager>> = Mutex::new(None);

pub fn initialize(max_queues: usize) -> Result<(), QmError> {
    let mut slot = MANAGER.lock().expect("queue manager mutex poisoned");
    if slot.is_some() {
        return Err(QmError::AlreadyInitialized);
    }
    *slot = Some(QueueManager::new(max_queues));
    Ok(())
}

/// Runs `f` against the process-wide manager under its lock.
pub fn with_manager<R>(
    f: impl FnOnce(&mut QueueManager) -> Result<R, QmError>,
) -> Result<R, QmError> {
    let mut slot = MANAGER.lock().expect("queue manager mutex poisoned");
    let manager = slot.as_mut().ok_or(QmError::NotInitialized)?;
    f(manager)
}

pub fn teardown() -> Result<(), QmError> {
    let mut slot = MANAGER.lock().expect("queue manager mutex poisoned");
    slot.take().map(|_| ()).ok_or(QmError::NotInitialized)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{Position, QmError, QueueManager};

    fn manager_with_queue(max_members: usize) -> (QueueManager, u32) {
        let mut qm = QueueManager::new(4);
        let queue = qm
            .create_queue(max_members, "test queue")
            .expect("queue should be created");
        (qm, queue)
    }

    #[test]
    fn queue_limit_is_enforced_and_retryable() {
        let mut qm = QueueManager::new(2);
        qm.create_queue(0, "a").expect("first queue");
        let second = qm.create_queue(0, "b").expect("second queue");
        let err = qm.create_queue(0, "c").expect_err("third queue exceeds limit");
        assert!(matches!(err, QmError::QueueLimitReached { limit: 2 }));
        assert!(err.is_retryable());

        qm.delete_queue(second).expect("delete second");
        qm.create_queue(0, "c").expect("room again after delete");
        assert_eq!(qm.manager_status().queues.len(), 2);
    }

    #[test]
    fn ids_wrap_around_and_skip_live_entries() {
        let (mut qm, queue) = manager_with_queue(0);
        let target = qm.queues.get_mut(&queue).expect("queue exists");
        target.next_member_id = u32::MAX;

        let last = qm
            .create_member(queue, Position::Last, 1)
            .expect("member at the top of the id range");
        let wrapped = qm
            .create_member(queue, Position::Last, 1)
            .expect("member after wrapping");
        assert_eq!(last, u32::MAX);
        assert_eq!(wrapped, 1);

        qm.queues.get_mut(&queue).expect("queue exists").next_member_id = 1;
        let skipped = qm
            .create_member(queue, Position::Last, 1)
            .expect("live id 1 is skipped");
        assert_eq!(skipped, 2);

        qm.next_queue_id = u32::MAX;
        assert_eq!(qm.create_queue(0, "top").expect("queue at the top"), u32::MAX);
        assert_eq!(qm.create_queue(0, "wrapped").expect("queue after wrapping"), 2);
    }

    #[test]
    fn one_more_than_max_members_fails() {
        let (mut qm, queue) = manager_with_queue(3);
        for _ in 0..3 {
            qm.create_member(queue, Position::Last, 8).expect("member fits");
        }
        let err = qm
            .create_member(queue, Position::Last, 8)
            .expect_err("fourth member exceeds limit");
        assert!(matches!(err, QmError::QueueFull { max_members: 3, .. }));
        assert!(err.is_retryable());

        let status = qm.queue_status(queue).expect("status");
        assert_eq!(status.members, qm.member_ids(queue).expect("ids").len());
    }

    #[test]
    fn members_are_placed_by_position() {
        let (mut qm, queue) = manager_with_queue(0);
        let a = qm.create_member(queue, Position::Last, 1).expect("a");
        let c = qm.create_member(queue, Position::Last, 1).expect("c");
        let b = qm.create_member(queue, Position::After(a), 1).expect("b");
        let first = qm.create_member(queue, Position::First, 1).expect("first");
        let before_c = qm.create_member(queue, Position::Before(c), 1).expect("before c");
        let appended = qm.create_member(queue, Position::At(99), 1).expect("past end appends");
        let second = qm.create_member(queue, Position::At(1), 1).expect("at 1");

        assert_eq!(
            qm.member_ids(queue).expect("ids"),
            vec![first, second, a, b, before_c, c, appended]
        );
    }

    #[test]
    fn next_and_previous_are_creation_errors() {
        let (mut qm, queue) = manager_with_queue(0);
        let err = qm
            .create_member(queue, Position::Next, 1)
            .expect_err("next is locate only");
        assert!(matches!(err, QmError::InvalidPosition { .. }));
    }

    #[test]
    fn locate_walks_from_the_last_accessed_member() {
        let (mut qm, queue) = manager_with_queue(0);
        let ids = (0..3)
            .map(|_| qm.create_member(queue, Position::Last, 1).expect("member"))
            .collect::<Vec<_>>();

        assert_eq!(qm.locate_member(queue, Position::Next).expect("first"), ids[0]);
        assert_eq!(qm.locate_member(queue, Position::Next).expect("second"), ids[1]);
        assert_eq!(qm.locate_member(queue, Position::Next).expect("third"), ids[2]);
        let err = qm
            .locate_member(queue, Position::Next)
            .expect_err("nothing after the last member");
        assert!(matches!(err, QmError::InvalidPosition { .. }));
        assert_eq!(
            qm.locate_member(queue, Position::Previous).expect("back one"),
            ids[1]
        );
        assert_eq!(
            qm.locate_member(queue, Position::Before(ids[1])).expect("before"),
            ids[0]
        );
        assert_eq!(qm.locate_member(queue, Position::At(2)).expect("at"), ids[2]);
        assert_eq!(
            qm.queue_status(queue).expect("status").last_accessed,
            Some(ids[2])
        );
    }

    #[test]
    fn access_updates_data_and_last_accessed() {
        let (mut qm, queue) = manager_with_queue(0);
        let member = qm.create_member(queue, Position::Last, 4).expect("member");
        let before = qm.member_status(queue, member).expect("status");
        assert_eq!(before.size, 4);

        qm.access_member(queue, member, |data| data.copy_from_slice(&[1, 2, 3, 4]))
            .expect("access");
        assert_eq!(
            qm.find_member(queue, &[1, 2, 3, 4]).expect("find"),
            Some(member)
        );
        assert_eq!(qm.find_member(queue, &[0; 4]).expect("find"), None);

        let after = qm.member_status(queue, member).expect("status");
        assert!(after.modified_at >= before.modified_at);
        assert_eq!(
            qm.queue_status(queue).expect("status").last_accessed,
            Some(member)
        );
    }

    #[test]
    fn missing_queue_and_member_are_reported() {
        let (mut qm, queue) = manager_with_queue(0);
        assert!(matches!(
            qm.delete_queue(77),
            Err(QmError::QueueNotFound { queue: 77 })
        ));
        assert!(matches!(
            qm.delete_member(queue, 5),
            Err(QmError::MemberNotFound { member: 5, .. })
        ));
    }

    #[test]
    fn audit_stamps_consistent_queues() {
        let (mut qm, queue) = manager_with_queue(2);
        qm.create_member(queue, Position::Last, 1).expect("member");
        qm.audit(Some(queue)).expect("consistent queue");
        assert!(qm.queue_status(queue).expect("status").audited_at.is_some());

        qm.queues
            .get_mut(&queue)
            .expect("queue exists")
            .member_count = 2;
        let err = qm.audit(None).expect_err("count drifted");
        assert!(matches!(err, QmError::AuditFailed { .. }));
    }

    #[test]
    fn clean_purges_stale_members_only() {
        let (mut qm, queue) = manager_with_queue(0);
        let a = qm.create_member(queue, Position::Last, 1).expect("a");
        let b = qm.create_member(queue, Position::Last, 1).expect("b");

        let none = qm
            .clean_before(queue, Utc::now() - Duration::seconds(60))
            .expect("clean");
        assert!(none.is_empty());
        assert!(qm.clean(queue, Duration::hours(1)).expect("clean").is_empty());

        let purged = qm
            .clean_before(queue, Utc::now() + Duration::seconds(1))
            .expect("clean");
        assert_eq!(purged, vec![a, b]);
        assert_eq!(qm.queue_status(queue).expect("status").members, 0);
        qm.audit(Some(queue)).expect("still consistent");
    }

    // The only test that touches the process-wide store.
    #[test]
    fn process_wide_manager_lifecycle() {
        assert!(matches!(
            super::with_manager(|qm| Ok(qm.manager_status())),
            Err(QmError::NotInitialized)
        ));
        super::initialize(1).expect("first initialize");
        assert!(matches!(
            super::initialize(1),
            Err(QmError::AlreadyInitialized)
        ));

        let queue = super::with_manager(|qm| qm.create_queue(0, "slots")).expect("queue");
        let member = super::with_manager(|qm| qm.create_member(queue, Position::Last, 2))
            .expect("member");
        let ids = super::with_manager(|qm| qm.member_ids(queue)).expect("ids");
        assert_eq!(ids, vec![member]);

        super::teardown().expect("teardown");
        assert!(matches!(super::teardown(), Err(QmError::NotInitialized)));
    }
}
