use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    FetchPage,
    FetchMore,
    Search,
    SearchMore,
    UpdateMembers,
    DeleteMembers,
    FetchPending,
    ClaimMessages,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::FetchPage => "Fetch Page",
            TaskKind::FetchMore => "Fetch More",
            TaskKind::Search => "Search",
            TaskKind::SearchMore => "Search More",
            TaskKind::UpdateMembers => "Update Members",
            TaskKind::DeleteMembers => "Delete Members",
            TaskKind::FetchPending => "Fetch Pending",
            TaskKind::ClaimMessages => "Claim Messages",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the single active task of a category; starting a new one hands back the old.
#[derive(Debug, Default)]
pub struct TaskSlot {
    active: Option<(TaskId, CancelToken)>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Installs `task_id`, cancelling and returning the task it replaced.
    pub fn start(&mut self, task_id: TaskId, token: CancelToken) -> Option<TaskId> {
        let previous = self.active.replace((task_id, token));
        previous.map(|(old_id, old_token)| {
            old_token.cancel();
            old_id
        })
    }

    /// Clears the slot only if it still holds `task_id`.
    pub fn take_if(&mut self, task_id: TaskId) -> Option<CancelToken> {
        match &self.active {
            Some((id, _)) if *id == task_id => self.active.take().map(|(_, token)| token),
            _ => None,
        }
    }

    pub fn cancel(&mut self) -> Option<TaskId> {
        self.active.take().map(|(id, token)| {
            token.cancel();
            id
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

struct RunningTask {
    kind: TaskKind,
    description: String,
    started_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Failed(String),
}

/// Outcome of the most recent backend call.
#[derive(Debug, Clone)]
pub struct FinishedTask {
    pub kind: TaskKind,
    pub description: String,
    pub status: TaskStatus,
    pub elapsed: Duration,
}

/// Backend calls issued by one browser session.
///
/// Only running calls are kept; a finished call leaves its outcome in
/// [`TaskManager::last_finished`] and is dropped.
#[derive(Default)]
pub struct TaskManager {
    running: HashMap<TaskId, RunningTask>,
    last_finished: Option<FinishedTask>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, kind: TaskKind, description: impl Into<String>) -> TaskId {
        let id = TaskId::new_v4();
        self.running.insert(
            id,
            RunningTask {
                kind,
                description: description.into(),
                started_at: Instant::now(),
            },
        );
        id
    }

    pub fn complete(&mut self, id: TaskId) {
        self.finish(id, TaskStatus::Completed);
    }

    pub fn fail(&mut self, id: TaskId, error: impl Into<String>) {
        self.finish(id, TaskStatus::Failed(error.into()));
    }

    fn finish(&mut self, id: TaskId, status: TaskStatus) {
        let Some(task) = self.running.remove(&id) else {
            return;
        };

        let elapsed = task.started_at.elapsed();
        log::debug!("{} finished in {:?}: {:?}", task.description, elapsed, status);

        self.last_finished = Some(FinishedTask {
            kind: task.kind,
            description: task.description,
            status,
            elapsed,
        });
    }

    pub fn has_running(&self, kind: TaskKind) -> bool {
        self.running.values().any(|t| t.kind == kind)
    }

    pub fn active_count(&self) -> usize {
        self.running.len()
    }

    pub fn last_finished(&self) -> Option<&FinishedTask> {
        self.last_finished.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_cancels_previous_task_on_start() {
        let mut slot = TaskSlot::new();
        let first = CancelToken::new();
        let first_id = TaskId::new_v4();

        assert_eq!(slot.start(first_id, first.clone()), None);

        let second_id = TaskId::new_v4();
        assert_eq!(slot.start(second_id, CancelToken::new()), Some(first_id));
        assert!(first.is_cancelled());
        assert!(slot.is_active());
    }

    #[test]
    fn slot_take_if_ignores_superseded_ids() {
        let mut slot = TaskSlot::new();
        let old_id = TaskId::new_v4();
        let new_id = TaskId::new_v4();
        slot.start(old_id, CancelToken::new());
        slot.start(new_id, CancelToken::new());

        assert!(slot.take_if(old_id).is_none());
        assert!(slot.take_if(new_id).is_some());
        assert!(!slot.is_active());
    }

    #[test]
    fn finished_tasks_leave_only_their_outcome() {
        let mut manager = TaskManager::new();
        let fetch = manager.start(TaskKind::FetchPage, "ZRANGE scores 0 499");
        let claim = manager.start(TaskKind::ClaimMessages, "XCLAIM orders billing for worker-2");

        assert!(manager.has_running(TaskKind::FetchPage));
        assert_eq!(manager.active_count(), 2);

        manager.complete(fetch);
        manager.fail(claim, "NOGROUP");

        assert_eq!(manager.active_count(), 0);
        let last = manager.last_finished().map(|t| (t.kind, t.status.clone()));
        assert_eq!(
            last,
            Some((TaskKind::ClaimMessages, TaskStatus::Failed("NOGROUP".to_string())))
        );
    }

    #[test]
    fn finishing_twice_is_ignored() {
        let mut manager = TaskManager::new();
        let id = manager.start(TaskKind::FetchMore, "ZRANGE scores 500 999");

        manager.fail(id, "LOADING");
        manager.complete(id);

        assert_eq!(
            manager.last_finished().map(|t| t.status.clone()),
            Some(TaskStatus::Failed("LOADING".to_string()))
        );
    }
}
