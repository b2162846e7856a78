//! In-memory task store for board tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::store::{StoreError, StoreResult, TaskStore};
use crate::types::{Task, TaskPatch, TaskStatus};

pub(crate) fn task(id: i64, status: TaskStatus) -> Task {
    Task {
        id,
        project_id: 1,
        title: format!("task {id}"),
        status,
        ..Task::default()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum StoreCall {
    List { project_id: i64 },
    Create { title: String },
    Update { id: i64, status: TaskStatus },
    Delete { id: i64 },
}

#[derive(Default)]
struct Scripted {
    tasks: Vec<Task>,
    calls: Vec<StoreCall>,
    list_failures: VecDeque<StoreError>,
    create_responses: VecDeque<TaskPatch>,
    update_responses: VecDeque<TaskPatch>,
    update_failures: VecDeque<StoreError>,
    delete_failures: VecDeque<StoreError>,
}

#[derive(Default)]
pub(crate) struct FakeTaskStore {
    scripted: Mutex<Scripted>,
    hold_lists: AtomicBool,
    list_gate: Notify,
    hold_updates: AtomicBool,
    update_gate: Notify,
}

impl FakeTaskStore {
    pub(crate) fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::default();
        store.set_tasks(tasks);
        store
    }

    fn scripted(&self) -> MutexGuard<'_, Scripted> {
        self.scripted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_tasks(&self, tasks: Vec<Task>) {
        self.scripted().tasks = tasks;
    }

    pub(crate) fn calls(&self) -> Vec<StoreCall> {
        self.scripted().calls.clone()
    }

    pub(crate) fn update_count(&self) -> usize {
        self.scripted()
            .calls
            .iter()
            .filter(|call| matches!(call, StoreCall::Update { .. }))
            .count()
    }

    pub(crate) fn list_count(&self) -> usize {
        self.scripted()
            .calls
            .iter()
            .filter(|call| matches!(call, StoreCall::List { .. }))
            .count()
    }

    pub(crate) fn fail_next_list(&self, err: StoreError) {
        self.scripted().list_failures.push_back(err);
    }

    pub(crate) fn fail_next_update(&self, err: StoreError) {
        self.scripted().update_failures.push_back(err);
    }

    pub(crate) fn fail_next_delete(&self, err: StoreError) {
        self.scripted().delete_failures.push_back(err);
    }

    pub(crate) fn respond_to_create(&self, patch: TaskPatch) {
        self.scripted().create_responses.push_back(patch);
    }

    pub(crate) fn respond_to_update(&self, patch: TaskPatch) {
        self.scripted().update_responses.push_back(patch);
    }

    pub(crate) fn hold_lists(&self) {
        self.hold_lists.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_lists(&self) {
        self.hold_lists.store(false, Ordering::SeqCst);
    }

    pub(crate) fn release_held_list(&self) {
        self.list_gate.notify_one();
    }

    pub(crate) fn hold_updates(&self) {
        self.hold_updates.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_updates(&self) {
        self.hold_updates.store(false, Ordering::SeqCst);
        self.update_gate.notify_one();
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        for _ in 0..1_000 {
            if self.scripted().calls.len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("store never saw {count} calls");
    }

    pub(crate) async fn wait_for_update(&self) {
        for _ in 0..1_000 {
            if self.update_count() > 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("store never saw an update call");
    }
}

impl TaskStore for FakeTaskStore {
    async fn list_tasks(&self, project_id: i64) -> StoreResult<Vec<Task>> {
        let result = {
            let mut scripted = self.scripted();
            scripted.calls.push(StoreCall::List { project_id });
            match scripted.list_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(scripted.tasks.clone()),
            }
        };

        if self.hold_lists.load(Ordering::SeqCst) {
            self.list_gate.notified().await;
        }
        result
    }

    async fn create_task(&self, task: &Task) -> StoreResult<TaskPatch> {
        let mut scripted = self.scripted();
        scripted.calls.push(StoreCall::Create {
            title: task.title.clone(),
        });
        Ok(scripted.create_responses.pop_front().unwrap_or_default())
    }

    async fn update_task(&self, task: &Task) -> StoreResult<TaskPatch> {
        let result = {
            let mut scripted = self.scripted();
            scripted.calls.push(StoreCall::Update {
                id: task.id,
                status: task.status,
            });
            match scripted.update_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(scripted
                    .update_responses
                    .pop_front()
                    .unwrap_or_else(|| TaskPatch {
                        id: Some(task.id),
                        status: Some(task.status),
                        ..TaskPatch::default()
                    })),
            }
        };

        if self.hold_updates.load(Ordering::SeqCst) {
            self.update_gate.notified().await;
        }
        result
    }

    async fn delete_task(&self, task_id: i64) -> StoreResult<()> {
        let mut scripted = self.scripted();
        scripted.calls.push(StoreCall::Delete { id: task_id });
        match scripted.delete_failures.pop_front() {
            Some(err) => Err(err),
            None => {
                scripted.tasks.retain(|task| task.id != task_id);
                Ok(())
            }
        }
    }
}
