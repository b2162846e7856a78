//! Optimistic board state for one project, kept in step with the task store.

pub mod columns;
pub mod modal;
pub mod polling;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, broadcast};
use tracing::{debug, error, info, warn};

use crate::store::{StoreError, StoreResult, TaskStore};
use crate::types::{Task, TaskStatus, UserRef};

pub use columns::{BoardColumns, Removed, group_owned_tasks_by_status, group_tasks_by_status};
pub use modal::{ModalController, ModalMode};
pub use polling::spawn_board_poller;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// User-facing failure, the board's replacement for a blocking alert.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BoardError {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BoardEvent {
    Refreshed { task_count: usize },
    Changed,
    RefreshFailed { detail: String },
    Error(BoardError),
}

/// Read-only snapshot handed to anything that renders the board.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BoardView {
    pub project_id: i64,
    pub current_user: Option<UserRef>,
    pub columns: BoardColumns,
    pub selected: Option<Task>,
    pub modal_mode: Option<ModalMode>,
}

/// The save/delete callbacks a task dialog is given.
pub trait BoardActions: Send + Sync {
    fn save_task(&self, task: Task) -> impl Future<Output = StoreResult<()>> + Send;

    fn delete_task(&self, task_id: i64) -> impl Future<Output = StoreResult<()>> + Send;
}

#[derive(Debug, Clone)]
struct DragPayload {
    task: Task,
    source: TaskStatus,
}

#[derive(Debug, Default)]
struct BoardState {
    columns: BoardColumns,
    modal: ModalController,
    drag: Option<DragPayload>,
    issued_refreshes: u64,
    applied_refresh: u64,
}

pub struct BoardManager<S> {
    store: S,
    project_id: i64,
    current_user: Option<UserRef>,
    state: Mutex<BoardState>,
    events: broadcast::Sender<BoardEvent>,
    refresh_signal: Arc<Notify>,
}

impl<S: TaskStore> BoardManager<S> {
    pub fn new(store: S, project_id: i64, current_user: Option<UserRef>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            project_id,
            current_user,
            state: Mutex::new(BoardState::default()),
            events,
            refresh_signal: Arc::new(Notify::new()),
        }
    }

    /// Builds the manager and performs the initial load.
    pub async fn load(
        store: S,
        project_id: i64,
        current_user: Option<UserRef>,
    ) -> StoreResult<Self> {
        let manager = Self::new(store, project_id, current_user);
        manager.refresh().await?;
        Ok(manager)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Wakes the poller for an out-of-cycle refresh.
    pub fn request_refresh(&self) {
        self.refresh_signal.notify_one();
    }

    pub(crate) fn refresh_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.refresh_signal)
    }

    pub fn view(&self) -> BoardView {
        let state = self.lock_state();
        BoardView {
            project_id: self.project_id,
            current_user: self.current_user.clone(),
            columns: state.columns.clone(),
            selected: state.modal.selected().cloned(),
            modal_mode: state.modal.mode(),
        }
    }

    pub fn columns(&self) -> BoardColumns {
        self.lock_state().columns.clone()
    }

    /// Replaces the whole board with the store's current task list. A response
    /// is dropped when a refresh issued later has already been applied.
    pub async fn refresh(&self) -> StoreResult<usize> {
        let ticket = {
            let mut state = self.lock_state();
            state.issued_refreshes += 1;
            state.issued_refreshes
        };

        let tasks = match self.store.list_tasks(self.project_id).await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(
                    project_id = self.project_id,
                    error = %err,
                    "failed to refresh board"
                );
                self.emit(BoardEvent::RefreshFailed {
                    detail: err.to_string(),
                });
                return Err(err);
            }
        };

        let task_count = tasks.len();
        let applied = {
            let mut state = self.lock_state();
            if ticket < state.applied_refresh {
                false
            } else {
                state.columns = group_owned_tasks_by_status(tasks);
                state.applied_refresh = ticket;
                true
            }
        };

        if applied {
            debug!(project_id = self.project_id, task_count, "board refreshed");
            self.emit(BoardEvent::Refreshed { task_count });
        } else {
            debug!(
                project_id = self.project_id,
                ticket, "discarding stale refresh response"
            );
        }

        Ok(task_count)
    }

    pub fn begin_drag(&self, task: Task, source: TaskStatus) {
        self.lock_state().drag = Some(DragPayload { task, source });
    }

    pub fn cancel_drag(&self) {
        self.lock_state().drag = None;
    }

    /// Drops whatever `begin_drag` recorded onto `target`.
    pub async fn drop_dragged(&self, target: TaskStatus) -> StoreResult<()> {
        let payload = self.lock_state().drag.take();
        let Some(DragPayload { task, source }) = payload else {
            debug!(%target, "drop without an active drag ignored");
            return Ok(());
        };
        self.complete_drop(&task, source, target).await
    }

    /// Moves a task between columns before the store confirms it; a failed
    /// update puts the task back where it was.
    pub async fn complete_drop(
        &self,
        task: &Task,
        source: TaskStatus,
        target: TaskStatus,
    ) -> StoreResult<()> {
        if source == target {
            return Ok(());
        }

        let moved = task.clone().with_status(target);
        let previous = {
            let mut state = self.lock_state();
            let previous = state.columns.remove(task.id);
            state.columns.push(moved.clone());
            previous
        };
        self.emit(BoardEvent::Changed);

        match self.store.update_task(&moved).await {
            Ok(patch) => {
                let mut confirmed = moved;
                confirmed.merge(&patch);
                let replaced = self.lock_state().columns.replace(confirmed);
                if replaced {
                    self.emit(BoardEvent::Changed);
                }
                info!(task_id = task.id, from = %source, to = %target, "task moved");
                Ok(())
            }
            Err(err) => {
                let rolled_back = {
                    let mut state = self.lock_state();
                    let still_moved = state
                        .columns
                        .find(moved.id)
                        .is_some_and(|(status, _)| status == target);
                    if still_moved {
                        state.columns.remove(moved.id);
                        if let Some(Removed {
                            status,
                            index,
                            task: original,
                        }) = previous
                        {
                            state.columns.insert_at(status, index, original);
                        }
                    }
                    still_moved
                };
                if rolled_back {
                    self.emit(BoardEvent::Changed);
                }
                self.report_failure("Failed to update the task", task.id, &err);
                Err(err)
            }
        }
    }

    pub fn open_task(&self, task: Task) {
        self.lock_state().modal.open(task);
    }

    pub fn open_new_task(&self, status: TaskStatus) {
        let creator = self.current_user.clone();
        self.lock_state()
            .modal
            .open_new(self.project_id, status, creator);
    }

    pub fn close_modal(&self) {
        self.lock_state().modal.close();
    }

    /// Creates a task when its id is the sentinel, updates it otherwise. The
    /// modal is closed whatever the outcome.
    pub async fn save_task(&self, task: Task) -> StoreResult<()> {
        let task_id = task.id;
        let result = if task.is_new() {
            self.create(task).await
        } else {
            self.update(task).await
        };

        self.close_modal();
        if let Err(err) = &result {
            self.report_failure("Failed to save the task", task_id, err);
        }
        result
    }

    async fn create(&self, task: Task) -> StoreResult<()> {
        let patch = self.store.create_task(&task).await?;

        let Some(task_id) = patch.persisted_id() else {
            info!(
                project_id = self.project_id,
                "create response carried no id; requesting refresh"
            );
            self.request_refresh();
            return Ok(());
        };

        let mut created = task;
        created.merge(&patch);
        {
            let mut state = self.lock_state();
            state.columns.remove(task_id);
            state.columns.push(created);
        }
        info!(task_id, "task created");
        self.emit(BoardEvent::Changed);
        Ok(())
    }

    async fn update(&self, task: Task) -> StoreResult<()> {
        let patch = self.store.update_task(&task).await?;

        let mut updated = task;
        updated.merge(&patch);
        let task_id = updated.id;
        let replaced = self.lock_state().columns.replace(updated);

        if replaced {
            info!(task_id, "task updated");
            self.emit(BoardEvent::Changed);
        } else {
            debug!(task_id, "updated task is no longer on the board");
        }
        Ok(())
    }

    /// Deletes on the server, then from every column. The modal is closed
    /// whatever the outcome.
    pub async fn delete_task(&self, task_id: i64) -> StoreResult<()> {
        let result = self.store.delete_task(task_id).await;

        if result.is_ok() {
            let removed = self.lock_state().columns.remove(task_id);
            info!(task_id, "task deleted");
            if removed.is_some() {
                self.emit(BoardEvent::Changed);
            }
        }

        self.close_modal();
        if let Err(err) = &result {
            self.report_failure("Failed to delete the task", task_id, err);
        }
        result
    }

    fn report_failure(&self, title: &str, task_id: i64, err: &StoreError) {
        error!(
            project_id = self.project_id,
            task_id,
            code = %err.code,
            message = %err.message,
            "{title}"
        );
        self.emit(BoardEvent::Error(BoardError {
            title: title.to_string(),
            detail: format!("{}. Please try again.", err.message),
        }));
    }

    fn emit(&self, event: BoardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: TaskStore> BoardActions for BoardManager<S> {
    async fn save_task(&self, task: Task) -> StoreResult<()> {
        BoardManager::save_task(self, task).await
    }

    async fn delete_task(&self, task_id: i64) -> StoreResult<()> {
        BoardManager::delete_task(self, task_id).await
    }
}
