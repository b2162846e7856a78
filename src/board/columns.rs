use serde::Serialize;

use crate::types::{Task, TaskStatus};

/// The three status buckets of a board, each in display order.
#[derive(Debug, Clone, Default, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumns {
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

/// Partition a task list into status buckets, keeping input order inside each bucket.
pub fn group_tasks_by_status(tasks: &[Task]) -> BoardColumns {
    group_owned_tasks_by_status(tasks.to_vec())
}

pub fn group_owned_tasks_by_status(tasks: Vec<Task>) -> BoardColumns {
    let mut columns = BoardColumns::default();
    for task in tasks {
        columns.bucket_mut(task.status).push(task);
    }
    columns
}

impl BoardColumns {
    pub fn bucket(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    pub fn bucket_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }

    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every task, column by column.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.todo
            .iter()
            .chain(self.in_progress.iter())
            .chain(self.done.iter())
    }

    pub fn task_ids(&self, status: TaskStatus) -> Vec<i64> {
        self.bucket(status).iter().map(|task| task.id).collect()
    }

    pub fn find(&self, task_id: i64) -> Option<(TaskStatus, usize)> {
        TaskStatus::ALL.into_iter().find_map(|status| {
            self.bucket(status)
                .iter()
                .position(|task| task.id == task_id)
                .map(|index| (status, index))
        })
    }

    pub fn get(&self, task_id: i64) -> Option<&Task> {
        self.find(task_id)
            .map(|(status, index)| &self.bucket(status)[index])
    }

    pub fn contains(&self, task_id: i64) -> bool {
        self.find(task_id).is_some()
    }

    /// Appends to the bucket named by the task's own status.
    pub fn push(&mut self, task: Task) {
        self.bucket_mut(task.status).push(task);
    }

    /// Removes the id from every bucket and returns its first location.
    pub fn remove(&mut self, task_id: i64) -> Option<Removed> {
        let mut first = None;
        for status in TaskStatus::ALL {
            let bucket = self.bucket_mut(status);
            while let Some(index) = bucket.iter().position(|task| task.id == task_id) {
                let task = bucket.remove(index);
                if first.is_none() {
                    first = Some(Removed {
                        status,
                        index,
                        task,
                    });
                }
            }
        }
        first
    }

    /// Puts a task back at a remembered position, clamped to the bucket length.
    pub fn insert_at(&mut self, status: TaskStatus, index: usize, task: Task) {
        let bucket = self.bucket_mut(status);
        let index = index.min(bucket.len());
        bucket.insert(index, task);
    }

    /// Replaces the task with the same id: in place when its status is unchanged,
    /// otherwise moved to the end of its new bucket. Returns false when the id is
    /// not on the board.
    pub fn replace(&mut self, task: Task) -> bool {
        let Some((status, index)) = self.find(task.id) else {
            return false;
        };

        if status == task.status {
            self.bucket_mut(status)[index] = task;
        } else {
            self.remove(task.id);
            self.push(task);
        }
        true
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Removed {
    pub status: TaskStatus,
    pub index: usize,
    pub task: Task,
}
