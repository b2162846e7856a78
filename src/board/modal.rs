use crate::types::{Task, TaskStatus, UserRef};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModalMode {
    Create,
    Edit,
}

impl ModalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ModalMode::Create => "create",
            ModalMode::Edit => "edit",
        }
    }
}

/// Selected-task state of the edit dialog: closed, or open on one task.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum ModalController {
    #[default]
    Closed,
    Open(Task),
}

impl ModalController {
    pub fn open(&mut self, task: Task) {
        *self = ModalController::Open(task);
    }

    pub fn open_new(&mut self, project_id: i64, status: TaskStatus, creator: Option<UserRef>) {
        self.open(Task::draft(project_id, status, creator));
    }

    pub fn close(&mut self) {
        *self = ModalController::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ModalController::Open(_))
    }

    pub fn selected(&self) -> Option<&Task> {
        match self {
            ModalController::Open(task) => Some(task),
            ModalController::Closed => None,
        }
    }

    pub fn mode(&self) -> Option<ModalMode> {
        self.selected().map(|task| {
            if task.is_new() {
                ModalMode::Create
            } else {
                ModalMode::Edit
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let modal = ModalController::default();
        assert!(!modal.is_open());
        assert_eq!(modal.selected(), None);
        assert_eq!(modal.mode(), None);
    }

    #[test]
    fn open_with_sentinel_id_is_create() {
        let mut modal = ModalController::default();
        modal.open_new(4, TaskStatus::InProgress, Some(UserRef::new(2)));

        assert!(modal.is_open());
        assert_eq!(modal.mode(), Some(ModalMode::Create));
        let draft = modal.selected().expect("draft should be selected");
        assert_eq!(draft.project_id, 4);
        assert_eq!(draft.status, TaskStatus::InProgress);
    }

    #[test]
    fn open_with_real_id_is_edit() {
        let mut modal = ModalController::default();
        modal.open(Task {
            id: 17,
            ..Task::default()
        });

        assert_eq!(modal.mode(), Some(ModalMode::Edit));
        assert_eq!(modal.selected().map(|task| task.id), Some(17));
    }

    #[test]
    fn reopening_replaces_selection() {
        let mut modal = ModalController::default();
        modal.open(Task {
            id: 1,
            ..Task::default()
        });
        modal.open(Task {
            id: 2,
            ..Task::default()
        });
        assert_eq!(modal.selected().map(|task| task.id), Some(2));
    }

    #[test]
    fn close_clears_selection() {
        let mut modal = ModalController::default();
        modal.open(Task {
            id: 3,
            ..Task::default()
        });

        modal.close();

        assert_eq!(modal, ModalController::Closed);
        assert_eq!(modal.selected(), None);
    }
}
