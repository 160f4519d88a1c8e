use serde::Serialize;

use crate::pr::types::ChangeKind;

/// Sprint value for records whose sprint has not been assigned.
pub const UNASSIGNED_SPRINT: i32 = -1;

/// Kind of work item a pull request delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskType {
    UserStory,
    Bug,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::UserStory => write!(f, "User Story"),
            TaskType::Bug => write!(f, "Bug"),
        }
    }
}

/// A changed file with its component classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedChange {
    pub path: String,
    pub change_kind: ChangeKind,
    pub component_type: &'static str,
}

/// All changes delivered for one task, keyed by (task type, task number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRecord {
    pub task_type: TaskType,
    pub task_number: u64,
    pub sprint: i32,
    pub owner: String,
    /// Concatenated in pull-request processing order, then path order
    pub changes: Vec<ClassifiedChange>,
}

impl ProcessedRecord {
    /// Task reference shown in the report, e.g. "User Story 101".
    pub fn task_label(&self) -> String {
        format!("{} {}", self.task_type, self.task_number)
    }
}

/// One report line: a single (record, change) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub sprint: i32,
    pub path: String,
    pub task: String,
    pub component_type: &'static str,
    pub change_kind: &'static str,
    pub owner: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_display() {
        assert_eq!(TaskType::UserStory.to_string(), "User Story");
        assert_eq!(TaskType::Bug.to_string(), "Bug");
    }

    #[test]
    fn test_task_label() {
        let record = ProcessedRecord {
            task_type: TaskType::UserStory,
            task_number: 101,
            sprint: UNASSIGNED_SPRINT,
            owner: "unassigned".to_string(),
            changes: vec![],
        };
        assert_eq!(record.task_label(), "User Story 101");
    }
}
