use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::components::component_type;
use super::types::PullRequestSummary;
use crate::report::types::{ClassifiedChange, ProcessedRecord, TaskType, UNASSIGNED_SPRINT};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{missing} not found in title '{title}'")]
    MalformedTitle { title: String, missing: &'static str },
}

fn task_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Bug|User Story").expect("task type pattern is valid"))
}

fn task_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#(\d+)").expect("task number pattern is valid"))
}

/// First "Bug" or "User Story" occurring in the title.
pub fn parse_task_type(title: &str) -> Result<TaskType, ProcessError> {
    match task_type_pattern().find(title).map(|m| m.as_str()) {
        Some("Bug") => Ok(TaskType::Bug),
        Some(_) => Ok(TaskType::UserStory),
        None => Err(ProcessError::MalformedTitle {
            title: title.to_string(),
            missing: "task type",
        }),
    }
}

/// First run of digits directly after a `#`.
pub fn parse_task_number(title: &str) -> Result<u64, ProcessError> {
    task_number_pattern()
        .captures(title)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .ok_or_else(|| ProcessError::MalformedTitle {
            title: title.to_string(),
            missing: "task number",
        })
}

/// Group pull requests by task key and classify their changes.
///
/// Records come out in first-seen key order. Pull requests sharing a key
/// have their changes appended in processing order; paths repeated across
/// pull requests are kept. A single malformed title fails the whole pass.
pub fn process_pull_requests(
    pull_requests: &[PullRequestSummary],
    owner: &str,
) -> Result<Vec<ProcessedRecord>, ProcessError> {
    let mut records: Vec<ProcessedRecord> = Vec::new();
    let mut index: HashMap<(TaskType, u64), usize> = HashMap::new();

    for pr in pull_requests {
        let task_type = parse_task_type(&pr.title)?;
        let task_number = parse_task_number(&pr.title)?;
        debug!(pr = pr.id, %task_type, task_number, "parsed pull request title");

        let changes = pr.changed_paths.iter().map(|change| ClassifiedChange {
            path: change.path.clone(),
            change_kind: change.change_kind,
            component_type: component_type(&change.path),
        });

        let slot = *index.entry((task_type, task_number)).or_insert_with(|| {
            records.push(ProcessedRecord {
                task_type,
                task_number,
                sprint: UNASSIGNED_SPRINT,
                owner: owner.to_string(),
                changes: Vec::new(),
            });
            records.len() - 1
        });
        records[slot].changes.extend(changes);
    }

    Ok(records)
}
