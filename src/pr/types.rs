use serde::Serialize;

/// A completed pull request as returned by the repository client.
/// `changed_paths` is empty until the retriever fills it in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestSummary {
    /// Pull request id (e.g., 4521)
    pub id: u64,
    /// Free-text title, expected to carry the task type and `#<number>`
    pub title: String,
    /// Stable identifier of the creator
    pub created_by: String,
    /// Deduplicated, path-sorted file changes across all commits
    pub changed_paths: Vec<ChangedPath>,
}

/// A single file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedPath {
    pub path: String,
    pub change_kind: ChangeKind,
}

impl ChangedPath {
    pub fn new(path: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            change_kind,
        }
    }
}

/// Closed classification of a raw change-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Unknown,
}

impl ChangeKind {
    /// Map a raw API change-type code. Only `add`, `edit` and `delete` are
    /// recognized; renames, merges, combined codes and the rest collapse to
    /// `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "add" => ChangeKind::Added,
            "edit" => ChangeKind::Modified,
            "delete" => ChangeKind::Deleted,
            _ => ChangeKind::Unknown,
        }
    }

    /// Label used in the report's change-kind column.
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Added => "Created",
            ChangeKind::Modified => "Modified",
            ChangeKind::Deleted => "Deleted",
            ChangeKind::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_known_codes() {
        assert_eq!(ChangeKind::from_code("add"), ChangeKind::Added);
        assert_eq!(ChangeKind::from_code("edit"), ChangeKind::Modified);
        assert_eq!(ChangeKind::from_code("delete"), ChangeKind::Deleted);
    }

    #[test]
    fn test_change_kind_other_codes_are_unknown() {
        for code in [
            "all",
            "branch",
            "encoding",
            "lock",
            "merge",
            "none",
            "property",
            "rename",
            "rollback",
            "sourceRename",
            "targetRename",
            "undelete",
            "edit, rename",
            "ADD",
            "",
        ] {
            assert_eq!(ChangeKind::from_code(code), ChangeKind::Unknown, "code {code:?}");
        }
    }

    #[test]
    fn test_change_kind_labels() {
        assert_eq!(ChangeKind::Added.to_string(), "Created");
        assert_eq!(ChangeKind::Modified.to_string(), "Modified");
        assert_eq!(ChangeKind::Deleted.to_string(), "Deleted");
        assert_eq!(ChangeKind::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = PullRequestSummary {
            id: 7,
            title: "Bug #7 fix".to_string(),
            created_by: "abc".to_string(),
            changed_paths: vec![ChangedPath::new("/a.cls", ChangeKind::Added)],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["createdBy"], "abc");
        assert_eq!(json["changedPaths"][0]["changeKind"], "Added");
    }
}
