/// Left after a failed create, such stack can only be deleted
pub const ROLLBACK_COMPLETE: &str = "ROLLBACK_COMPLETE";

pub const DELETE_COMPLETE: &str = "DELETE_COMPLETE";

/// Outcome of a CloudFormation stack operation, as seen from its status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    InProgress,
    Success,
    Failure,
}

impl Status {
    pub fn from_status(status: &str) -> Self {
        if status.ends_with("_IN_PROGRESS") {
            return Status::InProgress;
        }

        match status {
            "CREATE_COMPLETE" | "UPDATE_COMPLETE" | DELETE_COMPLETE | "IMPORT_COMPLETE" => {
                Status::Success
            }
            _ => Status::Failure,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::InProgress)
    }
}

/// Whether the stack must be deleted before it can be created again
pub fn needs_cleanup(status: &str) -> bool {
    status == ROLLBACK_COMPLETE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_classified() {
        for status in [
            "CREATE_IN_PROGRESS",
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            "UPDATE_ROLLBACK_IN_PROGRESS",
            "DELETE_IN_PROGRESS",
        ] {
            assert_eq!(Status::from_status(status), Status::InProgress, "{status}");
        }

        for status in ["CREATE_COMPLETE", "UPDATE_COMPLETE", "DELETE_COMPLETE", "IMPORT_COMPLETE"] {
            assert_eq!(Status::from_status(status), Status::Success, "{status}");
        }

        for status in [
            "ROLLBACK_COMPLETE",
            "UPDATE_ROLLBACK_COMPLETE",
            "CREATE_FAILED",
            "DELETE_FAILED",
            "UPDATE_ROLLBACK_FAILED",
        ] {
            assert_eq!(Status::from_status(status), Status::Failure, "{status}");
            assert!(Status::from_status(status).is_terminal());
        }
    }

    #[test]
    fn only_failed_creates_need_cleanup() {
        assert!(needs_cleanup("ROLLBACK_COMPLETE"));
        assert!(!needs_cleanup("UPDATE_ROLLBACK_COMPLETE"));
    }
}
