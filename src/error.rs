use std::path::PathBuf;
use thiserror::Error;

/// Everything a scheduler operation can report back to the user.
///
/// Persistence problems are deliberately not represented here: a failed
/// state write degrades to a warning on the scheduler and the operation
/// still succeeds.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Please fill in the following required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Scheduled time must be in the future")]
    TimeNotInFuture,

    #[error("Invalid git repository path: {}", .0.display())]
    InvalidRepoPath(PathBuf),

    #[error("Failed to create PR: {0}")]
    RemoteCreation(String),

    #[error("No scheduled PR with id #{0}")]
    UnknownId(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_message_lists_every_field() {
        let err = SchedulerError::MissingFields(vec![
            "Base Branch".to_string(),
            "PR Title".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("Base Branch"));
        assert!(msg.contains("PR Title"));
    }
}
