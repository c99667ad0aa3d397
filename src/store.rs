use crate::gh::PrForm;
use crate::registry::Registry;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MAX_HISTORY_ENTRIES: usize = 10;

/// Recency-ordered suggestion lists for the history-backed form fields.
/// Bounded, distinct, most recent first.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub titles: Vec<String>,
}

impl History {
    pub fn record(&mut self, form: &PrForm) {
        remember(&mut self.repos, &form.repo);
        remember(&mut self.usernames, &form.fork_user);
        remember(&mut self.branches, &form.fork_branch);
        remember(&mut self.titles, &form.title);
    }
}

fn remember(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    list.retain(|entry| entry != value);
    list.insert(0, value.to_string());
    list.truncate(MAX_HISTORY_ENTRIES);
}

/// Everything the scheduler persists: pending records, the id counter
/// and the suggestion history. Rewritten wholesale after every mutating
/// operation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub registry: Registry,
    #[serde(default)]
    pub history: History,
}

pub fn state_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("pr-scheduler")
        .join("state.json")
}

/// Loads the persisted state. A missing file is the normal first run; a
/// broken one degrades to defaults with a warning the caller surfaces.
pub fn load_state(path: &Path) -> (State, Option<String>) {
    if !path.exists() {
        return (State::default(), None);
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            return (
                State::default(),
                Some(format!("Failed to read {}: {e}", path.display())),
            )
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => (state, None),
        Err(e) => (
            State::default(),
            Some(format!("Failed to parse {}: {e}", path.display())),
        ),
    }
}

pub fn save_state(path: &Path, state: &State) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PendingPr;
    use chrono::{Duration, Utc};

    fn sample_state() -> State {
        let mut registry = Registry::default();
        for n in 0..2 {
            let id = registry.next_id();
            registry.insert(PendingPr {
                id,
                repo: "org/repo".to_string(),
                head: "me:feature".to_string(),
                base: "main".to_string(),
                title: format!("PR {n}"),
                body: "body".to_string(),
                local_path: PathBuf::from("/tmp/repo"),
                scheduled_at: Utc::now() + Duration::minutes(5),
                timer: None,
            });
        }
        let mut history = History::default();
        history.record(&PrForm {
            repo: "org/repo".to_string(),
            fork_user: "me".to_string(),
            fork_branch: "feature".to_string(),
            title: "PR 0".to_string(),
            ..PrForm::default()
        });
        State { registry, history }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = sample_state();
        save_state(&path, &state).unwrap();

        let (mut loaded, warning) = load_state(&path);
        assert!(warning.is_none());
        assert_eq!(loaded.registry.len(), 2);
        let ids: Vec<u64> = loaded.registry.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        // Counter survives: the next id continues past the stored ones.
        assert_eq!(loaded.registry.next_id(), 3);
        assert_eq!(loaded.history.repos, vec!["org/repo"]);
        assert_eq!(loaded.history.usernames, vec!["me"]);
    }

    #[test]
    fn missing_file_loads_defaults_without_warning() {
        let dir = tempfile::tempdir().unwrap();
        let (state, warning) = load_state(&dir.path().join("absent.json"));
        assert!(warning.is_none());
        assert!(state.registry.is_empty());
    }

    #[test]
    fn corrupt_file_loads_defaults_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let (state, warning) = load_state(&path);
        assert!(state.registry.is_empty());
        assert!(warning.unwrap().contains("Failed to parse"));
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("state.json");
        save_state(&path, &State::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn history_is_bounded_and_distinct() {
        let mut list = Vec::new();
        for n in 0..15 {
            remember(&mut list, &format!("branch-{n}"));
        }
        assert_eq!(list.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(list[0], "branch-14");

        remember(&mut list, "branch-10");
        assert_eq!(list.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(list[0], "branch-10");
        assert_eq!(list.iter().filter(|v| *v == "branch-10").count(), 1);
    }

    #[test]
    fn blank_values_are_not_remembered() {
        let mut history = History::default();
        history.record(&PrForm::default());
        assert!(history.repos.is_empty());
        assert!(history.titles.is_empty());
    }
}
