//! Persisted scheduler records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment assumed for tasks written before environments existed.
pub const DEFAULT_ENVIRONMENT: &str = "devel";

/// Fully qualified job identity: `role/environment/name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub role: String,
    pub environment: String,
    pub name: String,
}

impl JobKey {
    pub fn new(role: impl Into<String>, environment: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            environment: environment.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.role, self.environment, self.name)
    }
}

/// Last known status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
}

/// A scheduled task as persisted by the scheduler.
///
/// `environment` and `job_key` are optional because records from older
/// schedulers were written without them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub task_id: String,
    pub role: String,
    pub job_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_key: Option<JobKey>,
    pub status: TaskStatus,
    /// Unix timestamp (seconds) of the last status change.
    pub updated_at: u64,
}

impl TaskRecord {
    /// A complete record for a task of `job`.
    pub fn new(task_id: impl Into<String>, job: JobKey, status: TaskStatus, updated_at: u64) -> Self {
        Self {
            task_id: task_id.into(),
            role: job.role.clone(),
            job_name: job.name.clone(),
            environment: Some(job.environment.clone()),
            job_key: Some(job),
            status,
            updated_at,
        }
    }

    pub fn table_key(&self) -> &str {
        &self.task_id
    }

    /// Fill in fields older schedulers did not write. Returns whether the
    /// record changed.
    pub fn backfill(&mut self) -> bool {
        let mut changed = false;
        if self.environment.is_none() {
            self.environment = Some(DEFAULT_ENVIRONMENT.to_string());
            changed = true;
        }
        if self.job_key.is_none() {
            let environment = self
                .environment
                .clone()
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
            self.job_key = Some(JobKey::new(&self.role, environment, &self.job_name));
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(task_id: &str) -> TaskRecord {
        TaskRecord {
            task_id: task_id.to_string(),
            role: "www-data".to_string(),
            job_name: "hello".to_string(),
            environment: None,
            job_key: None,
            status: TaskStatus::Running,
            updated_at: 1_000,
        }
    }

    #[test]
    fn backfill_fills_missing_fields() {
        let mut task = legacy("task-1");
        assert!(task.backfill());
        assert_eq!(task.environment.as_deref(), Some("devel"));
        assert_eq!(task.job_key, Some(JobKey::new("www-data", "devel", "hello")));
    }

    #[test]
    fn backfill_keeps_existing_environment() {
        let mut task = legacy("task-1");
        task.environment = Some("prod".to_string());
        assert!(task.backfill());
        assert_eq!(task.job_key.unwrap().to_string(), "www-data/prod/hello");
    }

    #[test]
    fn backfill_is_noop_on_complete_record() {
        let mut task = TaskRecord::new(
            "task-1",
            JobKey::new("www-data", "prod", "hello"),
            TaskStatus::Pending,
            1,
        );
        let before = task.clone();
        assert!(!task.backfill());
        assert_eq!(task, before);
    }

    #[test]
    fn legacy_json_decodes_without_new_fields() {
        let json = r#"{"task_id":"t","role":"r","job_name":"j","status":"lost","updated_at":5}"#;
        let task: TaskRecord = serde_json::from_str(json).unwrap();
        assert!(task.environment.is_none());
        assert!(task.job_key.is_none());
        assert_eq!(task.status, TaskStatus::Lost);
    }
}
