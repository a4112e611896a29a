//! Task Registry
//!
//! Bookkeeping for `tools/call` invocations routed through the task surface:
//! snapshot storage, status transitions, and a per-task watch channel so
//! `tasks/result` can block on completion without polling.
//!
//! Entries are retained for the life of the session; `ttl` is surfaced in
//! snapshots as a client hint but does not drive eviction.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use chrono::Utc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::error::{McpError, McpResult};
use crate::protocol::constants::defaults;
use crate::protocol::{CallToolResult, Task, TaskStatus};

struct TaskEntry {
    snapshot: Task,
    result: Option<CallToolResult>,
    status_tx: watch::Sender<Task>,
}

#[derive(Default)]
struct TaskTable {
    entries: HashMap<String, TaskEntry>,
    /// Insertion order for stable pagination
    order: Vec<String>,
}

/// Server-side registry of long-running tool invocations
///
/// All mutation happens under one mutex; no await ever occurs while it is
/// held. Waiters block on watch receivers cloned out of the table.
#[derive(Default)]
pub struct TaskRegistry {
    table: Mutex<TaskTable>,
}

impl TaskRegistry {
    /// Create a new registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a task in `working` state
    pub async fn create(&self, ttl: u64) -> Task {
        let mut table = self.table.lock().await;

        let task_id = loop {
            let candidate = format!("task-{}", Uuid::new_v4().simple());
            if !table.entries.contains_key(&candidate) {
                break candidate;
            }
        };

        let now = Utc::now();
        let snapshot = Task {
            task_id: task_id.clone(),
            status: TaskStatus::Working,
            created_at: now,
            last_updated_at: now,
            ttl,
            poll_interval: defaults::TASK_POLL_INTERVAL_MS,
            status_message: None,
        };

        let (status_tx, _) = watch::channel(snapshot.clone());
        table.entries.insert(
            task_id.clone(),
            TaskEntry {
                snapshot: snapshot.clone(),
                result: None,
                status_tx,
            },
        );
        table.order.push(task_id);
        snapshot
    }

    /// Transition to `completed`, storing the normalized result.
    ///
    /// Returns the new snapshot, or `None` when the task is unknown or
    /// already terminal (a completed handler racing a cancel loses).
    pub async fn complete(&self, task_id: &str, result: CallToolResult) -> Option<Task> {
        self.transition(task_id, TaskStatus::Completed, Some(result), None)
            .await
    }

    /// Transition to `failed`, storing the status message.
    pub async fn fail(&self, task_id: &str, message: String) -> Option<Task> {
        self.transition(task_id, TaskStatus::Failed, None, Some(message))
            .await
    }

    /// Transition to `cancelled` if non-terminal.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidParams`] for an unknown id. A terminal
    /// task is returned unchanged with `transitioned == false`.
    pub async fn cancel(&self, task_id: &str) -> McpResult<(Task, bool)> {
        let mut table = self.table.lock().await;
        let entry = table
            .entries
            .get_mut(task_id)
            .ok_or_else(|| McpError::invalid_params(format!("unknown task: {task_id}")))?;

        if entry.snapshot.status.is_terminal() {
            return Ok((entry.snapshot.clone(), false));
        }

        entry.snapshot.status = TaskStatus::Cancelled;
        entry.snapshot.last_updated_at = Utc::now();
        let _ = entry.status_tx.send(entry.snapshot.clone());
        Ok((entry.snapshot.clone(), true))
    }

    async fn transition(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<CallToolResult>,
        message: Option<String>,
    ) -> Option<Task> {
        let mut table = self.table.lock().await;
        let entry = table.entries.get_mut(task_id)?;
        if entry.snapshot.status.is_terminal() {
            return None;
        }

        entry.snapshot.status = status;
        entry.snapshot.last_updated_at = Utc::now();
        entry.snapshot.status_message = message;
        if result.is_some() {
            entry.result = result;
        }
        let _ = entry.status_tx.send(entry.snapshot.clone());
        Some(entry.snapshot.clone())
    }

    /// Current snapshot
    pub async fn get(&self, task_id: &str) -> Option<Task> {
        let table = self.table.lock().await;
        table.entries.get(task_id).map(|e| e.snapshot.clone())
    }

    /// Current snapshot plus the stored result, if any
    pub async fn outcome(&self, task_id: &str) -> Option<(Task, Option<CallToolResult>)> {
        let table = self.table.lock().await;
        table
            .entries
            .get(task_id)
            .map(|e| (e.snapshot.clone(), e.result.clone()))
    }

    /// Watch receiver for status changes
    pub async fn watch(&self, task_id: &str) -> Option<watch::Receiver<Task>> {
        let table = self.table.lock().await;
        table.entries.get(task_id).map(|e| e.status_tx.subscribe())
    }

    /// Block until the task reaches a terminal state, then return its
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidParams`] for an unknown id.
    pub async fn await_outcome(&self, task_id: &str) -> McpResult<(Task, Option<CallToolResult>)> {
        let mut receiver = self
            .watch(task_id)
            .await
            .ok_or_else(|| McpError::invalid_params(format!("unknown task: {task_id}")))?;

        // wait_for inspects the current value first, so a task that is
        // already terminal returns immediately.
        receiver
            .wait_for(|task| task.status.is_terminal())
            .await
            .map_err(|_| McpError::internal("task watch channel closed"))?;

        self.outcome(task_id)
            .await
            .ok_or_else(|| McpError::invalid_params(format!("unknown task: {task_id}")))
    }

    /// All snapshots in creation order
    pub async fn list(&self) -> Vec<Task> {
        let table = self.table.lock().await;
        table
            .order
            .iter()
            .filter_map(|id| table.entries.get(id).map(|e| e.snapshot.clone()))
            .collect()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_create_yields_working_snapshot() {
        let registry = TaskRegistry::new();
        let task = registry.create(60_000).await;

        assert!(task.task_id.starts_with("task-"));
        assert_eq!(task.status, TaskStatus::Working);
        assert_eq!(task.ttl, 60_000);
        assert_eq!(task.poll_interval, defaults::TASK_POLL_INTERVAL_MS);
    }

    #[tokio::test]
    async fn test_complete_stores_result() {
        let registry = TaskRegistry::new();
        let task = registry.create(1000).await;

        let snapshot = registry
            .complete(&task.task_id, CallToolResult::from_text("done"))
            .await
            .unwrap();
        assert_eq!(snapshot.status, TaskStatus::Completed);

        let (task, result) = registry.outcome(&task.task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(result.unwrap().content[0].as_text(), Some("done"));
    }

    #[tokio::test]
    async fn test_cancel_only_from_non_terminal() {
        let registry = TaskRegistry::new();
        let task = registry.create(1000).await;

        let (snapshot, transitioned) = registry.cancel(&task.task_id).await.unwrap();
        assert!(transitioned);
        assert_eq!(snapshot.status, TaskStatus::Cancelled);

        // Cancelling again is a no-op on the snapshot.
        let (snapshot, transitioned) = registry.cancel(&task.task_id).await.unwrap();
        assert!(!transitioned);
        assert_eq!(snapshot.status, TaskStatus::Cancelled);

        // A completing handler racing the cancel loses.
        assert!(registry
            .complete(&task.task_id, CallToolResult::from_text("late"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let registry = TaskRegistry::new();
        assert!(registry.cancel("task-missing").await.is_err());
    }

    #[tokio::test]
    async fn test_await_outcome_blocks_until_terminal() {
        let registry = Arc::new(TaskRegistry::new());
        let task = registry.create(1000).await;

        let waiter = {
            let registry = Arc::clone(&registry);
            let task_id = task.task_id.clone();
            tokio::spawn(async move { registry.await_outcome(&task_id).await })
        };

        // Give the waiter a chance to park on the watch channel.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        registry
            .fail(&task.task_id, "backend unavailable".into())
            .await
            .unwrap();

        let (snapshot, result) = waiter.await.unwrap().unwrap();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(snapshot.status_message.as_deref(), Some("backend unavailable"));
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_await_outcome_returns_immediately_when_terminal() {
        let registry = TaskRegistry::new();
        let task = registry.create(1000).await;
        registry
            .complete(&task.task_id, CallToolResult::from_text("x"))
            .await
            .unwrap();

        let (snapshot, result) = registry.await_outcome(&task.task_id).await.unwrap();
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_list_preserves_creation_order() {
        let registry = TaskRegistry::new();
        let first = registry.create(1).await;
        let second = registry.create(2).await;
        let third = registry.create(3).await;

        let listed: Vec<String> = registry.list().await.into_iter().map(|t| t.task_id).collect();
        assert_eq!(listed, vec![first.task_id, second.task_id, third.task_id]);
    }
}
