//! Transfer engine port definition.
//!
//! The transfer engine performs the byte-level downloads. It keeps a durable
//! record per task and broadcasts status/progress updates to any number of
//! subscribers.
//!
//! # Design
//!
//! - One task = one file
//! - Records outlive the process; updates do not
//! - The engine never interprets task metadata; the scheduler does

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::PortError;
use crate::download::{TaskDescriptor, TaskRecord, TaskUpdate};

/// Port for the background transfer engine.
#[async_trait]
pub trait TransferEnginePort: Send + Sync {
    /// Submit a task for execution.
    async fn enqueue(&self, task: TaskDescriptor) -> Result<(), PortError>;

    /// Request cancellation of the given tasks.
    ///
    /// Cancellation is eventually consistent: updates for these tasks may
    /// still arrive after this returns.
    async fn cancel_by_ids(&self, task_ids: &[String]) -> Result<(), PortError>;

    /// All durable task records.
    async fn all_records(&self) -> Result<Vec<TaskRecord>, PortError>;

    /// Delete the durable record of a task.
    async fn delete_record(&self, task_id: &str) -> Result<(), PortError>;

    /// Subscribe to the broadcast stream of task updates.
    fn subscribe(&self) -> broadcast::Receiver<TaskUpdate>;
}
