use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::{
    error::{GraphError, Result},
    session::{Session, TaskTiming},
    task::{NextAction, Task, TaskResult},
};

/// Edge between tasks in the graph
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// A graph of tasks that can be executed.
///
/// Graphs are assembled once through [`GraphBuilder`] and are immutable afterwards, so a
/// single `Arc<Graph>` can drive any number of concurrent sessions.
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
}

impl Graph {
    /// Execute the session starting at its current task until a task ends the workflow.
    ///
    /// Tasks returning [`NextAction::ContinueAndExecute`] chain straight into their successor.
    /// Each run is appended to `session.task_timings`, including the run that failed, and the
    /// cursor is left on the failing task.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        loop {
            let task_id = session.current_task_id.clone();
            let result = self.execute_single_task(&task_id, session).await?;
            session.status_message = result.status_message.clone();

            match result.next_action {
                NextAction::ContinueAndExecute => {
                    session.current_task_id = self
                        .find_next_task(&task_id)
                        .ok_or_else(|| GraphError::MissingEdge(task_id.clone()))?;
                }
                NextAction::End => {
                    return Ok(ExecutionResult {
                        status_message: result.status_message,
                    });
                }
            }
        }
    }

    /// Execute a single task without following its next action
    async fn execute_single_task(&self, task_id: &str, session: &mut Session) -> Result<TaskResult> {
        let task = self
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        debug!(graph_id = %self.id, session_id = %session.id, task_id = %task_id, "running task");
        let started = Instant::now();
        let outcome = task.run(session.context.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        session.task_timings.push(TaskTiming {
            task_id: task_id.to_string(),
            elapsed_ms,
            succeeded: outcome.is_ok(),
        });

        match outcome {
            Ok(mut result) => {
                result.task_id = task_id.to_string();
                Ok(result)
            }
            Err(e) => {
                warn!(
                    session_id = %session.id,
                    task_id = %task_id,
                    elapsed_ms,
                    error = %e,
                    "task failed"
                );
                Err(e)
            }
        }
    }

    /// Find the next task following the first outgoing edge
    pub fn find_next_task(&self, current_task_id: &str) -> Option<String> {
        self.edges
            .iter()
            .find(|edge| edge.from == current_task_id)
            .map(|edge| edge.to.clone())
    }

    /// Get the start task ID
    pub fn start_task_id(&self) -> Option<&str> {
        self.start_task_id.as_deref()
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: Graph {
                id: id.into(),
                tasks: HashMap::new(),
                edges: Vec::new(),
                start_task_id: None,
            },
        }
    }

    /// Add a task; the first task added becomes the start task
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.graph.start_task_id.is_none() {
            self.graph.start_task_id = Some(task_id.clone());
        }
        self.graph.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.graph.edges.push(Edge {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if self.graph.tasks.contains_key(&task_id) {
            self.graph.start_task_id = Some(task_id);
        }
        self
    }

    pub fn build(self) -> Graph {
        self.graph
    }
}

/// Outcome of a session run that reached [`NextAction::End`]
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status_message: Option<String>,
}
