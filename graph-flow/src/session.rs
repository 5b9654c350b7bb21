use serde::{Deserialize, Serialize};

use crate::Context;

/// Wall-clock cost of one task run inside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub task_id: String,
    pub elapsed_ms: u64,
    pub succeeded: bool,
}

/// Session information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub current_task_id: String,
    pub status_message: Option<String>,
    /// One entry per executed task, in execution order
    #[serde(default)]
    pub task_timings: Vec<TaskTiming>,
    #[serde(skip)]
    pub context: Context,
}

impl Session {
    pub fn new_from_task(sid: String, task_name: &str) -> Self {
        Self {
            id: sid,
            current_task_id: task_name.to_string(),
            status_message: None,
            task_timings: Vec::new(),
            context: Context::new(),
        }
    }
}
