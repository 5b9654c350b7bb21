use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {0} continued but has no outgoing edge")]
    MissingEdge(String),

    #[error("Context error: {0}")]
    ContextError(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
