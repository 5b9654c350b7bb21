pub mod context;
pub mod error;
pub mod graph;
pub mod session;
pub mod task;

// Re-export commonly used types
pub use context::Context;
pub use error::{GraphError, Result};
pub use graph::{ExecutionResult, Graph, GraphBuilder};
pub use session::{Session, TaskTiming};
pub use task::{NextAction, Task, TaskResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AppendTask {
        id: String,
        next: NextAction,
    }

    #[async_trait]
    impl Task for AppendTask {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            let mut trail: Vec<String> = context.get("trail").await.unwrap_or_default();
            trail.push(self.id.clone());
            context.set("trail", trail).await?;

            Ok(TaskResult::new_with_status(
                self.next.clone(),
                Some(format!("{} done", self.id)),
            ))
        }
    }

    struct FailingTask;

    #[async_trait]
    impl Task for FailingTask {
        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Err(GraphError::TaskExecutionFailed("boom".to_string()))
        }
    }

    fn append(id: &str, next: NextAction) -> Arc<AppendTask> {
        Arc::new(AppendTask {
            id: id.to_string(),
            next,
        })
    }

    #[tokio::test]
    async fn test_chained_execution_runs_to_end() {
        let graph = GraphBuilder::new("chain")
            .add_task(append("a", NextAction::ContinueAndExecute))
            .add_task(append("b", NextAction::ContinueAndExecute))
            .add_task(append("c", NextAction::End))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build();

        let mut session = Session::new_from_task("s1".to_string(), "a");
        let result = graph.execute_session(&mut session).await.unwrap();

        assert_eq!(result.status_message.as_deref(), Some("c done"));
        assert_eq!(session.current_task_id, "c");

        let trail: Vec<String> = session.context.get("trail").await.unwrap();
        assert_eq!(trail, vec!["a", "b", "c"]);

        let timed: Vec<&str> = session
            .task_timings
            .iter()
            .map(|t| t.task_id.as_str())
            .collect();
        assert_eq!(timed, vec!["a", "b", "c"]);
        assert!(session.task_timings.iter().all(|t| t.succeeded));
    }

    #[tokio::test]
    async fn test_continuing_without_an_edge_is_an_error() {
        let graph = GraphBuilder::new("dangling")
            .add_task(append("a", NextAction::ContinueAndExecute))
            .build();

        let mut session = Session::new_from_task("s2".to_string(), "a");
        let err = graph.execute_session(&mut session).await.unwrap_err();
        assert!(matches!(err, GraphError::MissingEdge(ref id) if id == "a"));
        assert_eq!(session.current_task_id, "a");
        assert_eq!(session.status_message.as_deref(), Some("a done"));
    }

    #[tokio::test]
    async fn test_failure_keeps_cursor_on_failing_task() {
        let failing = Arc::new(FailingTask);
        let failing_id = failing.id().to_string();

        let graph = GraphBuilder::new("failing")
            .add_task(append("a", NextAction::ContinueAndExecute))
            .add_task(failing)
            .add_edge("a", failing_id.clone())
            .build();

        let mut session = Session::new_from_task("s3".to_string(), "a");
        let err = graph.execute_session(&mut session).await.unwrap_err();

        assert!(matches!(err, GraphError::TaskExecutionFailed(ref msg) if msg == "boom"));
        assert_eq!(session.current_task_id, failing_id);
        assert_eq!(session.task_timings.len(), 2);
        assert!(!session.task_timings[1].succeeded);
    }

    #[tokio::test]
    async fn test_unknown_task_is_reported() {
        let graph = GraphBuilder::new("empty").build();
        let mut session = Session::new_from_task("s4".to_string(), "missing");

        let err = graph.execute_session(&mut session).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskNotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_context_require_reports_missing_key() {
        let context = Context::new();
        context.set("present", 42u32).await.unwrap();

        let present: u32 = context.require("present").await.unwrap();
        assert_eq!(present, 42);

        let err = context.require::<u32>("absent").await.unwrap_err();
        assert!(err.to_string().contains("absent"));

        let err = context.require::<Vec<String>>("present").await.unwrap_err();
        assert!(err.to_string().contains("unexpected shape"));
    }

    #[test]
    fn test_first_task_is_start_task() {
        let graph = GraphBuilder::new("start")
            .add_task(append("first", NextAction::End))
            .add_task(append("second", NextAction::End))
            .build();
        assert_eq!(graph.start_task_id(), Some("first"));

        let graph = GraphBuilder::new("start")
            .add_task(append("first", NextAction::End))
            .add_task(append("second", NextAction::End))
            .set_start_task("second")
            .build();
        assert_eq!(graph.start_task_id(), Some("second"));
    }
}
